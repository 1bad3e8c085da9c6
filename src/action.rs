/// A congestion window adjustment. The discriminant is the column in the value table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// cwnd <- cwnd + 30 / cwnd
    IncreaseBy30OverWindow = 0,
    /// cwnd <- cwnd + 1
    IncreaseBy1 = 1,
    /// cwnd <- cwnd - cwnd / 2
    Decrease = 2,
    NoOp = 3,
}

pub const ACTION_COUNT: usize = 4;

impl Action {
    pub const ALL: [Action; ACTION_COUNT] = [
        Action::IncreaseBy30OverWindow,
        Action::IncreaseBy1,
        Action::Decrease,
        Action::NoOp,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Returns the window that results from taking this action.
    pub fn apply(self, cwnd: u32) -> u32 {
        match self {
            Self::IncreaseBy30OverWindow => {
                // No-op from 31 onward, and for an empty window
                cwnd.saturating_add(30u32.checked_div(cwnd).unwrap_or(0))
            }
            Self::IncreaseBy1 => cwnd.saturating_add(1),
            Self::Decrease => cwnd - (cwnd >> 1),
            Self::NoOp => cwnd,
        }
    }
}

/// Window to return to when the host undoes a spurious loss response.
pub fn undo_cwnd(cwnd: u32, prior_cwnd: u32) -> u32 {
    cwnd.max(prior_cwnd)
}
