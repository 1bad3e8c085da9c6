use crate::action::Action;
use crate::state::StateVector;
use crate::table::{Layout, SharedTable};

/// Fixed-point scale of the learning rate. Values are Q10 relative to it.
pub const Q_SCALE: i32 = 1024;
const Q_SCALE_SHIFT: u32 = 10;
// The discount factor is in sixteenths
const DISCOUNT_SHIFT: u32 = 4;

/// Fixed-point learning parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LearningParams {
    pub learning_rate: i32,
    pub discount_factor: i32,
}

/// Computes the Bellman backup
///
///   ((SCALE - lr) * this_q + lr * (reward + (df * max_next >> 4))) >> 10
///
/// with truncating integer arithmetic. Intermediates are widened so that large table values do
/// not overflow; the result wraps back into 32 bits.
pub fn bellman(params: &LearningParams, this_q: i32, reward: i32, max_next: i32) -> i32 {
    let lr = i64::from(params.learning_rate);
    let df = i64::from(params.discount_factor);

    let future = (df * i64::from(max_next)) >> DISCOUNT_SHIFT;
    let target = i64::from(reward) + future;
    let blended = (i64::from(Q_SCALE) - lr) * i64::from(this_q) + lr * target;

    (blended >> Q_SCALE_SHIFT) as i32
}

/// What happened to the entry for the previous (state, action) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Updated(i32),
    /// The backup came out as zero; nothing was written.
    Collapsed,
}

/// Backs up the value of taking `action` in `previous` after arriving in `current` with
/// `reward`.
pub fn update(
    table: &SharedTable,
    layout: &Layout,
    params: &LearningParams,
    previous: &StateVector,
    action: Action,
    current: &StateVector,
    reward: i32,
) -> Outcome {
    let this_q = table.get(layout, previous, action);
    let max_next = table
        .row(layout, current)
        .into_iter()
        .max()
        .unwrap_or(0);

    let updated = bellman(params, this_q, reward, max_next);

    tracing::debug!(this_q, max_next, reward, updated, ?action, "q update");

    if updated == 0 {
        return Outcome::Collapsed;
    }

    table.set(layout, previous, action, updated);

    Outcome::Updated(updated)
}
