use thiserror::Error;

/// Reported when a controller or table cannot be set up with the requested parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("bin count for state dimension {dim} must be in 1..={max} (found: {found})")]
    BinCount { dim: usize, found: usize, max: usize },

    #[error("learning rate must be in 0..={scale} (found: {found})")]
    LearningRate { found: i32, scale: i32 },

    #[error("discount factor must be in 0..=16 (found: {0})")]
    DiscountFactor(i32),

    #[error("{name} must not be zero")]
    ZeroInterval { name: &'static str },

    #[error("epsilon threshold must be below 10 (found: {0})")]
    EpsilonThreshold(u32),

    #[error("row descriptor {found} does not match size {expected} of state dimension {dim}")]
    RowDescriptor {
        dim: usize,
        found: usize,
        expected: usize,
    },

    #[error("column descriptor must be {expected} (found: {found})")]
    ColumnCount { found: usize, expected: usize },

    #[error("table layout {requested:?} conflicts with attached layout {attached:?}")]
    LayoutConflict {
        requested: (usize, usize, usize),
        attached: (usize, usize, usize),
    },

    #[error("table layout needs {needed} entries but storage holds {capacity}")]
    Capacity { needed: usize, capacity: usize },
}
