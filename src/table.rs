use std::sync::Arc;

use parking_lot::RwLock;

use crate::action::{Action, ACTION_COUNT};
use crate::error::ConfigError;
use crate::state::{StateSpace, StateVector, STATE_DIMS_MAX};

/// Describes how a state vector and action map onto the flattened value storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    dims: usize,
    rows: [usize; STATE_DIMS_MAX],
    col: usize,
}

impl Layout {
    /// Layout for the given state space, with one row per bin.
    pub fn new(
        space: StateSpace,
        throughput_bins: usize,
        rtt_bins: usize,
    ) -> Result<Self, ConfigError> {
        let sizes = [throughput_bins, rtt_bins];
        Self::with_descriptor(space, sizes, sizes, ACTION_COUNT)
    }

    /// Layout using an explicit row-size descriptor.
    ///
    /// The two-dimensional index is computed as `col * (s0 * rows[1] + s1) + a`. Every row size
    /// in use must match the number of bins in its dimension, and `col` the number of actions,
    /// or reachable states would alias or fall outside the storage.
    pub fn with_descriptor(
        space: StateSpace,
        sizes: [usize; STATE_DIMS_MAX],
        rows: [usize; STATE_DIMS_MAX],
        col: usize,
    ) -> Result<Self, ConfigError> {
        let dims = space.dims();

        for (dim, &size) in sizes.iter().enumerate().take(dims) {
            if size == 0 {
                return Err(ConfigError::BinCount {
                    dim,
                    found: size,
                    max: crate::config::BIN_COUNT_MAX,
                });
            }
        }

        for (dim, (&found, &expected)) in rows.iter().zip(sizes.iter()).enumerate().take(dims) {
            if found != expected {
                return Err(ConfigError::RowDescriptor {
                    dim,
                    found,
                    expected,
                });
            }
        }

        if col != ACTION_COUNT {
            return Err(ConfigError::ColumnCount {
                found: col,
                expected: ACTION_COUNT,
            });
        }

        let rows = match dims {
            1 => [rows[0], 0],
            _ => rows,
        };

        Ok(Self { dims, rows, col })
    }

    /// Number of entries spanned by this layout.
    pub fn len(&self) -> usize {
        let states = match self.dims {
            1 => self.rows[0],
            _ => self.rows[0] * self.rows[1],
        };

        states * self.col
    }

    pub fn index(&self, state: &StateVector, action: Action) -> usize {
        let a = action.index();
        debug_assert!(a < self.col);

        match self.dims {
            1 => {
                debug_assert!(state.throughput() < self.rows[0]);
                self.col * state.throughput() + a
            }
            _ => {
                debug_assert!(state.throughput() < self.rows[0]);
                debug_assert!(state.rtt() < self.rows[1]);
                self.col * (state.throughput() * self.rows[1] + state.rtt()) + a
            }
        }
    }

    fn shape(&self) -> (usize, usize, usize) {
        (self.rows[0], self.rows[1], self.col)
    }
}

struct Inner {
    // Allocated zeroed on first attach, never cleared afterwards
    values: Option<Box<[i32]>>,
    rows: [usize; STATE_DIMS_MAX],
    col: usize,
    enabled: bool,
    users: usize,
}

/// The value table shared by every connection attached to it.
///
/// Cloning produces another handle to the same table. Reads and writes lock independently, so
/// two connections updating the same entry may lose one of the updates.
///
/// Storage is sized by the first attach and kept for the life of the table. A later attach
/// whose layout needs more entries fails with [`ConfigError::Capacity`], even once every
/// earlier user has detached; e.g. a throughput-only controller attaching first leaves no room
/// for a throughput + RTT controller.
#[derive(Clone)]
pub struct SharedTable {
    inner: Arc<RwLock<Inner>>,
}

impl SharedTable {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                values: None,
                rows: [0; STATE_DIMS_MAX],
                col: 0,
                enabled: false,
                users: 0,
            })),
        }
    }

    /// Registers a connection using `layout`. Storage is zero-filled the first time only;
    /// later attaches reuse whatever has been learned.
    pub fn attach(&self, layout: &Layout) -> Result<(), ConfigError> {
        let mut inner = self.inner.write();

        if inner.users > 0 {
            let attached = (inner.rows[0], inner.rows[1], inner.col);
            if attached != layout.shape() {
                return Err(ConfigError::LayoutConflict {
                    requested: layout.shape(),
                    attached,
                });
            }
        }

        match inner.values {
            Some(ref values) => {
                if values.len() < layout.len() {
                    return Err(ConfigError::Capacity {
                        needed: layout.len(),
                        capacity: values.len(),
                    });
                }
            }
            None => {
                tracing::debug!(entries = layout.len(), "allocating value table");
                inner.values = Some(vec![0; layout.len()].into_boxed_slice());
            }
        }

        inner.rows = layout.rows;
        inner.col = layout.col;
        inner.enabled = true;
        inner.users += 1;

        Ok(())
    }

    /// Unregisters a connection. The last one out clears the descriptors and disables the
    /// table; learned values are kept.
    pub fn detach(&self) {
        let mut inner = self.inner.write();

        inner.users = inner.users.saturating_sub(1);

        if inner.users == 0 {
            inner.rows = [0; STATE_DIMS_MAX];
            inner.col = 0;
            inner.enabled = false;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.read().enabled
    }

    pub fn users(&self) -> usize {
        self.inner.read().users
    }

    /// Row-size and column descriptors as last written by an attach or detach.
    pub fn descriptor(&self) -> ([usize; STATE_DIMS_MAX], usize) {
        let inner = self.inner.read();
        (inner.rows, inner.col)
    }

    pub fn get(&self, layout: &Layout, state: &StateVector, action: Action) -> i32 {
        let inner = self.inner.read();
        inner
            .values
            .as_ref()
            .map_or(0, |values| values[layout.index(state, action)])
    }

    pub fn set(&self, layout: &Layout, state: &StateVector, action: Action, value: i32) {
        let mut inner = self.inner.write();
        if let Some(ref mut values) = inner.values {
            values[layout.index(state, action)] = value;
        }
    }

    /// All action values for `state`, read under one lock.
    pub fn row(&self, layout: &Layout, state: &StateVector) -> [i32; ACTION_COUNT] {
        let inner = self.inner.read();
        let mut row = [0; ACTION_COUNT];

        if let Some(ref values) = inner.values {
            for action in Action::ALL {
                row[action.index()] = values[layout.index(state, action)];
            }
        }

        row
    }

    /// Copy of the raw storage, empty if never attached.
    pub fn snapshot(&self) -> Vec<i32> {
        self.inner
            .read()
            .values
            .as_ref()
            .map_or_else(Vec::new, |values| values.to_vec())
    }
}

impl Default for SharedTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_2d() -> Layout {
        Layout::new(StateSpace::ThroughputRtt, 100, 100).unwrap()
    }

    #[test]
    fn index_formula() {
        let layout = layout_2d();
        assert_eq!(layout.len(), 100 * 100 * 4);
        assert_eq!(
            layout.index(&StateVector::new(1, 2), Action::NoOp),
            4 * (100 + 2) + 3
        );
        assert_eq!(
            layout.index(&StateVector::new(99, 99), Action::NoOp),
            layout.len() - 1
        );

        let layout = Layout::new(StateSpace::Throughput, 100, 100).unwrap();
        assert_eq!(layout.len(), 400);
        assert_eq!(layout.index(&StateVector::new(7, 0), Action::Decrease), 30);
    }

    #[test]
    fn row_descriptor_mismatch() {
        let err = Layout::with_descriptor(StateSpace::ThroughputRtt, [100, 50], [100, 100], 4);
        assert_eq!(
            err,
            Err(ConfigError::RowDescriptor {
                dim: 1,
                found: 100,
                expected: 50
            })
        );

        // A short first row would put the top bins past the end of storage
        let err = Layout::with_descriptor(StateSpace::ThroughputRtt, [100, 100], [50, 100], 4);
        assert_eq!(
            err,
            Err(ConfigError::RowDescriptor {
                dim: 0,
                found: 50,
                expected: 100
            })
        );

        let err = Layout::with_descriptor(StateSpace::Throughput, [100, 0], [50, 0], 4);
        assert!(matches!(err, Err(ConfigError::RowDescriptor { dim: 0, .. })));

        let err = Layout::with_descriptor(StateSpace::ThroughputRtt, [100, 100], [100, 100], 3);
        assert_eq!(
            err,
            Err(ConfigError::ColumnCount {
                found: 3,
                expected: 4
            })
        );

        // The second slot is unused in one dimension
        assert!(Layout::with_descriptor(StateSpace::Throughput, [100, 50], [100, 100], 4).is_ok());
    }

    #[test]
    fn validated_layout_covers_every_state() {
        let table = SharedTable::new();
        let layout =
            Layout::with_descriptor(StateSpace::ThroughputRtt, [100, 100], [100, 100], 4).unwrap();
        table.attach(&layout).unwrap();

        let top = StateVector::new(99, 99);
        table.set(&layout, &top, Action::NoOp, 12);
        assert_eq!(table.get(&layout, &top, Action::NoOp), 12);
        assert_eq!(layout.index(&top, Action::NoOp), layout.len() - 1);
    }

    #[test]
    fn get_after_set() {
        let table = SharedTable::new();
        let layout = layout_2d();
        table.attach(&layout).unwrap();

        let states = [
            StateVector::new(0, 0),
            StateVector::new(0, 99),
            StateVector::new(99, 0),
            StateVector::new(42, 17),
        ];

        for (i, state) in states.iter().enumerate() {
            for action in Action::ALL {
                let value = (i as i32 - 2) * 1000 + action.index() as i32;
                table.set(&layout, state, action, value);
                assert_eq!(table.get(&layout, state, action), value);
            }
        }

        assert_eq!(table.row(&layout, &states[3]), [1000, 1001, 1002, 1003]);
    }

    #[test]
    fn values_survive_reattach() {
        let table = SharedTable::new();
        let layout = layout_2d();
        let state = StateVector::new(3, 4);

        table.attach(&layout).unwrap();
        table.set(&layout, &state, Action::IncreaseBy1, -77);
        table.detach();

        assert!(!table.is_enabled());
        assert_eq!(table.descriptor(), ([0, 0], 0));
        assert_eq!(table.snapshot().len(), layout.len());

        table.attach(&layout).unwrap();
        assert!(table.is_enabled());
        assert_eq!(table.descriptor(), ([100, 100], 4));
        assert_eq!(table.get(&layout, &state, Action::IncreaseBy1), -77);
    }

    #[test]
    fn user_count_drives_enabled() {
        let table = SharedTable::new();
        let layout = layout_2d();

        table.attach(&layout).unwrap();
        table.attach(&layout).unwrap();
        assert_eq!(table.users(), 2);

        table.detach();
        assert!(table.is_enabled());
        assert_eq!(table.descriptor(), ([100, 100], 4));

        table.detach();
        assert!(!table.is_enabled());
        assert_eq!(table.users(), 0);
    }

    #[test]
    fn conflicting_layouts() {
        let table = SharedTable::new();
        table.attach(&layout_2d()).unwrap();

        let small = Layout::new(StateSpace::Throughput, 100, 100).unwrap();
        assert!(matches!(
            table.attach(&small),
            Err(ConfigError::LayoutConflict { .. })
        ));

        // Once everybody has left a smaller layout may reuse the storage
        table.detach();
        table.attach(&small).unwrap();
        table.detach();

        let big = Layout::new(StateSpace::ThroughputRtt, 200, 100).unwrap();
        assert_eq!(
            table.attach(&big),
            Err(ConfigError::Capacity {
                needed: 200 * 100 * 4,
                capacity: 100 * 100 * 4
            })
        );
    }

    #[test]
    fn first_attach_sizes_storage() {
        let table = SharedTable::new();
        let small = Layout::new(StateSpace::Throughput, 100, 100).unwrap();

        table.attach(&small).unwrap();
        table.detach();
        assert_eq!(table.snapshot().len(), 400);

        assert_eq!(
            table.attach(&layout_2d()),
            Err(ConfigError::Capacity {
                needed: 100 * 100 * 4,
                capacity: 400
            })
        );
        assert_eq!(table.users(), 0);
    }

    #[test]
    fn unattached_table_is_empty() {
        let table = SharedTable::new();
        let layout = layout_2d();

        assert!(table.snapshot().is_empty());
        assert_eq!(table.get(&layout, &StateVector::default(), Action::NoOp), 0);
        table.set(&layout, &StateVector::default(), Action::NoOp, 5);
        assert!(table.snapshot().is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn round_trip_any_reachable_entry(
                t in 0u8..100,
                r in 0u8..100,
                a in 0usize..ACTION_COUNT,
                value in any::<i32>(),
            ) {
                let table = SharedTable::new();
                let layout = layout_2d();
                table.attach(&layout).unwrap();

                let state = StateVector::new(t, r);
                let action = Action::ALL[a];
                table.set(&layout, &state, action, value);

                prop_assert_eq!(table.get(&layout, &state, action), value);
                prop_assert_eq!(table.row(&layout, &state)[a], value);

                let nonzero = table.snapshot().iter().filter(|&&q| q != 0).count();
                prop_assert_eq!(nonzero, usize::from(value != 0));
            }

            #[test]
            fn index_is_in_bounds_and_unique(
                tbins in 1usize..=256,
                rbins in 1usize..=256,
                a in (any::<u8>(), any::<u8>(), 0usize..ACTION_COUNT),
                b in (any::<u8>(), any::<u8>(), 0usize..ACTION_COUNT),
            ) {
                let layout = Layout::new(StateSpace::ThroughputRtt, tbins, rbins).unwrap();

                let clamp = |(t, r, a): (u8, u8, usize)| {
                    let t = usize::from(t).min(tbins - 1) as u8;
                    let r = usize::from(r).min(rbins - 1) as u8;
                    (StateVector::new(t, r), Action::ALL[a])
                };
                let (sa, aa) = clamp(a);
                let (sb, ab) = clamp(b);

                let ia = layout.index(&sa, aa);
                let ib = layout.index(&sb, ab);
                prop_assert!(ia < layout.len());
                prop_assert_eq!(ia == ib, sa == sb && aa == ab);
            }
        }
    }
}
