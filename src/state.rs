use serde::{Deserialize, Serialize};

// 512 throughput units per bin, roughly 0-100M over the default 100 bins
const THROUGHPUT_BIN_SHIFT: u32 = 9;
// 8192 us per bin, roughly 0-100 ms
const RTT_BIN_SHIFT: u32 = 13;

pub const STATE_DIMS_MAX: usize = 2;

/// Measurements that make up the learned state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateSpace {
    /// One dimension: throughput.
    Throughput,
    /// Two dimensions: throughput, then RTT.
    ThroughputRtt,
}

impl StateSpace {
    pub fn dims(self) -> usize {
        match self {
            Self::Throughput => 1,
            Self::ThroughputRtt => 2,
        }
    }
}

/// A discretized network state. Unused trailing dimensions stay zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct StateVector {
    bins: [u8; STATE_DIMS_MAX],
}

impl StateVector {
    pub fn new(throughput_bin: u8, rtt_bin: u8) -> Self {
        Self {
            bins: [throughput_bin, rtt_bin],
        }
    }

    pub fn throughput(&self) -> usize {
        self.bins[0].into()
    }

    pub fn rtt(&self) -> usize {
        self.bins[1].into()
    }
}

fn clamp_bin(value: u32, bins: usize) -> u8 {
    debug_assert!(bins > 0 && bins <= u8::MAX as usize + 1);

    let max = (bins - 1) as u32;
    // Fits, as bins never exceeds 256
    value.min(max) as u8
}

/// Maps raw measurements onto bounded bins, remembering the previous state for the update
/// rule.
#[derive(Clone, Debug)]
pub struct Discretizer {
    space: StateSpace,
    throughput_bins: usize,
    rtt_bins: usize,
    current: StateVector,
    previous: StateVector,
}

impl Discretizer {
    pub fn new(space: StateSpace, throughput_bins: usize, rtt_bins: usize) -> Self {
        Self {
            space,
            throughput_bins,
            rtt_bins,
            current: StateVector::default(),
            previous: StateVector::default(),
        }
    }

    pub fn space(&self) -> StateSpace {
        self.space
    }

    pub fn current(&self) -> StateVector {
        self.current
    }

    pub fn previous(&self) -> StateVector {
        self.previous
    }

    /// Discretizes a throughput estimate and RTT sample (us) into a new current state. The RTT
    /// is ignored by the throughput-only state space.
    pub fn update(&mut self, throughput: u32, rtt_us: u32) -> StateVector {
        self.previous = self.current;

        let throughput_bin = clamp_bin(throughput >> THROUGHPUT_BIN_SHIFT, self.throughput_bins);

        let rtt_bin = match self.space {
            StateSpace::Throughput => 0,
            StateSpace::ThroughputRtt => clamp_bin(rtt_us >> RTT_BIN_SHIFT, self.rtt_bins),
        };

        self.current = StateVector::new(throughput_bin, rtt_bin);
        self.current
    }
}
