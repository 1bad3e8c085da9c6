use serde::{Deserialize, Serialize};

/// Measurements available to a reward strategy at a learning step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RewardInput {
    pub throughput: u32,
    pub previous_throughput: u32,
    pub rtt_us: u32,
    pub previous_rtt_us: u32,
    pub min_rtt_us: u32,
    /// Retransmits per training interval, as of the latest estimate.
    pub retransmit_rate: u32,
}

/// Scores the transition that led to the current measurements.
pub trait Reward: Send {
    fn reward(&mut self, input: &RewardInput) -> i32;
}

/// Scores a transition with `strategy`, or yields zero when the inputs lack an RTT sample.
pub fn score(strategy: &mut dyn Reward, input: &RewardInput) -> i32 {
    let retransmit_divisor = input.retransmit_rate.wrapping_add(1);
    if retransmit_divisor == 0 || input.rtt_us == 0 {
        return 0;
    }

    let reward = strategy.reward(input);
    tracing::debug!(reward, "reward");
    reward
}

/// Selects one of the built-in strategies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardKind {
    #[default]
    ThroughputDelta,
    Utility,
    PowerRatio,
}

impl RewardKind {
    pub fn build(self) -> Box<dyn Reward> {
        match self {
            Self::ThroughputDelta => Box::new(ThroughputDelta),
            Self::Utility => Box::new(Utility::default()),
            Self::PowerRatio => Box::new(PowerRatio::default()),
        }
    }
}

/// Change in estimated throughput since the previous learning step.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThroughputDelta;

impl Reward for ThroughputDelta {
    fn reward(&mut self, input: &RewardInput) -> i32 {
        input.throughput.wrapping_sub(input.previous_throughput) as i32
    }
}

fn softsign_scaled(value: i64, knee: i64) -> i64 {
    (value * 10) / (value.abs() + knee)
}

/// Throughput difference squashed into -9..=9.
pub fn softsign_throughput(value: i64) -> i64 {
    softsign_scaled(value, 2000)
}

/// Delay difference squashed into -9..=9.
pub fn softsign_rtt(value: i64) -> i64 {
    softsign_scaled(value, 800)
}

/// A signed relative value squashed into 0..=19, for use as a state component.
pub fn softsign(value: i64) -> i64 {
    softsign_scaled(value, 1000) + 9
}

/// `value` relative to `throughput`, squashed into 0..=9, for use as a state component.
pub fn softsign_relative(value: i64, throughput: i64) -> i64 {
    let value = if value == 0 { 1 } else { value };
    (value * 10).checked_div(value + throughput).unwrap_or(0)
}

// EWMA gain of 1/8
const SMOOTHING_SHIFT: u32 = 3;
const UTILITY_RATIO_MAX: i64 = 20;

/// Utility = 3 * throughput gain - delay gain - smoothed/current throughput ratio
///
/// Both gains are squashed so neither dominates. The smoothed throughput is tracked by the
/// strategy itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct Utility {
    smooth_throughput: Option<u32>,
}

impl Reward for Utility {
    fn reward(&mut self, input: &RewardInput) -> i32 {
        let throughput = i64::from(input.throughput);
        let smooth = i64::from(self.smooth_throughput.unwrap_or(input.throughput));

        let diff_throughput = softsign_throughput(throughput - smooth);

        let min_rtt = i64::from(input.min_rtt_us);
        let queueing_now = i64::from(input.rtt_us) - min_rtt;
        let queueing_before = i64::from(input.previous_rtt_us) - min_rtt;
        let diff_delay = softsign_rtt(queueing_now - queueing_before);

        let ratio = (smooth / throughput.max(1)).min(UTILITY_RATIO_MAX);

        let smooth = smooth - (smooth >> SMOOTHING_SHIFT) + (throughput >> SMOOTHING_SHIFT);
        self.smooth_throughput = Some(smooth as u32);

        (3 * diff_throughput - diff_delay - ratio) as i32
    }
}

/// alpha * throughput / (beta * rtt) / (delta * (retransmit rate + 1))
#[derive(Clone, Copy, Debug)]
pub struct PowerRatio {
    pub alpha: u64,
    pub beta: u64,
    pub delta: u64,
}

impl Default for PowerRatio {
    fn default() -> Self {
        Self {
            alpha: 200,
            beta: 1,
            delta: 1,
        }
    }
}

impl Reward for PowerRatio {
    fn reward(&mut self, input: &RewardInput) -> i32 {
        let retransmit_divisor = u64::from(input.retransmit_rate) + 1;

        let value = (self.alpha * u64::from(input.throughput))
            .checked_div(self.beta * u64::from(input.rtt_us))
            .and_then(|v| v.checked_div(self.delta * retransmit_divisor))
            .unwrap_or(0);

        value.min(i32::MAX as u64) as i32
    }
}
