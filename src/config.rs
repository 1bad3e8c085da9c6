use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::policy::ExplorationKind;
use crate::reward::RewardKind;
use crate::state::StateSpace;
use crate::update::Q_SCALE;

pub const BIN_COUNT_DEFAULT: usize = 100;
pub const BIN_COUNT_MAX: usize = 256;

const LEARNING_RATE_DEFAULT: i32 = 512;
const DISCOUNT_FACTOR_DEFAULT: i32 = 12;
const DISCOUNT_FACTOR_MAX: i32 = 16;

const TRAINING_INTERVAL_DEFAULT_MS: u32 = 100;
const PROBE_RTT_INTERVAL_DEFAULT_MS: u32 = 10_000;
const PROBE_RTT_DURATION_DEFAULT_MS: u32 = 200;
const PROBE_RTT_CWND_DEFAULT: u32 = 4;

// Same as the TCP initial window
const INITIAL_CWND_DEFAULT: u32 = 10;

/// Configuration for a [`Controller`](crate::Controller).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which measurements make up the learned state.
    ///
    /// Default value: `ThroughputRtt`
    pub state_space: StateSpace,

    /// Number of throughput bins. Each bin spans 512 throughput units.
    ///
    /// Maximum value: 256 \
    /// Default value: 100
    pub throughput_bins: usize,

    /// Number of RTT bins, ignored by the throughput-only state space. Each bin spans 8192 us.
    ///
    /// Maximum value: 256 \
    /// Default value: 100
    pub rtt_bins: usize,

    /// Learning rate, in units of 1/1024.
    ///
    /// Maximum value: 1024 \
    /// Default value: 512
    pub learning_rate: i32,

    /// Discount factor, in units of 1/16.
    ///
    /// Maximum value: 16 \
    /// Default value: 12
    pub discount_factor: i32,

    /// Time between learning steps, in milliseconds.
    ///
    /// Default value: 100
    pub training_interval_ms: u32,

    /// Time without a new minimum RTT after which the window is shrunk to re-measure it, in
    /// milliseconds.
    ///
    /// Default value: 10,000
    pub probe_rtt_interval_ms: u32,

    /// How long a min-RTT probe lasts, in milliseconds.
    ///
    /// Default value: 200
    pub probe_rtt_duration_ms: u32,

    /// Window cap while probing, in segments.
    ///
    /// Default value: 4
    pub probe_rtt_cwnd: u32,

    /// Window restored after the learned policy collapses, in segments.
    ///
    /// Default value: 10
    pub initial_cwnd: u32,

    /// Reward signal used by the update rule.
    pub reward: RewardKind,

    /// Exploration applied on top of greedy action selection.
    pub exploration: ExplorationKind,

    /// Seed for tie-break and exploration draws. Seeded from entropy when unset.
    pub rng_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_space: StateSpace::ThroughputRtt,
            throughput_bins: BIN_COUNT_DEFAULT,
            rtt_bins: BIN_COUNT_DEFAULT,
            learning_rate: LEARNING_RATE_DEFAULT,
            discount_factor: DISCOUNT_FACTOR_DEFAULT,
            training_interval_ms: TRAINING_INTERVAL_DEFAULT_MS,
            probe_rtt_interval_ms: PROBE_RTT_INTERVAL_DEFAULT_MS,
            probe_rtt_duration_ms: PROBE_RTT_DURATION_DEFAULT_MS,
            probe_rtt_cwnd: PROBE_RTT_CWND_DEFAULT,
            initial_cwnd: INITIAL_CWND_DEFAULT,
            reward: RewardKind::default(),
            exploration: ExplorationKind::default(),
            rng_seed: None,
        }
    }
}

impl Config {
    /// Configuration of the throughput-only controller.
    pub fn throughput_only() -> Self {
        Self {
            state_space: StateSpace::Throughput,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (dim, &bins) in [self.throughput_bins, self.rtt_bins]
            .iter()
            .enumerate()
            .take(self.state_space.dims())
        {
            if bins == 0 || bins > BIN_COUNT_MAX {
                return Err(ConfigError::BinCount {
                    dim,
                    found: bins,
                    max: BIN_COUNT_MAX,
                });
            }
        }

        if !(0..=Q_SCALE).contains(&self.learning_rate) {
            return Err(ConfigError::LearningRate {
                found: self.learning_rate,
                scale: Q_SCALE,
            });
        }

        if !(0..=DISCOUNT_FACTOR_MAX).contains(&self.discount_factor) {
            return Err(ConfigError::DiscountFactor(self.discount_factor));
        }

        if self.training_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval {
                name: "training_interval_ms",
            });
        }

        if self.probe_rtt_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval {
                name: "probe_rtt_interval_ms",
            });
        }

        self.exploration.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
        assert_eq!(Config::throughput_only().validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_values() {
        let config = Config {
            throughput_bins: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BinCount { dim: 0, .. })
        ));

        let config = Config {
            learning_rate: Q_SCALE + 1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LearningRate { .. })
        ));

        let config = Config {
            discount_factor: 17,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::DiscountFactor(17)));

        let config = Config {
            training_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroInterval { .. })
        ));
    }

    #[test]
    fn rtt_bins_ignored_for_throughput_only() {
        let config = Config {
            rtt_bins: 0,
            ..Config::throughput_only()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            state_space = "Throughput"
            learning_rate = 256
            rng_seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.state_space, StateSpace::Throughput);
        assert_eq!(config.learning_rate, 256);
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.discount_factor, DISCOUNT_FACTOR_DEFAULT);
    }
}
