use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::action::{Action, ACTION_COUNT};
use crate::error::ConfigError;

const EPSILON_DRAW_RANGE: u32 = 10;
// Draws 0..=8 out of 0..=9 exploit
const EPSILON_THRESHOLD_DEFAULT: u32 = 8;

/// Picks the action with the largest value. The first maximum wins, unless every action has
/// the same value, in which case the pick is uniformly random.
pub fn greedy<R>(row: &[i32; ACTION_COUNT], rng: &mut R) -> Action
where
    R: Rng + ?Sized,
{
    if row.iter().all(|&q| q == row[0]) {
        return Action::ALL[rng.gen_range(0..ACTION_COUNT)];
    }

    let mut best = 0;
    for (i, &q) in row.iter().enumerate().skip(1) {
        if q > row[best] {
            best = i;
        }
    }

    Action::ALL[best]
}

/// Optionally overrides the greedy choice.
pub trait Exploration: Send {
    fn explore(&mut self, greedy: Action, rng: &mut dyn RngCore) -> Action;
}

/// Always exploits.
#[derive(Clone, Copy, Debug, Default)]
pub struct Greedy;

impl Exploration for Greedy {
    fn explore(&mut self, greedy: Action, _rng: &mut dyn RngCore) -> Action {
        greedy
    }
}

/// Exploits when a draw from 0..10 is at most `threshold`, otherwise picks any action
/// uniformly.
#[derive(Clone, Copy, Debug)]
pub struct EpsilonGreedy {
    pub threshold: u32,
}

impl Default for EpsilonGreedy {
    fn default() -> Self {
        Self {
            threshold: EPSILON_THRESHOLD_DEFAULT,
        }
    }
}

impl Exploration for EpsilonGreedy {
    fn explore(&mut self, greedy: Action, rng: &mut dyn RngCore) -> Action {
        if rng.next_u32() % EPSILON_DRAW_RANGE <= self.threshold {
            return greedy;
        }

        Action::ALL[rng.next_u32() as usize % ACTION_COUNT]
    }
}

/// Selects one of the built-in exploration strategies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExplorationKind {
    #[default]
    Greedy,
    EpsilonGreedy { threshold: u32 },
}

impl ExplorationKind {
    pub fn epsilon_greedy() -> Self {
        Self::EpsilonGreedy {
            threshold: EPSILON_THRESHOLD_DEFAULT,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::EpsilonGreedy { threshold } if threshold >= EPSILON_DRAW_RANGE => {
                Err(ConfigError::EpsilonThreshold(threshold))
            }
            _ => Ok(()),
        }
    }

    pub fn build(self) -> Box<dyn Exploration> {
        match self {
            Self::Greedy => Box::new(Greedy),
            Self::EpsilonGreedy { threshold } => Box::new(EpsilonGreedy { threshold }),
        }
    }
}

/// Greedy selection followed by an exploration strategy, with its own random source.
pub struct Selector {
    exploration: Box<dyn Exploration>,
    rng: StdRng,
}

impl Selector {
    pub fn new(exploration: Box<dyn Exploration>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self { exploration, rng }
    }

    pub fn select(&mut self, row: &[i32; ACTION_COUNT]) -> Action {
        let action = greedy(row, &mut self.rng);
        self.exploration.explore(action, &mut self.rng)
    }
}
