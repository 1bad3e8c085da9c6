use crate::action::{self, Action};
use crate::config::Config;
use crate::error::ConfigError;
use crate::policy::Selector;
use crate::probe::{self, Mode, ProbeParams, RttProbe};
use crate::reward::{self, Reward, RewardInput};
use crate::state::{Discretizer, StateSpace, StateVector};
use crate::table::{Layout, SharedTable};
use crate::time;
use crate::update::{self, LearningParams, Outcome};

/// Returned by [`Controller::ssthresh`]; the learned policy never uses a slow start threshold.
pub const INFINITE_SSTHRESH: u32 = 0x7fff_ffff;

/// Loss recovery severity reported by the host, in increasing order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LossState {
    #[default]
    Open,
    Disorder,
    Cwr,
    Recovery,
    Loss,
}

/// Measurements delivered by the host with every rate sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RateSample {
    /// Round trip time in microseconds, zero if unknown.
    pub rtt_us: u32,
    /// Segments newly acknowledged or selectively acknowledged.
    pub acked_sacked: u32,
    pub loss_state: LossState,
    /// Total segments sent over the connection lifetime.
    pub segs_out: u32,
    pub mss: u32,
    /// Total retransmits over the connection lifetime.
    pub total_retrans: u32,
}

pub trait HostContext {
    // Current time in milliseconds; may wrap
    fn now_ms(&self) -> u32;

    // Current congestion window, in segments
    fn cwnd(&self) -> u32;

    // Called to replace the congestion window
    fn set_cwnd(&mut self, cwnd: u32);

    // Host's current minimum RTT estimate, in microseconds
    fn min_rtt_us(&self) -> u32;
}

/// A point-in-time view of a controller's state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stats {
    pub mode: Mode,
    pub exited: bool,
    pub action: Option<Action>,
    pub state: StateVector,
    pub previous_state: StateVector,
    pub throughput: u32,
    pub previous_throughput: u32,
    pub retransmit_rate: u32,
    pub last_update_ms: u32,
    pub min_rtt_us: u32,
    pub prop_rtt_us: u32,
    pub prior_cwnd: u32,
}

/// Per-connection learning controller.
pub struct Controller {
    params: LearningParams,
    training_interval_ms: u32,
    initial_cwnd: u32,

    table: SharedTable,
    layout: Layout,

    discretizer: Discretizer,
    reward: Box<dyn Reward>,
    selector: Selector,
    probe: RttProbe,

    mode: Mode,
    // Set when an update collapsed to zero; the next step resets the window
    exited: bool,
    // Unset until the first action has been taken
    action: Option<Action>,

    throughput: u32,
    previous_throughput: u32,
    last_segs_out: u32,
    last_total_retrans: u32,
    retransmit_rate: u32,
    last_update_ms: u32,
    previous_rtt_us: u32,
}

impl Controller {
    /// Creates a controller for a connection and attaches it to `table`.
    pub fn init<C>(config: &Config, table: &SharedTable, ctx: &C) -> Result<Self, ConfigError>
    where
        C: HostContext,
    {
        config.validate()?;

        let layout = Layout::new(config.state_space, config.throughput_bins, config.rtt_bins)?;
        table.attach(&layout)?;

        let now_ms = ctx.now_ms();
        let min_rtt_us = ctx.min_rtt_us();

        let mode = match config.state_space {
            StateSpace::Throughput => Mode::Normal,
            StateSpace::ThroughputRtt => Mode::Startup,
        };

        let probe_params = ProbeParams {
            interval_ms: config.probe_rtt_interval_ms,
            duration_ms: config.probe_rtt_duration_ms,
            cwnd: config.probe_rtt_cwnd,
        };

        tracing::debug!(space = ?config.state_space, ?mode, min_rtt_us, "controller init");

        Ok(Self {
            params: LearningParams {
                learning_rate: config.learning_rate,
                discount_factor: config.discount_factor,
            },
            training_interval_ms: config.training_interval_ms,
            initial_cwnd: config.initial_cwnd,
            table: table.clone(),
            layout,
            discretizer: Discretizer::new(
                config.state_space,
                config.throughput_bins,
                config.rtt_bins,
            ),
            reward: config.reward.build(),
            selector: Selector::new(config.exploration.build(), config.rng_seed),
            probe: RttProbe::new(probe_params, min_rtt_us, now_ms),
            mode,
            exited: false,
            action: None,
            throughput: 0,
            previous_throughput: 0,
            last_segs_out: 0,
            last_total_retrans: 0,
            retransmit_rate: 0,
            last_update_ms: now_ms,
            previous_rtt_us: min_rtt_us,
        })
    }

    /// Replaces the reward strategy.
    pub fn set_reward(&mut self, reward: Box<dyn Reward>) {
        self.reward = reward;
    }

    /// Handles one rate sample. Called by the host on every ack.
    pub fn on_rate_sample<C>(&mut self, sample: &RateSample, ctx: &mut C)
    where
        C: HostContext,
    {
        let now_ms = ctx.now_ms();
        let cwnd_in = ctx.cwnd();
        let mut cwnd = cwnd_in;

        tracing::trace!(now_ms, cwnd, rtt_us = sample.rtt_us, "rate sample");

        match self.discretizer.space() {
            StateSpace::ThroughputRtt => {
                probe::startup(
                    &mut self.mode,
                    sample.loss_state,
                    sample.acked_sacked,
                    &mut cwnd,
                );
                self.discretizer.update(self.throughput, sample.rtt_us);
                self.train(sample, now_ms, &mut cwnd);
            }
            StateSpace::Throughput => {
                // Discretized within the training step, once fresh estimates exist
                self.train(sample, now_ms, &mut cwnd);
            }
        }

        self.previous_rtt_us = sample.rtt_us;

        self.probe.step(&mut self.mode, sample.rtt_us, now_ms, &mut cwnd);

        if cwnd != cwnd_in {
            ctx.set_cwnd(cwnd);
        }
    }

    /// Runs a learning step if the training interval has elapsed. Returns true if it did.
    fn train(&mut self, sample: &RateSample, now_ms: u32, cwnd: &mut u32) -> bool {
        let due = time::after(
            now_ms,
            self.last_update_ms.wrapping_add(self.training_interval_ms),
        );

        if !due || self.mode != Mode::Normal {
            return false;
        }

        let elapsed_ms = time::elapsed_ms(now_ms, self.last_update_ms);
        if elapsed_ms == 0 {
            return false;
        }

        if let Some(action) = self.action {
            self.estimate_throughput(sample, elapsed_ms);

            if self.discretizer.space() == StateSpace::Throughput {
                self.discretizer.update(self.throughput, sample.rtt_us);
            }

            self.estimate_retransmit_rate(sample, elapsed_ms);

            if self.exited {
                tracing::warn!(cwnd = self.initial_cwnd, "policy collapsed, resetting cwnd");

                *cwnd = self.initial_cwnd;
                self.exited = false;
                return true;
            }

            let input = RewardInput {
                throughput: self.throughput,
                previous_throughput: self.previous_throughput,
                rtt_us: sample.rtt_us,
                previous_rtt_us: self.previous_rtt_us,
                min_rtt_us: self.probe.min_rtt_us(),
                retransmit_rate: self.retransmit_rate,
            };

            let reward = reward::score(self.reward.as_mut(), &input);

            let outcome = update::update(
                &self.table,
                &self.layout,
                &self.params,
                &self.discretizer.previous(),
                action,
                &self.discretizer.current(),
                reward,
            );

            if outcome == Outcome::Collapsed {
                self.exited = true;
            }
        }

        let row = self.table.row(&self.layout, &self.discretizer.current());
        let action = self.selector.select(&row);

        *cwnd = action.apply(*cwnd);

        tracing::debug!(?action, cwnd = *cwnd, state = ?self.discretizer.current(), "action");

        self.action = Some(action);
        self.last_update_ms = now_ms;

        true
    }

    fn estimate_throughput(&mut self, sample: &RateSample, elapsed_ms: u32) {
        let segs = sample.segs_out.wrapping_sub(self.last_segs_out);
        let bits = u64::from(segs) * u64::from(sample.mss) * 8;

        self.previous_throughput = self.throughput;
        self.throughput = u32::try_from(bits / u64::from(elapsed_ms)).unwrap_or(u32::MAX);
        self.last_segs_out = sample.segs_out;
    }

    fn estimate_retransmit_rate(&mut self, sample: &RateSample, elapsed_ms: u32) {
        let retrans = sample.total_retrans.wrapping_sub(self.last_total_retrans);
        let scaled = u64::from(retrans) * u64::from(self.training_interval_ms);

        self.retransmit_rate = u32::try_from(scaled / u64::from(elapsed_ms)).unwrap_or(u32::MAX);
        self.last_total_retrans = sample.total_retrans;
    }

    /// Slow start threshold for the host; unused by this controller.
    pub fn ssthresh(&self) -> u32 {
        INFINITE_SSTHRESH
    }

    /// Window to restore when the host undoes a spurious loss response.
    pub fn undo_cwnd<C>(&self, ctx: &C) -> u32
    where
        C: HostContext,
    {
        action::undo_cwnd(ctx.cwnd(), self.probe.prior_cwnd())
    }

    /// Tears down the controller, detaching it from the shared table.
    pub fn release(self) {
        tracing::debug!("controller release");
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn table(&self) -> &SharedTable {
        &self.table
    }

    pub fn stats(&self) -> Stats {
        Stats {
            mode: self.mode,
            exited: self.exited,
            action: self.action,
            state: self.discretizer.current(),
            previous_state: self.discretizer.previous(),
            throughput: self.throughput,
            previous_throughput: self.previous_throughput,
            retransmit_rate: self.retransmit_rate,
            last_update_ms: self.last_update_ms,
            min_rtt_us: self.probe.min_rtt_us(),
            prop_rtt_us: self.probe.prop_rtt_us(),
            prior_cwnd: self.probe.prior_cwnd(),
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.table.detach();
    }
}
