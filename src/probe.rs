use crate::controller::LossState;
use crate::time;

/// Operating mode of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Growing the window by every acked segment until the first loss recovery.
    Startup,
    /// Learning and acting on the learned policy.
    Normal,
    /// Window held small to measure an uninflated RTT.
    ProbingMinRtt,
}

/// Adds newly acked segments to the window until the host enters loss recovery.
pub fn startup(mode: &mut Mode, loss_state: LossState, acked_sacked: u32, cwnd: &mut u32) {
    if *mode != Mode::Startup {
        return;
    }

    if loss_state >= LossState::Recovery {
        tracing::info!(cwnd = *cwnd, "startup finished");
        *mode = Mode::Normal;
    } else {
        *cwnd = cwnd.saturating_add(acked_sacked);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ProbeParams {
    pub interval_ms: u32,
    pub duration_ms: u32,
    pub cwnd: u32,
}

/// Tracks the minimum RTT and periodically shrinks the window to refresh it.
#[derive(Clone, Debug)]
pub struct RttProbe {
    params: ProbeParams,
    // Minimum since the last probe
    min_rtt_us: u32,
    // Minimum over the connection lifetime
    prop_rtt_us: u32,
    // Time of the last new minimum, or of entering the probe
    stamp_ms: u32,
    // Window in effect before the probe
    prior_cwnd: u32,
}

impl RttProbe {
    pub fn new(params: ProbeParams, min_rtt_us: u32, now_ms: u32) -> Self {
        Self {
            params,
            min_rtt_us,
            prop_rtt_us: min_rtt_us,
            stamp_ms: now_ms,
            prior_cwnd: 0,
        }
    }

    pub fn min_rtt_us(&self) -> u32 {
        self.min_rtt_us
    }

    pub fn prop_rtt_us(&self) -> u32 {
        self.prop_rtt_us
    }

    pub fn prior_cwnd(&self) -> u32 {
        self.prior_cwnd
    }

    pub fn step(&mut self, mode: &mut Mode, rtt_us: u32, now_ms: u32, cwnd: &mut u32) {
        // Evaluated before a new minimum can push the deadline back
        let probe_due = time::after(now_ms, self.stamp_ms.wrapping_add(self.params.interval_ms));

        if rtt_us > 0 && rtt_us < self.min_rtt_us {
            self.min_rtt_us = rtt_us;
            self.stamp_ms = now_ms;

            if self.min_rtt_us < self.prop_rtt_us {
                self.prop_rtt_us = self.min_rtt_us;
            }
        }

        if probe_due && *mode == Mode::Normal {
            tracing::info!(cwnd = *cwnd, min_rtt_us = self.min_rtt_us, "probing min rtt");

            *mode = Mode::ProbingMinRtt;
            self.stamp_ms = now_ms;
            self.prior_cwnd = *cwnd;
            *cwnd = (*cwnd).min(self.params.cwnd);
            self.min_rtt_us = rtt_us;
        }

        if *mode == Mode::ProbingMinRtt {
            let probe_done =
                time::after(now_ms, self.stamp_ms.wrapping_add(self.params.duration_ms));

            if probe_done {
                tracing::info!(
                    cwnd = self.prior_cwnd,
                    min_rtt_us = self.min_rtt_us,
                    "min rtt probe finished"
                );

                *mode = Mode::Normal;
                *cwnd = self.prior_cwnd;
            }
        }
    }
}
