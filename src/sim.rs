//! A deterministic single-bottleneck link model for driving controllers without a network.
//!
//! Every flow sends `cwnd` segments per RTT into a shared drop-tail queue which drains at the
//! link capacity. Overflow is dropped (and counted as retransmits for the sender), and the RTT
//! grows with the standing queue.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::controller::{HostContext, LossState, RateSample};

// Fractional segments are carried in thousandths
const CREDIT_UNIT: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("link capacity must not be zero")]
    ZeroCapacity,

    #[error("RTT must not be zero")]
    ZeroRtt,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Bottleneck capacity in segments per second.
    pub capacity_segs_per_sec: u64,
    /// Propagation RTT, in microseconds.
    pub base_rtt_us: u32,
    /// Queue size in segments.
    pub buffer_segs: u64,
    pub mss: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            // ~50 Mbit/s at 1500 bytes per segment
            capacity_segs_per_sec: 4_000,
            base_rtt_us: 20_000,
            buffer_segs: 100,
            mss: 1500,
        }
    }
}

/// Sender-side state of one simulated connection; the host side of a controller.
#[derive(Clone, Debug)]
pub struct Flow {
    now_ms: u32,
    cwnd: u32,
    rtt_us: u32,
    min_rtt_us: u32,
    segs_out: u32,
    total_retrans: u32,
    delivered: u64,
    queued: u64,
    credit: u64,
}

impl Flow {
    /// A flow over a path with the given propagation RTT. Sending is paced by the RTT, so it
    /// must not be zero.
    pub fn new(cwnd: u32, base_rtt_us: u32) -> Result<Self, LinkError> {
        if base_rtt_us == 0 {
            return Err(LinkError::ZeroRtt);
        }

        Ok(Self {
            now_ms: 0,
            cwnd,
            rtt_us: base_rtt_us,
            min_rtt_us: base_rtt_us,
            segs_out: 0,
            total_retrans: 0,
            delivered: 0,
            queued: 0,
            credit: 0,
        })
    }

    /// Segments delivered so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn rtt_us(&self) -> u32 {
        self.rtt_us
    }

    pub fn total_retrans(&self) -> u32 {
        self.total_retrans
    }
}

impl HostContext for Flow {
    fn now_ms(&self) -> u32 {
        self.now_ms
    }

    fn cwnd(&self) -> u32 {
        self.cwnd
    }

    fn set_cwnd(&mut self, cwnd: u32) {
        self.cwnd = cwnd;
    }

    fn min_rtt_us(&self) -> u32 {
        self.min_rtt_us
    }
}

pub struct Link {
    config: LinkConfig,
    now_ms: u32,
    capacity_credit: u64,
}

impl Link {
    pub fn new(config: LinkConfig) -> Result<Self, LinkError> {
        if config.capacity_segs_per_sec == 0 {
            return Err(LinkError::ZeroCapacity);
        }

        if config.base_rtt_us == 0 {
            return Err(LinkError::ZeroRtt);
        }

        Ok(Self {
            config,
            now_ms: 0,
            capacity_credit: 0,
        })
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn now_ms(&self) -> u32 {
        self.now_ms
    }

    /// Advances the link by `tick_ms` and returns one rate sample per flow.
    pub fn step(&mut self, flows: &mut [Flow], tick_ms: u32) -> Vec<RateSample> {
        self.now_ms = self.now_ms.wrapping_add(tick_ms);
        let tick_us = u64::from(tick_ms) * 1000;

        // Enqueue what each flow's window allows over this tick
        for flow in flows.iter_mut() {
            flow.now_ms = self.now_ms;

            let units = u64::from(flow.cwnd) * tick_us * CREDIT_UNIT / u64::from(flow.rtt_us);
            let units = units + flow.credit;
            let segs = units / CREDIT_UNIT;
            flow.credit = units % CREDIT_UNIT;

            flow.segs_out = flow.segs_out.wrapping_add(segs as u32);
            flow.queued += segs;
        }

        let capacity_units = self.config.capacity_segs_per_sec * tick_us * CREDIT_UNIT / 1_000_000;
        let capacity_units = capacity_units + self.capacity_credit;
        let capacity = capacity_units / CREDIT_UNIT;
        self.capacity_credit = capacity_units % CREDIT_UNIT;

        // Drop-tail, charged to each flow in proportion to its share of the queue
        let mut dropped = vec![0; flows.len()];
        let total: u64 = flows.iter().map(|f| f.queued).sum();
        let limit = self.config.buffer_segs + capacity;
        if total > limit {
            let excess = total - limit;
            for (flow, dropped) in flows.iter_mut().zip(dropped.iter_mut()) {
                *dropped = (flow.queued * excess).div_ceil(total).min(flow.queued);
                flow.queued -= *dropped;
                flow.total_retrans = flow.total_retrans.wrapping_add(*dropped as u32);
            }
        }

        // Drain
        let total: u64 = flows.iter().map(|f| f.queued).sum();
        let mut delivered = vec![0; flows.len()];
        for (flow, delivered) in flows.iter_mut().zip(delivered.iter_mut()) {
            *delivered = if total <= capacity {
                flow.queued
            } else {
                flow.queued * capacity / total
            };
            flow.queued -= *delivered;
            flow.delivered += *delivered;
        }

        let standing: u64 = flows.iter().map(|f| f.queued).sum();
        let queueing_us = standing * 1_000_000 / self.config.capacity_segs_per_sec;
        let rtt_us = u64::from(self.config.base_rtt_us) + queueing_us;
        let rtt_us = u32::try_from(rtt_us).unwrap_or(u32::MAX);

        flows
            .iter_mut()
            .enumerate()
            .map(|(i, flow)| {
                flow.rtt_us = rtt_us;

                RateSample {
                    // No acks, no measurement
                    rtt_us: if delivered[i] > 0 { rtt_us } else { 0 },
                    acked_sacked: delivered[i] as u32,
                    loss_state: if dropped[i] > 0 {
                        LossState::Recovery
                    } else {
                        LossState::Open
                    },
                    segs_out: flow.segs_out,
                    mss: self.config.mss,
                    total_retrans: flow.total_retrans,
                }
            })
            .collect()
    }
}
