use tcpql::{HostContext, LossState, RateSample};

/// A host whose clock and window are set directly by the test.
#[derive(Debug)]
pub struct MockHost {
    pub now_ms: u32,
    pub cwnd: u32,
    pub min_rtt_us: u32,
    pub set_count: usize,
}

impl MockHost {
    pub fn new(cwnd: u32, min_rtt_us: u32) -> Self {
        Self {
            now_ms: 0,
            cwnd,
            min_rtt_us,
            set_count: 0,
        }
    }
}

impl HostContext for MockHost {
    fn now_ms(&self) -> u32 {
        self.now_ms
    }

    fn cwnd(&self) -> u32 {
        self.cwnd
    }

    fn set_cwnd(&mut self, cwnd: u32) {
        self.cwnd = cwnd;
        self.set_count += 1;
    }

    fn min_rtt_us(&self) -> u32 {
        self.min_rtt_us
    }
}

pub fn sample(segs_out: u32, rtt_us: u32) -> RateSample {
    RateSample {
        rtt_us,
        acked_sacked: 1,
        loss_state: LossState::Open,
        segs_out,
        mss: 1000,
        total_retrans: 0,
    }
}
