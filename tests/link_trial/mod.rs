use std::thread;

use tcpql::sim::{Flow, Link, LinkConfig};
use tcpql::{Controller, HostContext, SharedTable, StateSpace};

const TICK_MS: u32 = 1;

#[derive(Clone, Debug)]
pub struct Config {
    /// Independent links, each driven from its own thread.
    pub link_count: usize,
    /// Flows sharing each link.
    pub flows_per_link: usize,
    pub duration_ms: u32,
    pub link: LinkConfig,
    pub controller: tcpql::Config,
}

#[derive(Debug, Default)]
pub struct FlowSummary {
    pub delivered: u64,
    pub min_cwnd: u32,
    pub max_cwnd: u32,
    pub actions_taken: usize,
}

fn check_bins(config: &tcpql::Config, controller: &Controller) {
    let state = controller.stats().state;

    assert!(state.throughput() < config.throughput_bins);

    match config.state_space {
        StateSpace::Throughput => assert_eq!(state.rtt(), 0),
        StateSpace::ThroughputRtt => assert!(state.rtt() < config.rtt_bins),
    }
}

fn run_link(id: usize, table: SharedTable, config: Config) -> Vec<FlowSummary> {
    let mut link = Link::new(config.link.clone()).unwrap();

    let mut flows = Vec::new();
    let mut controllers = Vec::new();
    let mut summaries = Vec::new();

    for i in 0..config.flows_per_link {
        let flow = Flow::new(config.controller.initial_cwnd, link.config().base_rtt_us).unwrap();

        let controller_config = tcpql::Config {
            rng_seed: Some((id * config.flows_per_link + i) as u64),
            ..config.controller.clone()
        };

        let controller = Controller::init(&controller_config, &table, &flow).unwrap();

        summaries.push(FlowSummary {
            min_cwnd: flow.cwnd(),
            max_cwnd: flow.cwnd(),
            ..Default::default()
        });
        controllers.push(controller);
        flows.push(flow);
    }

    for _ in 0..config.duration_ms / TICK_MS {
        let samples = link.step(&mut flows, TICK_MS);

        for (i, sample) in samples.iter().enumerate() {
            let last_update_ms = controllers[i].stats().last_update_ms;

            controllers[i].on_rate_sample(sample, &mut flows[i]);

            let cwnd = flows[i].cwnd();
            assert!(cwnd >= 1, "flow {} window collapsed to zero", i);
            check_bins(&config.controller, &controllers[i]);

            let summary = &mut summaries[i];
            summary.min_cwnd = summary.min_cwnd.min(cwnd);
            summary.max_cwnd = summary.max_cwnd.max(cwnd);
            if controllers[i].stats().last_update_ms != last_update_ms {
                summary.actions_taken += 1;
            }
        }
    }

    for (summary, flow) in summaries.iter_mut().zip(flows.iter()) {
        summary.delivered = flow.delivered();
    }

    for controller in controllers {
        controller.release();
    }

    summaries
}

/// Runs every link to completion and returns per-flow summaries, link by link.
pub fn run(config: Config, table: &SharedTable) -> Vec<FlowSummary> {
    let mut link_threads = Vec::new();

    for id in 0..config.link_count {
        let table = table.clone();
        let config = config.clone();

        link_threads.push(thread::spawn(move || run_link(id, table, config)));
    }

    let mut summaries = Vec::new();

    for link_thread in link_threads {
        summaries.extend(link_thread.join().unwrap());
    }

    summaries
}
