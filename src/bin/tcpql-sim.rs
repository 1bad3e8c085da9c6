use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tcpql::sim::{Flow, Link, LinkConfig};
use tcpql::{Config, Controller, SharedTable, StateSpace};

const TICK_MS: u32 = 1;
const REPORT_INTERVAL_MS: u32 = 1000;

/// Runs learning controllers over a simulated bottleneck link.
#[derive(Parser, Debug)]
struct Args {
    /// Number of flows sharing the bottleneck (and the value table)
    #[arg(long, default_value_t = 2)]
    flows: usize,

    /// Simulated duration in seconds
    #[arg(long, default_value_t = 60)]
    duration_secs: u32,

    /// Link capacity in segments per second
    #[arg(long, default_value_t = 4_000)]
    capacity: u64,

    /// Propagation RTT in milliseconds
    #[arg(long, default_value_t = 20)]
    base_rtt_ms: u32,

    /// Bottleneck buffer in segments
    #[arg(long, default_value_t = 100)]
    buffer: u64,

    /// Use the throughput-only state space
    #[arg(long)]
    throughput_only: bool,

    /// Controller configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match args.config {
        Some(ref path) => toml::from_str(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };

    if args.throughput_only {
        config.state_space = StateSpace::Throughput;
    }

    config.validate()?;

    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let link_config = LinkConfig {
        capacity_segs_per_sec: args.capacity,
        base_rtt_us: args.base_rtt_ms * 1000,
        buffer_segs: args.buffer,
        ..Default::default()
    };

    let table = SharedTable::new();
    let mut link = Link::new(link_config)?;

    let mut flows = Vec::new();
    let mut controllers = Vec::new();

    for i in 0..args.flows {
        let flow = Flow::new(config.initial_cwnd, link.config().base_rtt_us)?;

        // Distinct but reproducible draws per flow
        let flow_config = Config {
            rng_seed: config.rng_seed.map(|seed| seed.wrapping_add(i as u64)),
            ..config.clone()
        };

        controllers.push(Controller::init(&flow_config, &table, &flow)?);
        flows.push(flow);
    }

    let mut last_delivered = vec![0; flows.len()];
    let total_ticks = args.duration_secs * 1000 / TICK_MS;

    for _ in 0..total_ticks {
        let samples = link.step(&mut flows, TICK_MS);

        let hosts = controllers.iter_mut().zip(flows.iter_mut());
        for ((controller, flow), sample) in hosts.zip(samples.iter()) {
            controller.on_rate_sample(sample, flow);
        }

        if link.now_ms() % REPORT_INTERVAL_MS == 0 {
            for (i, (controller, flow)) in controllers.iter().zip(flows.iter()).enumerate() {
                let delivered = flow.delivered() - last_delivered[i];
                last_delivered[i] = flow.delivered();

                let stats = controller.stats();

                tracing::info!(
                    t_ms = link.now_ms(),
                    flow = i,
                    cwnd = tcpql::HostContext::cwnd(flow),
                    rtt_us = flow.rtt_us(),
                    segs_per_sec = delivered,
                    mode = ?stats.mode,
                    state = ?stats.state,
                    "report"
                );
            }
        }
    }

    let learned = table.snapshot().iter().filter(|&&q| q != 0).count();
    tracing::info!(learned, "finished");

    for controller in controllers {
        controller.release();
    }

    Ok(())
}
