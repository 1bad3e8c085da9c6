/*

tcpql learns a congestion window policy online with tabular Q-learning.

# Control loop

The host delivers a rate sample on every ack. Every 100 ms (the training interval), the controller
estimates throughput over the elapsed interval:

  throughput <- (segs_out - last_segs_out) * mss * 8 / elapsed_ms

discretizes it (and, with the two-dimensional state space, the latest RTT sample) into a state,
scores the transition from the previous state, backs up the value of the previous action, and
then picks and applies the next action.

# State

  throughput bin <- clamp(throughput >> 9, 0, 99)
  rtt bin        <- clamp(rtt_us >> 13, 0, 99)       (~8 ms per bin)

With the throughput-only state space, the state is recomputed once per training step. With the
throughput + RTT state space, the state is recomputed on every rate sample using the most recent
throughput estimate, so the previous state is whatever the previous sample produced.

# Actions

  0: cwnd <- cwnd + 30 / cwnd
  1: cwnd <- cwnd + 1
  2: cwnd <- cwnd - cwnd / 2
  3: nothing

The greedy action is the first maximum over the row for the current state. If the whole row is
equal (e.g. a state never visited), an action is picked uniformly at random. An epsilon-greedy
mode is available but not used by default.

# Value table

All connections share one table of Q10 values. Its storage is zeroed when the first connection
attaches and never again; what one connection learns is seen by every other. Entries are laid
out as

  index <- 4 * (s0 * rows[1] + s1) + a

and the table is locked per access, not per update, so concurrent connections can lose updates.

# Update

  q' <- ((1024 - lr) * q + lr * (reward + (df * max_a' q(s', a') >> 4))) >> 10

with lr = 512 and df = 12 by default. The default reward is the change in throughput estimate. If
q' comes out as exactly zero the entry is left alone and the connection is flagged; its next
training step resets cwnd to 10 instead of learning. This recovers from a policy that has
collapsed to an all-zero row.

# Min RTT probe

Independently of training, a new minimum RTT sample pushes back a 10 s deadline. When the
deadline passes, cwnd is saved and capped to 4 segments for 200 ms to drain queues and measure an
uninflated RTT, and then restored. Training is suspended while probing.

# Startup

With the throughput + RTT state space, a connection starts by adding every acked segment to cwnd,
and starts learning once the host reports loss recovery.

*/

pub mod action;
pub mod config;
pub mod controller;
mod error;
pub mod policy;
pub mod probe;
pub mod reward;
pub mod sim;
pub mod state;
pub mod table;
pub mod time;
pub mod update;

pub use action::Action;
pub use config::Config;
pub use controller::{Controller, HostContext, LossState, RateSample, Stats};
pub use error::ConfigError;
pub use probe::Mode;
pub use state::{StateSpace, StateVector};
pub use table::SharedTable;
