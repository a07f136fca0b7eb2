//! Sharded reward-assignment worker.
//!
//! Reads `NODE_ID`/`NODE_COUNT`/`REWARD_WINDOW`/... from the environment (or
//! matching CLI flags), prunes stale outputs, plans this node's share of the
//! work, and drives it across a bounded pool of OS threads -- one file
//! group (one identity) per task -- until the work is exhausted or a
//! termination signal is received.

use anyhow::{Context, Result};
use rewards_worker::config::WorkerConfig;
use rewards_worker::{run, signals};
use tracing::info;

fn main() -> Result<()> {
    let config = WorkerConfig::load()?;

    rewards_logging::init_logging(rewards_logging::LogConfig {
        app_name: "rewards_worker",
        verbose: config.verbose,
    })
    .context("failed to initialize logging")?;

    info!(
        node_id = config.node_id,
        node_count = config.node_count,
        reward_window_secs = config.engine.reward_window.as_secs(),
        reprocess_all = config.reprocess_all,
        input_root = %config.input_root.display(),
        output_root = %config.output_root.display(),
        "starting rewards worker"
    );

    let termination_flag = signals::install().context("failed to install signal handler")?;
    let summary = run(&config, termination_flag)?;

    info!(summary = %summary.summary(), "rewards worker finished");
    Ok(())
}
