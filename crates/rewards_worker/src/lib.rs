//! Library half of the sharded reward-assignment worker: the binary in
//! `main.rs` is a thin shell around [`run`] so integration tests can drive
//! the whole pipeline without spawning a subprocess.

pub mod config;
pub mod dispatch;
pub mod plan;
pub mod signals;

use anyhow::{Context, Result};
use config::WorkerConfig;
use rayon::prelude::*;
use rewards_protocol::{Stats, StatsSnapshot};
use rewards_shard::prune_stale_outputs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Run one full pass: prune stale outputs, plan this node's share of the
/// work, and drive it to completion (or until `termination_flag` is
/// observed at a unit boundary). Returns the final stats snapshot.
pub fn run(config: &WorkerConfig, termination_flag: Arc<AtomicBool>) -> Result<StatsSnapshot> {
    let stats = Arc::new(Stats::new());

    prune_stale_outputs(&config.input_root, &config.output_root, config.reprocess_all)
        .context("failed to prune stale outputs")?;

    let units = plan::plan_units(
        &config.input_root,
        &config.output_root,
        config.node_id,
        config.node_count,
        &stats,
    )
    .context("failed to plan this node's share of the work")?;

    info!(units = units.len(), "planned file groups owned by this node");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .context("failed to build worker thread pool")?;

    pool.install(|| {
        units.par_iter().for_each(|unit| {
            if termination_flag.load(Ordering::Relaxed) {
                return;
            }
            dispatch::process_unit(unit, &config.unrecoverable_root, &config.engine, &stats);
        });
    });

    if termination_flag.load(Ordering::Relaxed) {
        warn!("termination signal received: exiting after finishing in-flight units");
    }

    Ok(stats.snapshot())
}
