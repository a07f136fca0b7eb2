//! Environment/CLI configuration contract for the worker binary.
//!
//! Every knob is readable from its environment variable (the contract the
//! job-array launcher actually sets) but also exposed as a `clap` flag so a
//! local dry-run or integration test can override it without touching the
//! process environment.

use anyhow::{bail, Context, Result};
use clap::Parser;
use rewards_protocol::EngineConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "rewards-worker", about = "Sharded reward-assignment worker")]
pub struct Cli {
    /// Zero-based index of this node within the job array.
    #[arg(long, env = "NODE_ID")]
    pub node_id: u32,

    /// Total number of nodes in the job array.
    #[arg(long, env = "NODE_COUNT")]
    pub node_count: u32,

    /// Reward window W, in seconds.
    #[arg(long = "reward-window", env = "REWARD_WINDOW")]
    pub reward_window_secs: u64,

    /// Value attributed to an event record lacking `properties.value`.
    #[arg(long, env = "DEFAULT_EVENT_VALUE")]
    pub default_event_value: f64,

    /// Delete every mirrored output before planning, forcing a full reprocess.
    #[arg(long, env = "REPROCESS_ALL", value_parser = parse_loose_bool, default_value_t = false)]
    pub reprocess_all: bool,

    /// Root directory of gzipped input history files.
    #[arg(long = "input-root", env = "REWARDS_INPUT_ROOT")]
    pub input_root: PathBuf,

    /// Root directory mirroring `input_root` with rewarded-decision output.
    #[arg(long = "output-root", env = "REWARDS_OUTPUT_ROOT")]
    pub output_root: PathBuf,

    /// Root directory that unreadable input files are copied into.
    #[arg(long = "unrecoverable-root", env = "REWARDS_UNRECOVERABLE_ROOT")]
    pub unrecoverable_root: PathBuf,

    /// Reward-key bucket assumed when a decision or rewards record omits one.
    #[arg(long = "default-reward-key", env = "REWARDS_DEFAULT_REWARD_KEY", default_value = "rewards")]
    pub default_reward_key: String,

    /// Width of the bounded thread pool processing independent file groups.
    #[arg(long, env = "REWARDS_THREADS", default_value_t = 20)]
    pub threads: usize,

    /// Emit debug-level logs to stderr in addition to the rolling log file.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

/// Loosely parse a boolean the way the spec's environment contract does:
/// the literal string `"true"` (any case) is true, everything else --
/// including an absent variable, which falls back to `default_value_t` --
/// is false. This intentionally never errors on an unexpected value.
fn parse_loose_bool(raw: &str) -> Result<bool, String> {
    Ok(raw.eq_ignore_ascii_case("true"))
}

/// Fully resolved configuration for one run of the worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub node_id: u32,
    pub node_count: u32,
    pub reprocess_all: bool,
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub unrecoverable_root: PathBuf,
    pub threads: usize,
    pub verbose: bool,
    pub engine: EngineConfig,
}

impl TryFrom<Cli> for WorkerConfig {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self> {
        if cli.node_count == 0 {
            bail!("NODE_COUNT must be positive");
        }
        if cli.node_id >= cli.node_count {
            bail!(
                "NODE_ID ({}) must be less than NODE_COUNT ({})",
                cli.node_id,
                cli.node_count
            );
        }
        if cli.threads == 0 {
            bail!("REWARDS_THREADS must be positive");
        }

        let mut engine = EngineConfig::new(
            Duration::from_secs(cli.reward_window_secs),
            cli.default_event_value,
        );
        engine.default_reward_key = cli.default_reward_key;

        Ok(WorkerConfig {
            node_id: cli.node_id,
            node_count: cli.node_count,
            reprocess_all: cli.reprocess_all,
            input_root: cli.input_root,
            output_root: cli.output_root,
            unrecoverable_root: cli.unrecoverable_root,
            threads: cli.threads,
            verbose: cli.verbose,
            engine,
        })
    }
}

impl WorkerConfig {
    /// Parse from `std::env`/CLI, failing fast (per spec &sect;7: configuration
    /// errors are fatal at startup).
    pub fn load() -> Result<Self> {
        let cli = Cli::try_parse().context("invalid or missing configuration")?;
        WorkerConfig::try_from(cli)
    }
}
