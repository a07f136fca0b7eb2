//! Processes one file-group unit end to end: load, assign rewards, write.

use crate::plan::Unit;
use rewards_codec::write_gzip_jsonl;
use rewards_core::load_history;
use rewards_core::assign_rewards;
use rewards_protocol::{EngineConfig, Stats};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// Load, join, and write one unit's outputs. Per spec &sect;7, an output
/// write failure fails only this unit -- it is logged and counted, and the
/// input is left in place for the next run to retry.
pub fn process_unit(
    unit: &Unit,
    unrecoverable_root: &Path,
    engine_config: &EngineConfig,
    stats: &Stats,
) {
    let validated = load_history(
        &unit.group,
        unrecoverable_root,
        &engine_config.default_reward_key,
        stats,
    );
    let rewarded = assign_rewards(validated, engine_config);
    stats.inc_decisions_emitted(rewarded.len() as u64);

    let mut by_source: HashMap<PathBuf, Vec<serde_json::Value>> = HashMap::new();
    for decision in rewarded {
        by_source
            .entry(decision.source_file.clone())
            .or_default()
            .push(decision.into_value());
    }

    let empty: Vec<serde_json::Value> = Vec::new();
    for source_file in &unit.group.files {
        // A file with no surviving decisions (all its records were
        // rewards/events, or its decisions were invalid) still gets a
        // mirrored output written -- an empty one -- so the staleness check
        // sees it as up to date on the next run instead of reprocessing its
        // whole group forever.
        let values = by_source.get(source_file).unwrap_or(&empty);
        let Some(name) = source_file.file_name() else {
            warn!(file = %source_file.display(), "source file has no file name, skipping write");
            stats.inc_files_failed();
            continue;
        };
        let output_path = unit.output_dir.join(name);

        match write_gzip_jsonl(&output_path, values.iter()) {
            Ok(()) => stats.inc_files_processed(),
            Err(err) => {
                error!(file = %output_path.display(), error = %err, "failed to write rewarded output, will retry next run");
                stats.inc_files_failed();
            }
        }
    }
}
