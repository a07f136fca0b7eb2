//! Turns the shard planner's directory-level primitives into the list of
//! file-group units this node needs to (re)process.

use rewards_core::{group_files_by_identity, FileGroup};
use rewards_protocol::Stats;
use rewards_shard::{all_input_files, owned_dirs, stale_files_in_dir};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One independent unit of work: every file sharing a `hashed_history_id`
/// under one shard directory, plus the output directory its members mirror
/// into.
pub struct Unit {
    pub group: FileGroup,
    pub output_dir: PathBuf,
}

/// Enumerate every unit this node owns that needs reprocessing. A file
/// group is included whenever at least one of its member files is stale;
/// once included, every member is reprocessed (and rewritten), since a
/// later file in the group can shift an earlier file's decision rewards.
/// Files in wholly up-to-date groups are counted in `stats` and skipped.
pub fn plan_units(
    input_root: &Path,
    output_root: &Path,
    node_id: u32,
    node_count: u32,
    stats: &Stats,
) -> anyhow::Result<Vec<Unit>> {
    let mut units = Vec::new();

    for input_dir in owned_dirs(input_root, node_id, node_count)? {
        let Some(dir_name) = input_dir.file_name() else {
            continue;
        };
        let output_dir = output_root.join(dir_name);

        let stale: HashSet<PathBuf> = stale_files_in_dir(&input_dir, &output_dir)?.into_iter().collect();
        if stale.is_empty() {
            let all = all_input_files(&input_dir)?;
            stats.inc_files_skipped_up_to_date(all.len() as u64);
            continue;
        }

        let all_files = all_input_files(&input_dir)?;
        for group in group_files_by_identity(all_files) {
            if group.files.iter().any(|f| stale.contains(f)) {
                units.push(Unit {
                    group,
                    output_dir: output_dir.clone(),
                });
            } else {
                stats.inc_files_skipped_up_to_date(group.files.len() as u64);
            }
        }
    }

    Ok(units)
}
