//! Loads and validates a group of files belonging to one identity.

use crate::validate::{validate_record, GroupIdentity, ValidationError};
use rewards_codec::reader::{read_gzip_jsonl, CodecError};
use rewards_ids::HashedHistoryId;
use rewards_protocol::record::MESSAGE_ID_KEY;
use rewards_protocol::{Stats, ValidatedRecord};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A group of input files sharing one `hashed_history_id`.
#[derive(Debug, Clone)]
pub struct FileGroup {
    pub hashed_history_id: HashedHistoryId,
    pub files: Vec<PathBuf>,
}

/// Group input files named `<hashed_history_id>-<seq>.jsonl.gz` by their
/// shared identity prefix. A file whose name doesn't carry a parseable
/// hashed history id is logged and skipped -- it cannot be assigned to any
/// group without one.
pub fn group_files_by_identity(files: Vec<PathBuf>) -> Vec<FileGroup> {
    let mut order: Vec<HashedHistoryId> = Vec::new();
    let mut groups: HashMap<HashedHistoryId, Vec<PathBuf>> = HashMap::new();

    for file in files {
        match identity_from_file_name(&file) {
            Some(id) => {
                groups.entry(id.clone()).or_insert_with(|| {
                    order.push(id.clone());
                    Vec::new()
                });
                groups.get_mut(&id).expect("just inserted").push(file);
            }
            None => {
                warn!(file = %file.display(), "file name does not carry a parseable hashed history id, skipping");
            }
        }
    }

    order
        .into_iter()
        .map(|id| {
            let files = groups.remove(&id).expect("order mirrors groups");
            FileGroup {
                hashed_history_id: id,
                files,
            }
        })
        .collect()
}

/// Parse the `<hashed_history_id>` prefix out of a file named
/// `<hashed_history_id>-<seq>.jsonl.gz`.
fn identity_from_file_name(file: &Path) -> Option<HashedHistoryId> {
    let name = file.file_name()?.to_str()?;
    let stem = name.strip_suffix(".jsonl.gz")?;
    let prefix = stem.split('-').next()?;
    HashedHistoryId::parse(prefix).ok()
}

/// Copy an unreadable file to the quarantine directory, preserving the
/// original (the file is never moved, so upstream can retry it in place).
pub fn copy_to_unrecoverable(file: &Path, unrecoverable_root: &Path) -> std::io::Result<()> {
    let file_name = file
        .file_name()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "file has no name"))?;
    let dest = unrecoverable_root.join(file_name);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(file, dest)?;
    Ok(())
}

/// Load every file in `group`, deduplicate by `message_id`, validate the
/// union, and return the survivors sorted by timestamp (ties keep the
/// order records were first seen in).
pub fn load_history(
    group: &FileGroup,
    unrecoverable_root: &Path,
    default_reward_key: &str,
    stats: &Stats,
) -> Vec<ValidatedRecord> {
    let mut seen_message_ids: HashSet<String> = HashSet::new();
    let mut identity = GroupIdentity::new(group.hashed_history_id.clone());
    let mut validated: Vec<ValidatedRecord> = Vec::new();

    for file in &group.files {
        let raw_records = match read_gzip_jsonl(file) {
            Ok(records) => records,
            Err(CodecError::Envelope { path, source }) => {
                warn!(file = %path, error = %source, "unrecoverable parse error, quarantining file");
                stats.inc_unrecoverable_parse_errors();
                if let Err(copy_err) = copy_to_unrecoverable(file, unrecoverable_root) {
                    warn!(file = %path, error = %copy_err, "failed to copy file to quarantine");
                }
                continue;
            }
            Err(CodecError::Open { path, source }) => {
                warn!(file = %path, error = %source, "could not open input file, skipping");
                continue;
            }
        };

        for raw in raw_records {
            if is_duplicate(&raw, &mut seen_message_ids) {
                stats.inc_duplicate_records();
                continue;
            }

            match validate_record(&raw, &mut identity, default_reward_key, file) {
                Ok(record) => {
                    stats.inc_unique_records(1);
                    validated.push(record);
                }
                Err(err) => {
                    debug!(error = %err, "dropping invalid record");
                    stats.inc_invalid_records();
                }
            }
        }
    }

    validated.sort_by_key(|r| r.timestamp());
    validated
}

/// Returns true and records the id if `raw`'s `message_id` has already been
/// seen in this group. A record lacking a usable `message_id` is never
/// treated as a duplicate -- it will fail validation on its own.
fn is_duplicate(raw: &Value, seen: &mut HashSet<String>) -> bool {
    let Some(message_id) = raw.get(MESSAGE_ID_KEY).and_then(Value::as_str) else {
        return false;
    };
    if seen.contains(message_id) {
        true
    } else {
        seen.insert(message_id.to_string());
        false
    }
}
