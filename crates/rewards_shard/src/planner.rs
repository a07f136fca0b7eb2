//! Deterministic directory sharding, per-file staleness checks, and
//! stale-output pruning.

use crate::murmur::murmur3_x86_32;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ShardError {
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn read_dir_err(path: &Path, source: std::io::Error) -> ShardError {
    ShardError::ReadDir {
        path: path.display().to_string(),
        source,
    }
}

/// Whether `node_id` owns the directory named `dir_name`, under
/// `MurmurHash3_x86_32(dir_name[:2], seed=0) mod node_count == node_id`.
pub fn owns_dir(dir_name: &str, node_id: u32, node_count: u32) -> bool {
    debug_assert!(node_count > 0, "node_count must be positive");
    let prefix: String = dir_name.chars().take(2).collect();
    let hash = murmur3_x86_32(prefix.as_bytes(), 0);
    hash % node_count == node_id
}

/// Enumerate the immediate subdirectories of `input_root` owned by this node.
pub fn owned_dirs(input_root: &Path, node_id: u32, node_count: u32) -> Result<Vec<PathBuf>, ShardError> {
    let mut dirs = Vec::new();
    let entries = fs::read_dir(input_root).map_err(|e| read_dir_err(input_root, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| read_dir_err(input_root, e))?;
        let file_type = entry.file_type().map_err(|e| read_dir_err(input_root, e))?;
        if !file_type.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if owns_dir(&name, node_id, node_count) {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Strip the `.jsonl` or `.jsonl.gz` suffix from a file name for stem comparison.
pub fn strip_known_suffix(file_name: &str) -> &str {
    file_name
        .strip_suffix(".jsonl.gz")
        .or_else(|| file_name.strip_suffix(".jsonl"))
        .unwrap_or(file_name)
}

fn mtime(path: &Path) -> std::io::Result<std::time::SystemTime> {
    fs::metadata(path)?.modified()
}

/// Identify the `*.jsonl.gz` files in `input_dir` needing (re)processing:
/// every file if the mirrored output directory doesn't exist yet, otherwise
/// only files missing an output or newer than their existing output.
pub fn stale_files_in_dir(input_dir: &Path, output_dir: &Path) -> Result<Vec<PathBuf>, ShardError> {
    let jsonl_files = |dir: &Path| -> Result<Vec<PathBuf>, ShardError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| read_dir_err(dir, e))? {
            let entry = entry.map_err(|e| read_dir_err(dir, e))?;
            let path = entry.path();
            if path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.ends_with(".jsonl.gz")) {
                out.push(path);
            }
        }
        Ok(out)
    };

    if !output_dir.exists() {
        return jsonl_files(input_dir);
    }

    let mut outputs: std::collections::HashMap<String, PathBuf> = std::collections::HashMap::new();
    for entry in fs::read_dir(output_dir).map_err(|e| read_dir_err(output_dir, e))? {
        let entry = entry.map_err(|e| read_dir_err(output_dir, e))?;
        let path = entry.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.ends_with(".jsonl.gz") {
                outputs.insert(strip_known_suffix(name).to_string(), path);
            }
        }
    }

    let mut stale = Vec::new();
    for input in jsonl_files(input_dir)? {
        let name = input.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let stem = strip_known_suffix(name);
        match outputs.get(stem) {
            None => stale.push(input),
            Some(output) => {
                let in_mtime = mtime(&input).map_err(|e| read_dir_err(&input, e))?;
                let out_mtime = mtime(output).map_err(|e| read_dir_err(output, e))?;
                if in_mtime > out_mtime {
                    stale.push(input);
                }
            }
        }
    }
    Ok(stale)
}

/// Enumerate every `*.jsonl.gz` file in `input_dir`, stale or not -- used to
/// assemble a file group's complete membership once any of its files is
/// known to be stale.
pub fn all_input_files(input_dir: &Path) -> Result<Vec<PathBuf>, ShardError> {
    let mut out = Vec::new();
    for entry in fs::read_dir(input_dir).map_err(|e| read_dir_err(input_dir, e))? {
        let entry = entry.map_err(|e| read_dir_err(input_dir, e))?;
        let path = entry.path();
        if path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.ends_with(".jsonl.gz")) {
            out.push(path);
        }
    }
    Ok(out)
}

/// Prune stale outputs before planning: in `reprocess_all` mode remove every
/// mirrored output directory tree; otherwise remove output directories whose
/// input directory is gone, and individual output files whose input file is
/// gone. Mirrors every mirrored output directory, not only this node's
/// shard, matching the original implementation's full-tree sweep.
pub fn prune_stale_outputs(
    input_root: &Path,
    output_root: &Path,
    reprocess_all: bool,
) -> Result<(), ShardError> {
    fs::create_dir_all(output_root).map_err(|e| read_dir_err(output_root, e))?;

    for entry in fs::read_dir(output_root).map_err(|e| read_dir_err(output_root, e))? {
        let entry = entry.map_err(|e| read_dir_err(output_root, e))?;
        if !entry.file_type().map_err(|e| read_dir_err(output_root, e))?.is_dir() {
            continue;
        }
        let output_dir = entry.path();

        if reprocess_all {
            info!(dir = %output_dir.display(), "reprocess_all: removing output directory");
            if let Err(err) = fs::remove_dir_all(&output_dir) {
                warn!(dir = %output_dir.display(), error = %err, "failed to remove output directory");
            }
            continue;
        }

        let input_dir = input_root.join(entry.file_name());
        if !input_dir.exists() {
            info!(dir = %output_dir.display(), "input directory gone: removing output directory");
            if let Err(err) = fs::remove_dir_all(&output_dir) {
                warn!(dir = %output_dir.display(), error = %err, "failed to remove output directory");
            }
            continue;
        }

        let input_stems: HashSet<String> = fs::read_dir(&input_dir)
            .map_err(|e| read_dir_err(&input_dir, e))?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                name.ends_with(".jsonl.gz").then(|| strip_known_suffix(&name).to_string())
            })
            .collect();

        for out_entry in fs::read_dir(&output_dir).map_err(|e| read_dir_err(&output_dir, e))? {
            let out_entry = out_entry.map_err(|e| read_dir_err(&output_dir, e))?;
            let path = out_entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(".jsonl.gz") {
                continue;
            }
            let stem = strip_known_suffix(name);
            if !input_stems.contains(stem) {
                debug!(file = %path.display(), "removing stale output file");
                if let Err(err) = fs::remove_file(&path) {
                    warn!(file = %path.display(), error = %err, "failed to remove stale output file");
                }
            }
        }
    }
    Ok(())
}
