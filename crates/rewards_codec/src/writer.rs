//! Gzipped newline-delimited JSON writer.

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to create parent directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Write `records` as gzipped newline-delimited JSON to `path`, creating the
/// parent directory if absent. If `path` already exists it is overwritten in
/// place: callers are expected to tolerate crash-mid-write by re-running,
/// since outputs are regenerable from inputs.
pub fn write_gzip_jsonl<'a, I>(path: &Path, records: I) -> Result<(), WriteError>
where
    I: IntoIterator<Item = &'a Value>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| WriteError::CreateDir {
            path: parent.display().to_string(),
            source,
        })?;
    }

    let file = File::create(path).map_err(|source| WriteError::Write {
        path: path.display().to_string(),
        source,
    })?;
    let mut encoder = GzEncoder::new(file, Compression::default());

    for record in records {
        serde_json::to_writer(&mut encoder, record).map_err(|err| WriteError::Write {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, err),
        })?;
        encoder.write_all(b"\n").map_err(|source| WriteError::Write {
            path: path.display().to_string(),
            source,
        })?;
    }

    encoder.finish().map_err(|source| WriteError::Write {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}
