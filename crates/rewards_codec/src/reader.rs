//! Gzipped newline-delimited JSON reader.

use flate2::read::GzDecoder;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt gzip envelope in {path}: {source}")]
    Envelope {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Read every well-formed JSON object line out of a gzipped JSON-lines file.
///
/// A malformed individual line is skipped (the file remains usable); a
/// corrupt gzip envelope rejects the whole file with [`CodecError::Envelope`].
pub fn read_gzip_jsonl(path: &Path) -> Result<Vec<Value>, CodecError> {
    let file = File::open(path).map_err(|source| CodecError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let decoder = GzDecoder::new(file);
    let reader = BufReader::new(decoder);

    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|source| CodecError::Envelope {
            path: path.display().to_string(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(&line) {
            Ok(value) => records.push(value),
            Err(err) => {
                debug!(file = %path.display(), error = %err, "skipping unparseable line");
            }
        }
    }
    Ok(records)
}
