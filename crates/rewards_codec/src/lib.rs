//! Record codec: gzipped JSON-lines read/write plus timestamp parsing.

pub mod reader;
pub mod timestamp;
pub mod writer;

pub use reader::{read_gzip_jsonl, CodecError};
pub use timestamp::{format_timestamp, parse_timestamp, TimestampError};
pub use writer::{write_gzip_jsonl, WriteError};
