//! End-to-end coverage of sharding, staleness, and the reward join driven
//! through the worker's public `run` entry point -- no subprocess needed.

use filetime::{set_file_mtime, FileTime};
use flate2::write::GzEncoder;
use flate2::Compression;
use rewards_ids::HashedHistoryId;
use rewards_protocol::EngineConfig;
use rewards_worker::config::WorkerConfig;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn write_gzip_jsonl(path: &Path, lines: &[String]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let file = File::create(path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    for line in lines {
        writeln!(encoder, "{line}").unwrap();
    }
    encoder.finish().unwrap();
}

fn read_gzip_jsonl(path: &Path) -> Vec<Value> {
    let file = File::open(path).unwrap();
    let decoder = flate2::read::GzDecoder::new(file);
    BufReader::new(decoder)
        .lines()
        .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
        .collect()
}

fn config(input_root: PathBuf, output_root: PathBuf, unrecoverable_root: PathBuf) -> WorkerConfig {
    WorkerConfig {
        node_id: 0,
        node_count: 1,
        reprocess_all: false,
        input_root,
        output_root,
        unrecoverable_root,
        threads: 4,
        verbose: false,
        engine: EngineConfig::new(Duration::from_secs(60), 0.0),
    }
}

#[test]
fn end_to_end_assigns_rewards_and_writes_output() {
    let dir = TempDir::new().unwrap();
    let input_root = dir.path().join("in");
    let output_root = dir.path().join("out");
    let unrecoverable_root = dir.path().join("unrecoverable");

    let hashed = HashedHistoryId::from_raw("user-1");
    let shard_dir = input_root.join(&hashed.as_str()[..2]);
    let input_file = shard_dir.join(format!("{hashed}-0000000.jsonl.gz"));

    write_gzip_jsonl(
        &input_file,
        &[
            format!(
                r#"{{"message_id":"d1","timestamp":"2020-01-01T00:00:00Z","type":"decision","history_id":"user-1","model":"songs","count":1}}"#
            ),
            format!(
                r#"{{"message_id":"r1","timestamp":"2020-01-01T00:00:30Z","type":"rewards","history_id":"user-1","rewards":{{"rewards":1.5}}}}"#
            ),
        ],
    );

    let cfg = config(input_root.clone(), output_root.clone(), unrecoverable_root);
    let flag = Arc::new(AtomicBool::new(false));
    let summary = rewards_worker::run(&cfg, flag).unwrap();

    assert_eq!(summary.decisions_emitted, 1);
    assert_eq!(summary.files_processed, 1);

    let output_file = output_root.join(&hashed.as_str()[..2]).join(format!("{hashed}-0000000.jsonl.gz"));
    let records = read_gzip_jsonl(&output_file);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["message_id"], "d1");
    assert_eq!(records[0]["reward"], 1.5);
}

#[test]
fn second_run_with_unchanged_inputs_reprocesses_nothing() {
    let dir = TempDir::new().unwrap();
    let input_root = dir.path().join("in");
    let output_root = dir.path().join("out");
    let unrecoverable_root = dir.path().join("unrecoverable");

    let hashed = HashedHistoryId::from_raw("user-2");
    let shard_dir = input_root.join(&hashed.as_str()[..2]);
    let input_file = shard_dir.join(format!("{hashed}-0000000.jsonl.gz"));
    write_gzip_jsonl(
        &input_file,
        &[format!(
            r#"{{"message_id":"d1","timestamp":"2020-01-01T00:00:00Z","type":"decision","history_id":"user-2","model":"songs","count":1}}"#
        )],
    );

    let cfg = config(input_root, output_root, unrecoverable_root);
    rewards_worker::run(&cfg, Arc::new(AtomicBool::new(false))).unwrap();

    let second = rewards_worker::run(&cfg, Arc::new(AtomicBool::new(false))).unwrap();
    assert_eq!(second.decisions_emitted, 0);
    assert_eq!(second.files_skipped_up_to_date, 1);
}

#[test]
fn file_group_with_a_decisionless_seq_file_is_stable_on_second_run() {
    // user-4's group spans two seq files: the first carries the decision,
    // the second carries only a rewards record for it. The second file
    // never yields a surviving decision, so it must still get an (empty)
    // mirrored output written -- otherwise it looks perpetually stale and
    // its whole group is reprocessed on every run.
    let dir = TempDir::new().unwrap();
    let input_root = dir.path().join("in");
    let output_root = dir.path().join("out");
    let unrecoverable_root = dir.path().join("unrecoverable");

    let hashed = HashedHistoryId::from_raw("user-4");
    let shard_dir = input_root.join(&hashed.as_str()[..2]);
    let decision_file = shard_dir.join(format!("{hashed}-0000000.jsonl.gz"));
    let rewards_file = shard_dir.join(format!("{hashed}-0000001.jsonl.gz"));

    write_gzip_jsonl(
        &decision_file,
        &[format!(
            r#"{{"message_id":"d1","timestamp":"2020-01-01T00:00:00Z","type":"decision","history_id":"user-4","model":"m","count":1}}"#
        )],
    );
    write_gzip_jsonl(
        &rewards_file,
        &[format!(
            r#"{{"message_id":"r1","timestamp":"2020-01-01T00:00:30Z","type":"rewards","history_id":"user-4","rewards":{{"rewards":1.0}}}}"#
        )],
    );

    let cfg = config(input_root, output_root.clone(), unrecoverable_root);
    let first = rewards_worker::run(&cfg, Arc::new(AtomicBool::new(false))).unwrap();
    assert_eq!(first.decisions_emitted, 1);
    assert_eq!(first.files_processed, 2, "both seq files get a mirrored output");

    let rewards_output = output_root.join(&hashed.as_str()[..2]).join(format!("{hashed}-0000001.jsonl.gz"));
    assert!(rewards_output.exists(), "decision-less seq file still gets an (empty) output");
    assert!(read_gzip_jsonl(&rewards_output).is_empty());

    let second = rewards_worker::run(&cfg, Arc::new(AtomicBool::new(false))).unwrap();
    assert_eq!(second.decisions_emitted, 0, "no-op idempotence: second run reprocesses nothing");
    assert_eq!(second.files_skipped_up_to_date, 2);
}

#[test]
fn touching_an_input_file_reprocesses_only_that_group() {
    let dir = TempDir::new().unwrap();
    let input_root = dir.path().join("in");
    let output_root = dir.path().join("out");
    let unrecoverable_root = dir.path().join("unrecoverable");

    let hashed_a = HashedHistoryId::from_raw("user-a");
    let hashed_b = HashedHistoryId::from_raw("user-b");
    let shard_a = input_root.join(&hashed_a.as_str()[..2]);
    let shard_b = input_root.join(&hashed_b.as_str()[..2]);

    let file_a = shard_a.join(format!("{hashed_a}-0000000.jsonl.gz"));
    let file_b = shard_b.join(format!("{hashed_b}-0000000.jsonl.gz"));
    write_gzip_jsonl(
        &file_a,
        &[format!(
            r#"{{"message_id":"a1","timestamp":"2020-01-01T00:00:00Z","type":"decision","history_id":"user-a","model":"m","count":1}}"#
        )],
    );
    write_gzip_jsonl(
        &file_b,
        &[format!(
            r#"{{"message_id":"b1","timestamp":"2020-01-01T00:00:00Z","type":"decision","history_id":"user-b","model":"m","count":1}}"#
        )],
    );

    let cfg = config(input_root, output_root, unrecoverable_root);
    rewards_worker::run(&cfg, Arc::new(AtomicBool::new(false))).unwrap();

    set_file_mtime(&file_a, FileTime::from_unix_time(4_102_444_800, 0)).unwrap();

    let second = rewards_worker::run(&cfg, Arc::new(AtomicBool::new(false))).unwrap();
    assert_eq!(second.decisions_emitted, 1, "only user-a's group should be reprocessed");
    assert_eq!(second.files_skipped_up_to_date, 1, "user-b's file is untouched");
}

#[test]
fn quarantines_corrupt_file_and_processes_the_rest_of_the_shard() {
    let dir = TempDir::new().unwrap();
    let input_root = dir.path().join("in");
    let output_root = dir.path().join("out");
    let unrecoverable_root = dir.path().join("unrecoverable");

    let hashed_good = HashedHistoryId::from_raw("user-good");
    let hashed_bad = HashedHistoryId::from_raw("user-bad");
    let shard = input_root.join(&hashed_good.as_str()[..2]);
    let good = shard.join(format!("{hashed_good}-0000000.jsonl.gz"));
    write_gzip_jsonl(
        &good,
        &[format!(
            r#"{{"message_id":"g1","timestamp":"2020-01-01T00:00:00Z","type":"decision","history_id":"user-good","model":"m","count":1}}"#
        )],
    );

    let bad_shard = input_root.join(&hashed_bad.as_str()[..2]);
    std::fs::create_dir_all(&bad_shard).unwrap();
    let bad = bad_shard.join(format!("{hashed_bad}-0000000.jsonl.gz"));
    std::fs::write(&bad, b"not actually gzip").unwrap();

    let cfg = config(input_root, output_root, unrecoverable_root.clone());
    let summary = rewards_worker::run(&cfg, Arc::new(AtomicBool::new(false))).unwrap();

    assert_eq!(summary.unrecoverable_parse_errors, 1);
    assert_eq!(summary.decisions_emitted, 1);
    assert!(unrecoverable_root.join(format!("{hashed_bad}-0000000.jsonl.gz")).exists());
    assert!(bad.exists(), "quarantine copies, never moves, the original");
}

#[test]
fn reprocess_all_clears_existing_outputs_before_planning() {
    let dir = TempDir::new().unwrap();
    let input_root = dir.path().join("in");
    let output_root = dir.path().join("out");
    let unrecoverable_root = dir.path().join("unrecoverable");

    let hashed = HashedHistoryId::from_raw("user-3");
    let shard_dir = input_root.join(&hashed.as_str()[..2]);
    let input_file = shard_dir.join(format!("{hashed}-0000000.jsonl.gz"));
    write_gzip_jsonl(
        &input_file,
        &[format!(
            r#"{{"message_id":"d1","timestamp":"2020-01-01T00:00:00Z","type":"decision","history_id":"user-3","model":"m","count":1}}"#
        )],
    );

    let mut cfg = config(input_root, output_root, unrecoverable_root);
    rewards_worker::run(&cfg, Arc::new(AtomicBool::new(false))).unwrap();

    cfg.reprocess_all = true;
    let second = rewards_worker::run(&cfg, Arc::new(AtomicBool::new(false))).unwrap();
    assert_eq!(second.decisions_emitted, 1, "reprocess_all forces a full rebuild");
}
