//! Concurrent counters shared across worker threads.
//!
//! Named fields of lock-free atomics, one per spec counter, rather than a
//! stringly-keyed map: a test can supply an isolated `Stats::default()`,
//! and every counter is visible in `rustdoc` instead of hiding behind a
//! string key a caller could typo.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Stats {
    pub unique_records: AtomicU64,
    pub duplicate_records: AtomicU64,
    pub invalid_records: AtomicU64,
    pub unrecoverable_parse_errors: AtomicU64,
    pub files_processed: AtomicU64,
    pub files_skipped_up_to_date: AtomicU64,
    pub files_failed: AtomicU64,
    pub decisions_emitted: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc_unique_records(&self, by: u64) {
        self.unique_records.fetch_add(by, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_duplicate_records(&self) {
        self.duplicate_records.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_invalid_records(&self) {
        self.invalid_records.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_unrecoverable_parse_errors(&self) {
        self.unrecoverable_parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_files_processed(&self) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_files_skipped_up_to_date(&self, by: u64) {
        self.files_skipped_up_to_date.fetch_add(by, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_files_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_decisions_emitted(&self, by: u64) {
        self.decisions_emitted.fetch_add(by, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            unique_records: self.unique_records.load(Ordering::Relaxed),
            duplicate_records: self.duplicate_records.load(Ordering::Relaxed),
            invalid_records: self.invalid_records.load(Ordering::Relaxed),
            unrecoverable_parse_errors: self.unrecoverable_parse_errors.load(Ordering::Relaxed),
            files_processed: self.files_processed.load(Ordering::Relaxed),
            files_skipped_up_to_date: self.files_skipped_up_to_date.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            decisions_emitted: self.decisions_emitted.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of [`Stats`] for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub unique_records: u64,
    pub duplicate_records: u64,
    pub invalid_records: u64,
    pub unrecoverable_parse_errors: u64,
    pub files_processed: u64,
    pub files_skipped_up_to_date: u64,
    pub files_failed: u64,
    pub decisions_emitted: u64,
}

impl StatsSnapshot {
    pub fn summary(&self) -> String {
        format!(
            "files: {} processed, {} skipped (up to date), {} failed | \
             records: {} unique, {} duplicate, {} invalid, {} unrecoverable | \
             decisions emitted: {}",
            self.files_processed,
            self.files_skipped_up_to_date,
            self.files_failed,
            self.unique_records,
            self.duplicate_records,
            self.invalid_records,
            self.unrecoverable_parse_errors,
            self.decisions_emitted,
        )
    }
}
