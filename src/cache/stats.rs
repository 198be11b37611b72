//! Counters published by the cache.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache-wide counters. All methods are lock-free; readers may observe a
/// snapshot mid-update.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Entries accepted into the state machine
    received: AtomicU64,
    /// Duplicate sequences dropped
    duplicates: AtomicU64,
    /// Entries buffered as pending at least once
    deferred: AtomicU64,
    /// High-water mark of the pending buffer
    max_pending: AtomicU64,
    /// Sequences promoted from pending to skipped
    out_of_order: AtomicU64,
    /// Previously skipped sequences that later arrived
    late_arrivals: AtomicU64,
    /// Skipped sequences given up on
    abandoned_seqs: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        CacheStats::default()
    }

    pub fn incr_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_duplicates(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_deferred(&self) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
    }

    /// Raise the pending high-water mark if `pending` exceeds it
    pub fn set_max_pending(&self, pending: u64) {
        self.max_pending.fetch_max(pending, Ordering::Relaxed);
    }

    pub fn incr_out_of_order(&self) {
        self.out_of_order.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_late_arrivals(&self) {
        self.late_arrivals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_abandoned_seqs(&self, count: u64) {
        self.abandoned_seqs.fetch_add(count, Ordering::Relaxed);
    }

    pub fn abandoned_seqs(&self) -> u64 {
        self.abandoned_seqs.load(Ordering::Relaxed)
    }

    pub fn max_pending(&self) -> u64 {
        self.max_pending.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            max_pending: self.max_pending.load(Ordering::Relaxed),
            out_of_order: self.out_of_order.load(Ordering::Relaxed),
            late_arrivals: self.late_arrivals.load(Ordering::Relaxed),
            abandoned_seqs: self.abandoned_seqs.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters, for logging or export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    pub received: u64,
    pub duplicates: u64,
    pub deferred: u64,
    pub max_pending: u64,
    pub out_of_order: u64,
    pub late_arrivals: u64,
    pub abandoned_seqs: u64,
}
