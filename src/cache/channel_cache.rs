//! Per-channel cache: a bounded, sequence-ordered buffer of recent entries
//! plus a tagged queue of late arrivals.
//!
//! The buffer claims completeness only from `valid_from` onward; reader
//! requests starting below that are backfilled from the backing store and
//! merged with the cached tail.

use crate::cache::entry::{flags, ChannelRemoval, LogEntry};
use crate::cache::error::CacheError;
use crate::cache::options::ChannelCacheOptions;
use crate::cache::sequence_id::SequenceId;
use crate::clock::{Clock, Timestamp};
use crate::store::BackingStore;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Reader request parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangesOptions {
    /// Resume position; only entries after its safe sequence are returned
    pub since: SequenceId,
    /// Max entries to return, 0 for unlimited
    pub limit: usize,
}

impl ChangesOptions {
    pub fn since(since: u64) -> Self {
        ChangesOptions {
            since: SequenceId::new(since),
            limit: 0,
        }
    }
}

/// A late arrival queued for in-flight readers, with the monotonic tag
/// readers use to resume.
#[derive(Debug, Clone)]
pub struct LateLogEntry {
    pub tag: u64,
    pub entry: Arc<LogEntry>,
}

#[derive(Default)]
struct ChannelCacheInner {
    /// Sequence from which the buffer is a complete record
    valid_from: u64,
    /// Recent entries, ascending by sequence
    logs: Vec<Arc<LogEntry>>,
    /// Late arrivals in arrival order
    late_logs: VecDeque<LateLogEntry>,
    /// Tag handed to the most recent late arrival
    last_late_tag: u64,
}

/// Cache of one channel's recent change history.
pub struct ChannelCache {
    channel_name: String,
    store: Arc<dyn BackingStore>,
    clock: Arc<dyn Clock>,
    options: ChannelCacheOptions,
    inner: RwLock<ChannelCacheInner>,
}

impl ChannelCache {
    pub fn new(
        channel_name: impl Into<String>,
        valid_from: u64,
        store: Arc<dyn BackingStore>,
        clock: Arc<dyn Clock>,
        options: ChannelCacheOptions,
    ) -> Self {
        ChannelCache {
            channel_name: channel_name.into(),
            store,
            clock,
            options,
            inner: RwLock::new(ChannelCacheInner {
                valid_from,
                ..Default::default()
            }),
        }
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Sequence from which this cache is a complete record; requests for
    /// earlier positions must be (partially) served by the backing store.
    pub fn valid_from(&self) -> u64 {
        self.inner.read().valid_from
    }

    /// Insert an entry in sequence order. A removal is cached as a flagged
    /// copy carrying the revision the document had when it left.
    pub fn add_to_cache(&self, entry: &Arc<LogEntry>, removal: Option<&ChannelRemoval>) {
        let entry = match removal {
            None => Arc::clone(entry),
            Some(removal) => Arc::new(Self::removal_entry(entry, removal)),
        };
        let mut inner = self.inner.write();
        Self::insert_entry(&mut inner.logs, entry);
        self.prune_length(&mut inner);
    }

    /// Insert a late arrival into the buffer and the late queue in one
    /// step, so a reader consulting the queue after the buffer never
    /// misses it.
    pub fn add_late_to_cache(&self, entry: &Arc<LogEntry>, removal: Option<&ChannelRemoval>) {
        let cached = match removal {
            None => Arc::clone(entry),
            Some(removal) => Arc::new(Self::removal_entry(entry, removal)),
        };
        let mut inner = self.inner.write();
        inner.last_late_tag += 1;
        let tagged = LateLogEntry {
            tag: inner.last_late_tag,
            entry: Arc::clone(&cached),
        };
        inner.late_logs.push_back(tagged);
        Self::insert_entry(&mut inner.logs, cached);
        self.prune_length(&mut inner);
        debug!(
            channel = %self.channel_name,
            sequence = entry.sequence,
            "queued late sequence"
        );
    }

    fn removal_entry(entry: &Arc<LogEntry>, removal: &ChannelRemoval) -> LogEntry {
        let mut cached = LogEntry::clone(entry);
        cached.flags |= flags::REMOVED;
        if !removal.rev.is_empty() {
            cached.rev_id = removal.rev.clone();
        }
        cached
    }

    /// In-order insert, searching from the tail. In-order arrivals append;
    /// late arrivals pay the binary search. A duplicate sequence replaces
    /// the cached entry.
    fn insert_entry(logs: &mut Vec<Arc<LogEntry>>, entry: Arc<LogEntry>) {
        match logs.last() {
            None => logs.push(entry),
            Some(last) if last.sequence < entry.sequence => logs.push(entry),
            _ => {
                let idx = logs.partition_point(|e| e.sequence < entry.sequence);
                if logs.get(idx).map(|e| e.sequence) == Some(entry.sequence) {
                    logs[idx] = entry;
                } else {
                    logs.insert(idx, entry);
                }
            }
        }
    }

    /// Late entries tagged after `since_tag`, plus the tag to resume from.
    pub fn late_sequences_since(&self, since_tag: u64) -> (Vec<Arc<LogEntry>>, u64) {
        let inner = self.inner.read();
        let entries = inner
            .late_logs
            .iter()
            .filter(|late| late.tag > since_tag)
            .map(|late| Arc::clone(&late.entry))
            .collect();
        (entries, inner.last_late_tag)
    }

    /// Pure in-memory answer: the validity bound and the cached entries
    /// after the request's safe sequence.
    pub fn cached_changes(&self, options: &ChangesOptions) -> (u64, Vec<Arc<LogEntry>>) {
        let since = options.since.safe_sequence();
        let inner = self.inner.read();
        let start = inner.logs.partition_point(|e| e.sequence <= since);
        let mut entries: Vec<Arc<LogEntry>> = inner.logs[start..].to_vec();
        if options.limit > 0 && entries.len() > options.limit {
            entries.truncate(options.limit);
        }
        (inner.valid_from, entries)
    }

    /// Entries after the request position up to the current head, merged
    /// with backing-store results when the request precedes `valid_from`.
    pub async fn get_changes(
        &self,
        options: &ChangesOptions,
    ) -> Result<Vec<Arc<LogEntry>>, CacheError> {
        let (valid_from, cached) = self.cached_changes(options);
        let since = options.since.safe_sequence();
        if since + 1 >= valid_from {
            return Ok(cached);
        }

        // the cache can't vouch for (since, valid_from); fill from the store
        debug!(
            channel = %self.channel_name,
            since,
            valid_from,
            "backfilling changes below cache validity"
        );
        let backfill = self
            .store
            .changes_in_channel(&self.channel_name, since + 1, valid_from - 1)
            .await?;

        let mut merged: Vec<Arc<LogEntry>> = Vec::with_capacity(backfill.len() + cached.len());
        let mut cached_iter = cached.into_iter().peekable();
        for entry in backfill {
            while let Some(next) = cached_iter.peek() {
                if next.sequence < entry.sequence {
                    let next = cached_iter.next().expect("peeked entry");
                    merged.push(next);
                } else {
                    break;
                }
            }
            // a late arrival below valid_from may already be cached
            if cached_iter.peek().map(|e| e.sequence) == Some(entry.sequence) {
                continue;
            }
            merged.push(Arc::new(entry));
        }
        merged.extend(cached_iter);

        if options.limit > 0 && merged.len() > options.limit {
            merged.truncate(options.limit);
        }
        Ok(merged)
    }

    /// Evict entries for the given doc ids received at or after
    /// `start_time`; returns the count removed.
    pub fn remove(&self, doc_ids: &ahash::AHashSet<String>, start_time: Timestamp) -> usize {
        let mut inner = self.inner.write();
        let before = inner.logs.len();
        inner
            .logs
            .retain(|e| !(doc_ids.contains(&e.doc_id) && e.time_received >= start_time));
        before - inner.logs.len()
    }

    /// Drop entries beyond the configured length or age, advancing
    /// `valid_from` past everything dropped. Returns the count pruned.
    pub fn prune_cache(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.write();
        let mut pruned = self.prune_length(&mut inner);

        while inner.logs.len() > self.options.min_length {
            let (first_sequence, first_received) = {
                let first = &inner.logs[0];
                (first.sequence, first.time_received)
            };
            if first_received.age(now) <= self.options.max_age {
                break;
            }
            inner.valid_from = inner.valid_from.max(first_sequence + 1);
            inner.logs.remove(0);
            pruned += 1;
        }

        while let Some(front) = inner.late_logs.front() {
            if front.entry.time_received.age(now) <= self.options.max_age {
                break;
            }
            inner.late_logs.pop_front();
        }
        pruned
    }

    fn prune_length(&self, inner: &mut ChannelCacheInner) -> usize {
        if inner.logs.len() <= self.options.max_length {
            return 0;
        }
        let excess = inner.logs.len() - self.options.max_length;
        let boundary = inner.logs[excess - 1].sequence + 1;
        inner.valid_from = inner.valid_from.max(boundary);
        inner.logs.drain(..excess);
        excess
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.read().logs.len()
    }
}
