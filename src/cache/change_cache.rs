//! The change cache coordinator.
//!
//! Responsibilities:
//! - receive feed events, concurrently, one producer per store partition
//! - buffer out-of-order sequences until the stream is gap-free
//! - fan entries out to the per-channel caches
//! - notify listeners of channels with new content
//!
//! Only `process_entry` takes the coordinator lock; event classification
//! and metadata parsing run lock-free so producers interleave freely.

use crate::cache::channel_cache::{ChangesOptions, ChannelCache};
use crate::cache::entry::LogEntry;
use crate::cache::error::CacheError;
use crate::cache::listener::{ChannelSet, ListenerBus, NotifyFn};
use crate::cache::options::CacheOptions;
use crate::cache::pending::PendingLogs;
use crate::cache::skipped::SkippedSequenceList;
use crate::cache::stats::CacheStats;
use crate::clock::{Clock, Timestamp};
use crate::feed::event::{
    self, datatype, FeedEvent, FeedOpcode, ROLE_DOC_PREFIX, UNUSED_SEQ_PREFIX,
    UNUSED_SEQ_RANGE_PREFIX, USER_DOC_PREFIX,
};
use crate::feed::sync_meta::{parse_sync_data, SyncMetaError};
use crate::store::{BackingStore, StoreError};
use ahash::{AHashMap, AHashSet};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Wildcard channel receiving every document entry.
pub const STAR_CHANNEL: &str = "*";

/// Principal documents carry only the fields the cache needs.
#[derive(Deserialize)]
struct PrincipalMeta {
    #[serde(default)]
    sequence: u64,
}

/// State guarded by the coordinator lock.
struct CacheInner {
    /// Next contiguous sequence expected from the feed
    next_sequence: u64,
    /// Store sequence at startup; older arrivals are ignored
    initial_sequence: u64,
    /// Sequences already processed, for duplicate drops. Grows for the
    /// process lifetime.
    received_seqs: AHashSet<u64>,
    /// Out-of-order entries waiting for their gap to fill
    pending_logs: PendingLogs,
    channel_caches: AHashMap<String, Arc<ChannelCache>>,
    stopped: bool,
    /// When set, incoming feed changes are ignored
    logs_disabled: bool,
}

/// Manages the cache of recent change history across all channels.
pub struct ChangeCache {
    store: Arc<dyn BackingStore>,
    clock: Arc<dyn Clock>,
    options: CacheOptions,
    listeners: ListenerBus,
    stats: Arc<CacheStats>,
    inner: RwLock<CacheInner>,
    skipped_seqs: RwLock<SkippedSequenceList>,
    /// Serializes multi-channel insertion of late arrivals so readers get
    /// a consistent cross-channel view of each one
    late_seq_lock: Mutex<()>,
    /// Feed events are held until `start` opens the gate
    started: watch::Sender<bool>,
    /// Close signal for the housekeeping tasks
    terminator: watch::Sender<bool>,
    housekeeping: Mutex<Vec<JoinHandle<()>>>,
}

impl ChangeCache {
    /// Construct around the store's last assigned sequence. Feed events are
    /// accepted but not processed until [`start`](Self::start) is called.
    pub fn new(
        last_assigned_seq: u64,
        options: CacheOptions,
        store: Arc<dyn BackingStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!(
            last_assigned_seq,
            pending_max = options.pending_seq_max_num,
            "initializing change cache"
        );
        let (started, _) = watch::channel(false);
        let (terminator, _) = watch::channel(false);
        ChangeCache {
            store,
            clock,
            options,
            listeners: ListenerBus::new(),
            stats: Arc::new(CacheStats::new()),
            inner: RwLock::new(CacheInner {
                next_sequence: last_assigned_seq + 1,
                initial_sequence: last_assigned_seq,
                received_seqs: AHashSet::default(),
                pending_logs: PendingLogs::new(),
                channel_caches: AHashMap::default(),
                stopped: false,
                logs_disabled: false,
            }),
            skipped_seqs: RwLock::new(SkippedSequenceList::new()),
            late_seq_lock: Mutex::new(()),
            started,
            terminator,
            housekeeping: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe a listener to changed-channel notifications.
    pub fn subscribe(&self, listener: NotifyFn) {
        self.listeners.subscribe(listener);
    }

    /// Begin processing feed events and start the housekeeping tasks.
    pub fn start(self: &Arc<Self>) {
        let handles = crate::cache::housekeeping::spawn(self);
        self.housekeeping.lock().extend(handles);
        self.started.send_replace(true);
    }

    /// Stop the cache: disable ingestion and join the housekeeping tasks.
    pub async fn stop(&self) {
        {
            let mut inner = self.inner.write();
            inner.stopped = true;
            inner.logs_disabled = true;
        }
        self.terminator.send_replace(true);
        // unblock any events still waiting on the start gate; they will be
        // dropped by the disabled state machine
        self.started.send_replace(true);
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.housekeeping.lock());
        for handle in handles {
            let _ = handle.await;
        }
        info!("change cache stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.read().stopped
    }

    /// Empty all channel caches and re-anchor their validity at the store's
    /// current sequence. Sequence-buffering state is left untouched.
    pub async fn clear(&self) -> Result<(), CacheError> {
        let last_sequence = self.store.last_assigned_sequence().await?;
        let mut inner = self.inner.write();
        inner.initial_sequence = last_sequence;
        inner.channel_caches.clear();
        inner.pending_logs.clear();
        Ok(())
    }

    /// If disabled, incoming feed changes become no-ops.
    pub fn enable_channel_indexing(&self, enable: bool) {
        self.inner.write().logs_disabled = !enable;
    }

    /// Sequence the cache is up to date with.
    pub fn last_sequence(&self) -> u64 {
        self.inner.read().next_sequence - 1
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn next_sequence(&self) -> u64 {
        self.inner.read().next_sequence
    }

    fn initial_sequence(&self) -> u64 {
        self.inner.read().initial_sequence
    }

    pub(crate) fn terminator(&self) -> watch::Receiver<bool> {
        self.terminator.subscribe()
    }

    pub(crate) fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Number of entries buffered out of order.
    pub fn pending_count(&self) -> usize {
        self.inner.read().pending_logs.len()
    }

    //// ADDING CHANGES

    /// Feed entry point. A synchronous event is processed on the caller's
    /// task; otherwise processing is dispatched. Events may arrive
    /// concurrently from multiple partitions.
    pub async fn doc_changed(self: &Arc<Self>, event: FeedEvent) {
        if event.synchronous {
            self.process_feed_event(event).await;
        } else {
            let cache = Arc::clone(self);
            tokio::spawn(async move {
                cache.process_feed_event(event).await;
            });
        }
    }

    async fn process_feed_event(&self, event: FeedEvent) {
        // hold events until the cache is started
        let mut started = self.started.subscribe();
        if started.wait_for(|open| *open).await.is_err() {
            return;
        }

        let key = event.key.as_str();
        if key.starts_with(USER_DOC_PREFIX) || key.starts_with(ROLE_DOC_PREFIX) {
            self.process_principal_doc(&event);
            return;
        }
        if key.starts_with(UNUSED_SEQ_RANGE_PREFIX) {
            self.process_unused_sequence_range(key);
            return;
        }
        if key.starts_with(UNUSED_SEQ_PREFIX) {
            self.process_unused_sequence(key);
            return;
        }

        // a deletion with no payload never had gateway metadata
        if event.opcode == FeedOpcode::Deletion && event.value.is_empty() && event.xattr.is_empty()
        {
            debug!(doc = %key, "ignoring delete mutation with no metadata");
            return;
        }

        // binary documents can't carry inline metadata
        if self.options.use_xattrs && event.data_type == datatype::RAW && event.xattr.is_empty() {
            return;
        }

        let sync_data = match parse_sync_data(&event) {
            Ok(sync) => Some(sync),
            Err(SyncMetaError::Missing) => None,
            Err(err @ SyncMetaError::Malformed(_)) => {
                if event.data_type != datatype::RAW {
                    debug!(doc = %key, %err, "unable to unmarshal sync metadata; not cached");
                }
                return;
            }
        };

        // in rich-metadata mode a mutation the gateway didn't write is not
        // cacheable; hand it to the import path instead
        if self.options.use_xattrs {
            let is_sg_write = matches!(&sync_data, Some(sync) if sync.is_sg_write(event.cas));
            if !is_sg_write {
                if self.options.auto_import {
                    self.import_from_feed(&event).await;
                }
                return;
            }
        }

        let sync_data = match sync_data {
            Some(sync) if sync.has_valid_sync_data() => sync,
            _ => match self.store.check_for_upgrade(key).await {
                Ok(Some(doc)) if doc.sync.cas == Some(event.cas) => {
                    info!(doc = %key, "found metadata in migrated location; assuming upgrade in progress");
                    doc.sync
                }
                _ => {
                    warn!(doc = %key, "document does not have valid sync data");
                    return;
                }
            },
        };

        if sync_data.sequence <= self.initial_sequence() {
            // the feed is replaying something from before startup
            return;
        }

        let now = self.clock.now();
        if sync_data.time_saved > 0 {
            let lag_ms = now.as_millis().saturating_sub(sync_data.time_saved);
            debug!(sequence = sync_data.sequence, lag_ms, doc = %key, "received feed entry");
        }

        let mut changed = ChannelSet::default();

        // sequences wasted by conflicting updates get empty entries so the
        // stream stays gap-free
        for &seq in &sync_data.unused_sequences {
            debug!(sequence = seq, doc = %key, "received unused sequence");
            changed.extend(self.process_entry(LogEntry::placeholder(seq, now)));
        }

        // Earlier sequences this doc recently held may never have reached
        // the gateway; feed them as placeholders so buffering can proceed.
        // A removal recorded at one of them is attached so late channel
        // removals become visible. Sequences at or above the doc's current
        // position are its own and must not be re-fed.
        let current_sequence = sync_data
            .unused_sequences
            .first()
            .copied()
            .unwrap_or(sync_data.sequence);
        let next_sequence = self.next_sequence();
        for &seq in &sync_data.recent_sequences {
            if seq >= next_sequence && seq < current_sequence {
                debug!(sequence = seq, doc = %key, "received deduplicated sequence");
                let mut change = LogEntry::placeholder(seq, now);
                if let Some((removals, rev_id)) = sync_data.channels_removed_at(seq) {
                    change.doc_id = key.to_string();
                    change.rev_id = rev_id;
                    change.channels = Some(removals);
                }
                changed.extend(self.process_entry(change));
            }
        }

        let change = LogEntry {
            sequence: sync_data.sequence,
            doc_id: key.to_string(),
            rev_id: sync_data.current_rev.clone(),
            flags: sync_data.flags,
            channels: Some(sync_data.channels),
            time_received: now,
            time_saved: sync_data.time_saved,
            skipped: false,
        };
        changed.extend(self.process_entry(change));

        self.listeners.notify(&changed);
    }

    async fn import_from_feed(&self, event: &FeedEvent) {
        let is_delete = event.opcode == FeedOpcode::Deletion;
        let body = if is_delete {
            None
        } else {
            Some(event.value.clone())
        };
        let result = self
            .store
            .import_doc_raw(
                &event.key,
                body,
                event.xattr.clone(),
                is_delete,
                event.cas,
                event.expiry,
            )
            .await;
        match result {
            Ok(()) => {}
            Err(StoreError::ImportCasFailure) => {
                debug!(doc = %event.key, "not importing; doc was updated again and will import from that mutation");
            }
            Err(StoreError::ImportCancelledFilter) => {}
            Err(err) => {
                debug!(doc = %event.key, %err, "did not import doc; external update will not be visible");
            }
        }
    }

    /// Principal docs matter only for the sequence their mutation consumed;
    /// without a placeholder the stream would wait forever on that gap.
    fn process_principal_doc(&self, event: &FeedEvent) {
        let meta: PrincipalMeta = match serde_json::from_slice(&event.value) {
            Ok(meta) => meta,
            Err(err) => {
                warn!(doc = %event.key, %err, "error unmarshaling principal doc");
                return;
            }
        };
        if meta.sequence <= self.initial_sequence() {
            return;
        }
        debug!(sequence = meta.sequence, doc = %event.key, "received principal doc");
        let change = LogEntry::placeholder(meta.sequence, self.clock.now());
        let changed = self.process_entry(change);
        self.listeners.notify(&changed);
    }

    fn process_unused_sequence(&self, key: &str) {
        let Some(sequence) = event::parse_unused_sequence(key) else {
            warn!(doc = %key, "unable to identify sequence in unused sequence notification");
            return;
        };
        self.release_unused_sequence(sequence);
    }

    fn process_unused_sequence_range(&self, key: &str) {
        let Some((from_sequence, to_sequence)) = event::parse_unused_sequence_range(key) else {
            warn!(doc = %key, "unable to identify range in unused sequences notification");
            return;
        };
        let now = self.clock.now();
        let mut changed = ChannelSet::default();
        for sequence in from_sequence..=to_sequence {
            debug!(sequence, "received unused sequence");
            changed.extend(self.process_entry(LogEntry::placeholder(sequence, now)));
        }
        self.listeners.notify(&changed);
    }

    fn release_unused_sequence(&self, sequence: u64) {
        debug!(sequence, "received unused sequence");
        let change = LogEntry::placeholder(sequence, self.clock.now());
        // buffering may unblock pending sequences, so listeners need to
        // hear about any channels that changed
        let changed = self.process_entry(change);
        self.listeners.notify(&changed);
    }

    /// Run one entry through the sequence state machine. Returns the
    /// channels whose caches changed.
    pub fn process_entry(&self, mut change: LogEntry) -> ChannelSet {
        let mut inner = self.inner.write();
        if inner.logs_disabled {
            return ChannelSet::default();
        }

        let sequence = change.sequence;
        if inner.received_seqs.contains(&sequence) {
            debug!(sequence, "ignoring duplicate");
            self.stats.incr_duplicates();
            return ChannelSet::default();
        }
        inner.received_seqs.insert(sequence);
        self.stats.incr_received();

        if sequence == inner.next_sequence || inner.next_sequence == 0 {
            // the expected next sequence; cache it and drain anything that
            // became contiguous behind it
            let mut changed = self.add_to_cache(&mut inner, change);
            changed.extend(self.drain_pending(&mut inner));
            changed
        } else if sequence > inner.next_sequence {
            // a sequence (or several) is missing; buffer until it arrives
            change.time_received = self.clock.now();
            inner.pending_logs.push(change);
            let num_pending = inner.pending_logs.len();
            debug!(
                sequence,
                num_pending,
                waiting_for = inner.next_sequence,
                "deferring out-of-order sequence"
            );
            self.stats.incr_deferred();
            self.stats.set_max_pending(num_pending as u64);
            if num_pending > self.options.pending_seq_max_num {
                self.drain_pending(&mut inner)
            } else {
                ChannelSet::default()
            }
        } else if sequence > inner.initial_sequence {
            // arrived after next_sequence already passed it
            if self.skipped_seqs.read().contains(sequence) {
                debug!(
                    sequence,
                    expecting = inner.next_sequence,
                    doc = %change.doc_id,
                    "received previously skipped out-of-order change"
                );
                change.skipped = true;
                self.stats.incr_late_arrivals();
            } else {
                debug!(
                    sequence,
                    expecting = inner.next_sequence,
                    doc = %change.doc_id,
                    "received unexpected out-of-order change not in skipped list"
                );
            }
            let skipped = change.skipped;
            let changed = self.add_to_cache(&mut inner, change);
            // remove from skipped only after the entry is cached, so the low
            // sequence doesn't advance before the results are readable
            if skipped {
                self.skipped_seqs.write().remove(sequence);
            }
            changed
        } else {
            // pre-startup sequence
            ChannelSet::default()
        }
    }

    /// Advance `next_sequence` past the entry and insert it into every
    /// channel it belongs to. Returns the affected channels.
    fn add_to_cache(&self, inner: &mut CacheInner, mut change: LogEntry) -> ChannelSet {
        if change.sequence >= inner.next_sequence {
            inner.next_sequence = change.sequence + 1;
        }
        if change.is_placeholder() {
            // the sequence will never carry a document; only the counter moves
            return ChannelSet::default();
        }

        let mut added_to = ChannelSet::default();
        let channels = change.channels.take().unwrap_or_default();
        let skipped = change.skipped;
        let entry = Arc::new(change);

        // late arrivals are fanned out under one lock so readers see the
        // entry in every channel's late queue or in none
        let _late_guard = skipped.then(|| self.late_seq_lock.lock());

        for (channel_name, removal) in &channels {
            let active = removal.is_none();
            let removed_here = matches!(removal, Some(r) if r.seq == entry.sequence);
            if !active && !removed_here {
                continue;
            }
            let channel_cache = self.channel_cache_locked(inner, channel_name);
            if skipped {
                channel_cache.add_late_to_cache(&entry, removal.as_ref());
            } else {
                channel_cache.add_to_cache(&entry, removal.as_ref());
            }
            added_to.insert(channel_name.clone());
        }

        if self.options.enable_star_channel {
            let channel_cache = self.channel_cache_locked(inner, STAR_CHANNEL);
            if skipped {
                channel_cache.add_late_to_cache(&entry, None);
            } else {
                channel_cache.add_to_cache(&entry, None);
            }
            added_to.insert(STAR_CHANNEL.to_string());
        }

        added_to
    }

    /// Pop contiguous pending entries into the cache. If the head has been
    /// waiting too long, or the buffer is over its bound, force progress by
    /// promoting the missing sequence to skipped.
    fn drain_pending(&self, inner: &mut CacheInner) -> ChannelSet {
        let mut changed = ChannelSet::default();
        loop {
            let Some(head_sequence) = inner.pending_logs.peek_sequence() else {
                break;
            };
            if head_sequence == inner.next_sequence {
                let change = inner.pending_logs.pop().expect("peeked entry");
                changed.extend(self.add_to_cache(inner, change));
                continue;
            }
            let over_capacity = inner.pending_logs.len() > self.options.pending_seq_max_num;
            let now = self.clock.now();
            let head_expired = matches!(
                inner.pending_logs.peek_time_received(),
                Some(received) if received.age(now) >= self.options.pending_seq_max_wait
            );
            if over_capacity || head_expired {
                let missing = inner.next_sequence;
                info!(
                    sequence = missing,
                    over_capacity, "pending sequence missing; promoting to skipped"
                );
                self.stats.incr_out_of_order();
                self.push_skipped(missing);
                inner.next_sequence += 1;
            } else {
                break;
            }
        }
        changed
    }

    fn channel_cache_locked(&self, inner: &mut CacheInner, channel_name: &str) -> Arc<ChannelCache> {
        if let Some(cache) = inner.channel_caches.get(channel_name) {
            return Arc::clone(cache);
        }
        // everything after the startup sequence will appear on the feed, but
        // not the startup sequence itself
        let valid_from = inner.initial_sequence + 1;
        let cache = Arc::new(ChannelCache::new(
            channel_name,
            valid_from,
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.options.channel_cache.clone(),
        ));
        inner
            .channel_caches
            .insert(channel_name.to_string(), Arc::clone(&cache));
        cache
    }

    fn channel_cache(&self, channel_name: &str) -> Arc<ChannelCache> {
        let mut inner = self.inner.write();
        self.channel_cache_locked(&mut inner, channel_name)
    }

    //// CHANGE ACCESS

    /// Ordered changes for one channel, backfilled from the store when the
    /// request predates the cache's validity window.
    pub async fn get_changes(
        &self,
        channel_name: &str,
        options: ChangesOptions,
    ) -> Result<Vec<Arc<LogEntry>>, CacheError> {
        if self.is_stopped() {
            return Err(CacheError::Stopped);
        }
        let cache = self.channel_cache(channel_name);
        cache.get_changes(&options).await
    }

    /// Pure in-memory answer: the channel's validity bound and cached tail.
    pub fn get_cached_changes(
        &self,
        channel_name: &str,
        options: ChangesOptions,
    ) -> (u64, Vec<Arc<LogEntry>>) {
        self.channel_cache(channel_name).cached_changes(&options)
    }

    /// Late arrivals for one channel tagged after `since_tag`.
    pub fn late_sequences_since(
        &self,
        channel_name: &str,
        since_tag: u64,
    ) -> (Vec<Arc<LogEntry>>, u64) {
        self.channel_cache(channel_name).late_sequences_since(since_tag)
    }

    /// Purge the given docs from every channel cache; returns the count
    /// removed, summed over channels.
    pub fn remove(&self, doc_ids: &[String], start_time: Timestamp) -> usize {
        if doc_ids.is_empty() {
            return 0;
        }
        let doc_ids: AHashSet<String> = doc_ids.iter().cloned().collect();
        let inner = self.inner.write();
        inner
            .channel_caches
            .values()
            .map(|cache| cache.remove(&doc_ids, start_time))
            .sum()
    }

    //// SKIPPED SEQUENCES

    pub fn has_skipped(&self, sequence: u64) -> bool {
        self.skipped_seqs.read().contains(sequence)
    }

    /// Lowest sequence still awaited, for low-sequence stamping by readers.
    pub fn oldest_skipped_sequence(&self) -> Option<u64> {
        self.skipped_seqs.read().oldest()
    }

    fn push_skipped(&self, sequence: u64) {
        let now = self.clock.now();
        if let Err(err) = self.skipped_seqs.write().push(sequence, now) {
            warn!(sequence, %err, "error pushing skipped sequence");
        }
    }

    fn remove_skipped_sequences(&self, sequences: &[u64]) -> u64 {
        let mut skipped = self.skipped_seqs.write();
        let mut removed = 0;
        for &sequence in sequences {
            if skipped.remove(sequence) {
                removed += 1;
            } else {
                warn!(sequence, "error purging sequence from skipped list");
            }
        }
        removed
    }

    fn skipped_older_than_max_wait(&self) -> Vec<u64> {
        self.skipped_seqs
            .read()
            .older_than(self.clock.now(), self.options.skipped_seq_max_wait)
    }

    //// HOUSEKEEPING

    /// Periodic cleanup: promote pending entries that waited too long and
    /// prune every channel cache. Returns false once the cache is stopped.
    pub fn clean_up(&self) -> bool {
        let changed;
        {
            let mut inner = self.inner.write();
            if inner.stopped {
                return false;
            }
            changed = self.drain_pending(&mut inner);
            for cache in inner.channel_caches.values() {
                cache.prune_cache();
            }
        }
        self.listeners.notify(&changed);
        true
    }

    /// Periodic cleanup of the skipped-sequence registry. Expired sequences
    /// are resolved against the backing store in batches; resolvable ones
    /// re-enter the state machine as late arrivals with their true channel
    /// set, the rest are abandoned.
    pub async fn clean_skipped_sequences(&self) {
        let mut expired = self.skipped_older_than_max_wait();
        if expired.is_empty() {
            return;
        }
        info!(
            count = expired.len(),
            "starting skipped sequence cleanup; sequences waited past max"
        );

        let mut found_entries: Vec<LogEntry> = Vec::new();
        let mut pending_removals: Vec<u64> = Vec::new();

        if self.options.disable_skipped_query {
            pending_removals.append(&mut expired);
        }

        for batch in expired.chunks(self.options.skipped_clean_batch_size.max(1)) {
            debug!(batch = batch.len(), "issuing skipped sequence resolution query");
            let entries = match self.store.changes_for_sequences(batch).await {
                Ok(entries) => entries,
                Err(err) => {
                    // transient; these stay skipped until the next sweep
                    warn!(
                        sequences = batch.len(),
                        %err,
                        "error resolving sequences during skipped cleanup; treated as not found"
                    );
                    continue;
                }
            };
            let found: AHashSet<u64> = entries.iter().map(|e| e.sequence).collect();
            for &sequence in batch {
                if !found.contains(&sequence) {
                    warn!(
                        sequence,
                        "skipped sequence not found in backing store; it will not be replicated until restart"
                    );
                    pending_removals.push(sequence);
                }
            }
            found_entries.extend(entries);
        }

        // resolved entries re-enter the state machine, which also removes
        // them from the skipped list
        let found_count = found_entries.len();
        let mut changed = ChannelSet::default();
        for mut entry in found_entries {
            entry.skipped = true;
            entry.time_received = self.clock.now();
            // the sequence query resolves through the wildcard index; the
            // doc itself has the real channel set
            match self.store.get_document(&entry.doc_id).await {
                Ok(doc) => entry.channels = Some(doc.sync.channels),
                Err(err) => {
                    warn!(
                        doc = %entry.doc_id,
                        sequence = entry.sequence,
                        %err,
                        "unable to retrieve doc for skipped sequence; abandoning"
                    );
                    continue;
                }
            }
            changed.extend(self.process_entry(entry));
        }
        // healing may have unblocked pending sequences; wake any feeds
        // working those channels
        self.listeners.notify(&changed);

        let removed = self.remove_skipped_sequences(&pending_removals);
        self.stats.add_abandoned_seqs(removed);
        info!(
            found = found_count,
            abandoned = removed,
            "skipped sequence cleanup complete"
        );
    }
}
