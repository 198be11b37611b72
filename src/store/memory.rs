//! In-memory backing store for tests and the feed simulator.

use crate::cache::entry::{ChannelMap, LogEntry};
use crate::store::{BackingStore, Document, StoreError, StoreFuture};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Default)]
struct MemoryStoreInner {
    last_sequence: u64,
    docs: HashMap<String, Document>,
    by_sequence: BTreeMap<u64, String>,
    imported: Vec<String>,
    upgrades: HashMap<String, Document>,
    fail_sequence_queries: bool,
}

/// Store double holding documents keyed by id and indexed by sequence.
/// Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct InMemoryBackingStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

impl InMemoryBackingStore {
    pub fn new() -> Self {
        InMemoryBackingStore::default()
    }

    /// Register a document under every sequence its metadata mentions.
    pub fn put_document(&self, doc: Document) {
        let mut inner = self.inner.write();
        inner.by_sequence.insert(doc.sync.sequence, doc.id.clone());
        if doc.sync.sequence > inner.last_sequence {
            inner.last_sequence = doc.sync.sequence;
        }
        inner.docs.insert(doc.id.clone(), doc);
    }

    pub fn set_last_sequence(&self, sequence: u64) {
        self.inner.write().last_sequence = sequence;
    }

    /// Stage a migrated document returned by `check_for_upgrade`
    pub fn put_upgrade_doc(&self, doc: Document) {
        self.inner.write().upgrades.insert(doc.id.clone(), doc);
    }

    /// Make `changes_for_sequences` fail, simulating a flaky index
    pub fn fail_sequence_queries(&self, fail: bool) {
        self.inner.write().fail_sequence_queries = fail;
    }

    /// Doc ids handed to `import_doc_raw`
    pub fn imported(&self) -> Vec<String> {
        self.inner.read().imported.clone()
    }

    fn entry_for(doc: &Document, channels: ChannelMap) -> LogEntry {
        LogEntry {
            sequence: doc.sync.sequence,
            doc_id: doc.id.clone(),
            rev_id: doc.sync.current_rev.clone(),
            flags: doc.sync.flags,
            channels: Some(channels),
            ..Default::default()
        }
    }

    fn wildcard_channels() -> ChannelMap {
        let mut channels = ChannelMap::default();
        channels.insert("*".to_string(), None);
        channels
    }
}

impl BackingStore for InMemoryBackingStore {
    fn last_assigned_sequence(&self) -> StoreFuture<'_, u64> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().last_sequence) })
    }

    fn changes_for_sequences<'a>(&'a self, sequences: &'a [u64]) -> StoreFuture<'a, Vec<LogEntry>> {
        Box::pin(async move {
            let inner = self.inner.read();
            if inner.fail_sequence_queries {
                return Err(StoreError::Backend("sequence index unavailable".to_string()));
            }
            let mut entries = Vec::new();
            for &seq in sequences {
                let Some(doc_id) = inner.by_sequence.get(&seq) else {
                    continue;
                };
                let Some(doc) = inner.docs.get(doc_id) else {
                    continue;
                };
                // resolution runs through the wildcard index, which knows
                // nothing of the doc's real channels
                if doc.sync.sequence == seq {
                    entries.push(Self::entry_for(doc, Self::wildcard_channels()));
                }
            }
            Ok(entries)
        })
    }

    fn get_document<'a>(&'a self, doc_id: &'a str) -> StoreFuture<'a, Document> {
        Box::pin(async move {
            self.inner
                .read()
                .docs
                .get(doc_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(doc_id.to_string()))
        })
    }

    fn check_for_upgrade<'a>(&'a self, doc_id: &'a str) -> StoreFuture<'a, Option<Document>> {
        Box::pin(async move { Ok(self.inner.read().upgrades.get(doc_id).cloned()) })
    }

    fn import_doc_raw<'a>(
        &'a self,
        doc_id: &'a str,
        _body: Option<Bytes>,
        _xattr: Bytes,
        _is_delete: bool,
        _cas: u64,
        _expiry: u32,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.inner.write().imported.push(doc_id.to_string());
            Ok(())
        })
    }

    fn changes_in_channel<'a>(
        &'a self,
        channel: &'a str,
        from_seq: u64,
        to_seq: u64,
    ) -> StoreFuture<'a, Vec<LogEntry>> {
        Box::pin(async move {
            let inner = self.inner.read();
            let mut entries = Vec::new();
            for (_, doc_id) in inner.by_sequence.range(from_seq..=to_seq) {
                let Some(doc) = inner.docs.get(doc_id) else {
                    continue;
                };
                let in_channel = channel == "*"
                    || matches!(doc.sync.channels.get(channel), Some(None));
                if in_channel {
                    let mut channels = ChannelMap::default();
                    channels.insert(channel.to_string(), None);
                    entries.push(Self::entry_for(doc, channels));
                }
            }
            Ok(entries)
        })
    }
}
