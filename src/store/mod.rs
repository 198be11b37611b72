//! Backing-store contract.
//!
//! The cache treats the document store as a narrow collaborator: feed
//! events arrive on their own, and the store is only consulted for the
//! rare point lookups that heal missed sequences and for backfilling
//! reader requests that predate the cache's validity window.

pub mod memory;

pub use memory::InMemoryBackingStore;

use crate::cache::entry::LogEntry;
use crate::feed::sync_meta::SyncData;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// A document resolved by id, with its full metadata section.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub sync: SyncData,
}

/// Backing-store failure classes.
#[derive(Debug)]
pub enum StoreError {
    /// Document or sequence not present
    NotFound(String),
    /// Import lost a CAS race; a newer feed event will re-drive the doc
    ImportCasFailure,
    /// Import rejected by the configured filter
    ImportCancelledFilter,
    /// Any other backend failure
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(what) => write!(f, "not found: {}", what),
            StoreError::ImportCasFailure => write!(f, "import lost cas race"),
            StoreError::ImportCancelledFilter => write!(f, "import rejected by filter"),
            StoreError::Backend(msg) => write!(f, "backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Operations the cache needs from the document store.
///
/// `changes_for_sequences` is best-effort: it resolves through the
/// wildcard-channel index, so returned entries carry only the wildcard
/// channel. Callers needing the true channel set follow up with
/// `get_document`.
pub trait BackingStore: Send + Sync + 'static {
    /// Most recently issued global sequence
    fn last_assigned_sequence(&self) -> StoreFuture<'_, u64>;

    /// Resolve sequences to log entries; sequences with no active revision
    /// are absent from the result
    fn changes_for_sequences<'a>(&'a self, sequences: &'a [u64]) -> StoreFuture<'a, Vec<LogEntry>>;

    /// Full document by id, including the true channel set
    fn get_document<'a>(&'a self, doc_id: &'a str) -> StoreFuture<'a, Document>;

    /// One-shot healing read for a doc whose feed event lacked metadata;
    /// returns the migrated document when an upgrade is in progress
    fn check_for_upgrade<'a>(&'a self, doc_id: &'a str) -> StoreFuture<'a, Option<Document>>;

    /// Out-of-band ingestion of an externally written document
    fn import_doc_raw<'a>(
        &'a self,
        doc_id: &'a str,
        body: Option<Bytes>,
        xattr: Bytes,
        is_delete: bool,
        cas: u64,
        expiry: u32,
    ) -> StoreFuture<'a, ()>;

    /// Entries for one channel in the inclusive sequence range, ascending
    fn changes_in_channel<'a>(
        &'a self,
        channel: &'a str,
        from_seq: u64,
        to_seq: u64,
    ) -> StoreFuture<'a, Vec<LogEntry>>;
}
