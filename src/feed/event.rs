//! Feed events and the document-key markers the cache recognizes.

use bytes::Bytes;

/// Key prefix for a single unused-sequence notification: `unusedSeq:<n>`
pub const UNUSED_SEQ_PREFIX: &str = "unusedSeq:";
/// Key prefix for an unused-sequence range: `unusedSeqs:from:<a>:to:<b>`
pub const UNUSED_SEQ_RANGE_PREFIX: &str = "unusedSeqs:from:";
/// Key prefix for user principal documents
pub const USER_DOC_PREFIX: &str = "user:";
/// Key prefix for role principal documents
pub const ROLE_DOC_PREFIX: &str = "role:";

/// Datatype bits reported by the feed.
pub mod datatype {
    /// Raw binary payload
    pub const RAW: u8 = 0x00;
    /// JSON payload
    pub const JSON: u8 = 0x01;
    /// Compressed payload
    pub const SNAPPY: u8 = 0x02;
    /// Payload carries extended attributes
    pub const XATTR: u8 = 0x04;
}

/// Mutation kind of a feed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOpcode {
    Mutation,
    Deletion,
}

/// One event pushed by the backing store's feed. Events are ordered per
/// partition but not globally.
#[derive(Debug, Clone)]
pub struct FeedEvent {
    /// Document key
    pub key: String,
    /// Raw document body
    pub value: Bytes,
    /// Raw metadata xattr, empty when the body carries the metadata
    pub xattr: Bytes,
    /// Compare-and-swap value of the mutation
    pub cas: u64,
    pub opcode: FeedOpcode,
    /// Datatype bits (see [`datatype`])
    pub data_type: u8,
    /// Document expiry
    pub expiry: u32,
    /// Process on the caller's task instead of dispatching asynchronously
    pub synchronous: bool,
}

impl FeedEvent {
    pub fn mutation(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        FeedEvent {
            key: key.into(),
            value: value.into(),
            xattr: Bytes::new(),
            cas: 0,
            opcode: FeedOpcode::Mutation,
            data_type: datatype::JSON,
            expiry: 0,
            synchronous: true,
        }
    }

    pub fn deletion(key: impl Into<String>) -> Self {
        FeedEvent {
            key: key.into(),
            value: Bytes::new(),
            xattr: Bytes::new(),
            cas: 0,
            opcode: FeedOpcode::Deletion,
            data_type: datatype::RAW,
            expiry: 0,
            synchronous: true,
        }
    }
}

/// Extract the sequence from an `unusedSeq:<n>` key.
pub fn parse_unused_sequence(key: &str) -> Option<u64> {
    key.strip_prefix(UNUSED_SEQ_PREFIX)?.parse().ok()
}

/// Extract the inclusive range from an `unusedSeqs:from:<a>:to:<b>` key.
pub fn parse_unused_sequence_range(key: &str) -> Option<(u64, u64)> {
    let (from, to) = key.strip_prefix(UNUSED_SEQ_RANGE_PREFIX)?.split_once(":to:")?;
    Some((from.parse().ok()?, to.parse().ok()?))
}
