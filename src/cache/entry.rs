//! Log entries: the records flowing from the feed into the channel caches.

use crate::clock::Timestamp;
use serde::{Deserialize, Serialize};

/// Entry flag bits, mirrored from the document sync metadata.
pub mod flags {
    /// Revision is a deletion (tombstone)
    pub const DELETED: u8 = 1;
    /// Entry records a removal from the channel it is cached under
    pub const REMOVED: u8 = 2;
    /// Revision carries attachments
    pub const HAS_ATTACHMENTS: u8 = 4;
    /// Revision lost a conflict resolution
    pub const CONFLICT: u8 = 8;
}

/// Marker recording that a document left a channel at a given sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRemoval {
    /// Sequence at which the removal happened
    pub seq: u64,
    /// Revision id the document had when removed
    #[serde(default)]
    pub rev: String,
}

/// Channel membership of an entry. A `None` value means the document is
/// currently in the channel; `Some(removal)` records when it left.
pub type ChannelMap = ahash::AHashMap<String, Option<ChannelRemoval>>;

/// One record in the change cache.
///
/// Created from a feed event (or a healing lookup), fanned out to the
/// per-channel caches, and immutable once inserted there. An entry with an
/// empty `doc_id` is a placeholder: it advances the sequence counter for a
/// sequence that will never carry a document (unused-sequence markers,
/// principal docs) and is not published to any channel.
#[derive(Debug, Clone, Default)]
pub struct LogEntry {
    /// Global position of this mutation
    pub sequence: u64,
    /// Document id; empty for placeholders
    pub doc_id: String,
    /// Current revision id
    pub rev_id: String,
    /// Flag bits (see [`flags`])
    pub flags: u8,
    /// Channel membership, taken during fan-out
    pub channels: Option<ChannelMap>,
    /// Arrival time, used for age pruning and pending timeouts
    pub time_received: Timestamp,
    /// Producer-side save time (epoch millis), used for lag logging
    pub time_saved: u64,
    /// Arrived out of order after the cache had given up on it
    pub skipped: bool,
}

impl LogEntry {
    /// Placeholder entry that only advances the sequence counter.
    pub fn placeholder(sequence: u64, time_received: Timestamp) -> Self {
        LogEntry {
            sequence,
            time_received,
            ..Default::default()
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.doc_id.is_empty()
    }

    pub fn is_removal(&self) -> bool {
        self.flags & flags::REMOVED != 0
    }

    pub fn is_deleted(&self) -> bool {
        self.flags & flags::DELETED != 0
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} ({:?}/{})", self.sequence, self.doc_id, self.rev_id)
    }
}
