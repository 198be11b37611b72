//! Parsing of the sync-metadata section carried by feed documents.
//!
//! The metadata travels either as a dedicated xattr alongside the body or
//! embedded in the body under the `_sync` property. Only the metadata is
//! unmarshalled here; document bodies are opaque to the cache.

use crate::cache::entry::{ChannelMap, ChannelRemoval};
use crate::feed::event::FeedEvent;
use serde::Deserialize;

/// The sync-metadata section of a document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncData {
    /// Global sequence assigned to this revision
    #[serde(default)]
    pub sequence: u64,
    /// Current revision id
    #[serde(default, rename = "rev")]
    pub current_rev: String,
    /// Entry flag bits
    #[serde(default)]
    pub flags: u8,
    /// Producer-side save time, epoch millis
    #[serde(default)]
    pub time_saved: u64,
    /// Channel membership with optional removal markers
    #[serde(default)]
    pub channels: ChannelMap,
    /// Recently used sequences for this document, oldest first
    #[serde(default)]
    pub recent_sequences: Vec<u64>,
    /// Sequences wasted by conflicting updates
    #[serde(default)]
    pub unused_sequences: Vec<u64>,
    /// CAS recorded at the last gateway-originated write
    #[serde(default)]
    pub cas: Option<u64>,
}

impl SyncData {
    /// Whether this mutation was written through the gateway. A mismatch
    /// means an external writer updated the doc after the metadata was
    /// stamped, so the metadata does not describe this mutation.
    pub fn is_sg_write(&self, event_cas: u64) -> bool {
        self.cas == Some(event_cas)
    }

    /// Minimum metadata needed to cache an entry.
    pub fn has_valid_sync_data(&self) -> bool {
        self.sequence > 0 && !self.current_rev.is_empty()
    }

    /// Channels the document was removed from at exactly `sequence`,
    /// with the revision id recorded at removal.
    pub fn channels_removed_at(&self, sequence: u64) -> Option<(ChannelMap, String)> {
        let mut removals = ChannelMap::default();
        let mut rev_id = String::new();
        for (name, removal) in &self.channels {
            if let Some(removal) = removal {
                if removal.seq == sequence {
                    rev_id = removal.rev.clone();
                    removals.insert(name.clone(), Some(removal.clone()));
                }
            }
        }
        if removals.is_empty() {
            None
        } else {
            Some((removals, rev_id))
        }
    }
}

/// Body wrapper for documents carrying metadata inline.
#[derive(Deserialize)]
struct SyncedDocument {
    #[serde(rename = "_sync")]
    sync: Option<SyncData>,
}

/// Failure to extract sync metadata from a feed event.
#[derive(Debug)]
pub enum SyncMetaError {
    /// Payload did not unmarshal
    Malformed(serde_json::Error),
    /// Payload unmarshalled but carries no metadata section
    Missing,
}

impl std::fmt::Display for SyncMetaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMetaError::Malformed(e) => write!(f, "malformed sync metadata: {}", e),
            SyncMetaError::Missing => write!(f, "no sync metadata in document"),
        }
    }
}

impl std::error::Error for SyncMetaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncMetaError::Malformed(e) => Some(e),
            SyncMetaError::Missing => None,
        }
    }
}

/// Extract the sync metadata from a feed event, preferring the xattr
/// carrier when present.
pub fn parse_sync_data(event: &FeedEvent) -> Result<SyncData, SyncMetaError> {
    if !event.xattr.is_empty() {
        return serde_json::from_slice(&event.xattr).map_err(SyncMetaError::Malformed);
    }
    let doc: SyncedDocument =
        serde_json::from_slice(&event.value).map_err(SyncMetaError::Malformed)?;
    doc.sync.ok_or(SyncMetaError::Missing)
}

/// Render a document body with inline metadata. Test and simulation helper.
pub fn sync_body(sequence: u64, rev: &str, channels: &[&str]) -> Vec<u8> {
    let channel_map: std::collections::BTreeMap<&str, Option<ChannelRemoval>> =
        channels.iter().map(|&name| (name, None)).collect();
    serde_json::to_vec(&serde_json::json!({
        "_sync": {
            "sequence": sequence,
            "rev": rev,
            "channels": channel_map,
        }
    }))
    .expect("static body must serialize")
}
