//! Change-ingestion and in-memory caching core for a mobile-sync gateway.
//!
//! Sits between a distributed document store and many long-lived client
//! changes feeds: mutations arrive as an unordered stream of feed events,
//! are reassembled into a single gap-free sequence stream, and fan out to
//! per-channel caches that readers poll from any resume position.

pub mod cache;
pub mod clock;
pub mod feed;
pub mod store;

pub use cache::{
    CacheError, CacheOptions, CacheStats, CacheStatsSnapshot, ChangeCache, ChangesOptions,
    ChannelCacheOptions, ChannelSet, LogEntry, SequenceId, STAR_CHANNEL,
};
pub use clock::{Clock, SimulatedClock, SystemClock, Timestamp};
pub use feed::{FeedEvent, FeedOpcode};
pub use store::{BackingStore, Document, InMemoryBackingStore, StoreError};
