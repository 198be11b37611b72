//! The change cache: sequence buffering and per-channel fan-out.
//!
//! Feed events arrive out of order from many partitions; the coordinator
//! reassembles them into a gap-free sequence stream and distributes each
//! entry to the caches of the channels it belongs to.
//!
//! ```text
//! feed event ──► ChangeCache::doc_changed ──► process_entry ─┬─► ChannelCache "A"
//!                      (pending / skipped buffering)         ├─► ChannelCache "B"
//!                                                            └─► ChannelCache "*"
//!                                      │
//!                                      └──► listener notification
//! ```

pub mod change_cache;
pub mod channel_cache;
pub mod entry;
pub mod error;
pub mod housekeeping;
pub mod listener;
pub mod options;
pub mod pending;
pub mod sequence_id;
pub mod skipped;
pub mod stats;

pub use change_cache::{ChangeCache, STAR_CHANNEL};
pub use channel_cache::{ChangesOptions, ChannelCache, LateLogEntry};
pub use entry::{flags, ChannelMap, ChannelRemoval, LogEntry};
pub use error::CacheError;
pub use listener::{ChannelSet, ListenerBus, NotifyFn};
pub use options::{CacheOptions, ChannelCacheOptions};
pub use pending::PendingLogs;
pub use sequence_id::{ParseSequenceError, SequenceId, MAX_SEQUENCE_ID};
pub use skipped::{SkippedPushError, SkippedSequenceList};
pub use stats::{CacheStats, CacheStatsSnapshot};
