//! Cache configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Max number of pending sequences buffered before forcing progress
pub const DEFAULT_PENDING_SEQ_MAX_NUM: usize = 10_000;
/// Max time to wait for a pending sequence before promoting it to skipped
pub const DEFAULT_PENDING_SEQ_MAX_WAIT: Duration = Duration::from_secs(5);
/// Max time to wait for a skipped sequence before abandoning it
pub const DEFAULT_SKIPPED_SEQ_MAX_WAIT: Duration = Duration::from_secs(60 * 60);
/// Max number of sequences resolved per backing-store query during skipped cleanup
pub const DEFAULT_SKIPPED_CLEAN_BATCH_SIZE: usize = 50;

/// Coordinator-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Per-channel cache bounds
    pub channel_cache: ChannelCacheOptions,
    /// Max wait for a pending sequence before skipping
    #[serde(with = "duration_millis")]
    pub pending_seq_max_wait: Duration,
    /// Max number of pending sequences before skipping
    pub pending_seq_max_num: usize,
    /// Max wait for a skipped sequence before abandoning
    #[serde(with = "duration_millis")]
    pub skipped_seq_max_wait: Duration,
    /// Batch size for backing-store resolution of expired skipped sequences
    pub skipped_clean_batch_size: usize,
    /// Abandon expired skipped sequences without querying the backing store
    pub disable_skipped_query: bool,
    /// Maintain a wildcard channel receiving every document entry
    pub enable_star_channel: bool,
    /// Feed carries metadata in xattrs; binary events without them are ignored
    pub use_xattrs: bool,
    /// Import externally written documents encountered on the feed
    pub auto_import: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions {
            channel_cache: ChannelCacheOptions::default(),
            pending_seq_max_wait: DEFAULT_PENDING_SEQ_MAX_WAIT,
            pending_seq_max_num: DEFAULT_PENDING_SEQ_MAX_NUM,
            skipped_seq_max_wait: DEFAULT_SKIPPED_SEQ_MAX_WAIT,
            skipped_clean_batch_size: DEFAULT_SKIPPED_CLEAN_BATCH_SIZE,
            disable_skipped_query: false,
            enable_star_channel: true,
            use_xattrs: false,
            auto_import: false,
        }
    }
}

impl CacheOptions {
    /// Configuration for tests (small bounds, tight timings)
    pub fn test() -> Self {
        CacheOptions {
            channel_cache: ChannelCacheOptions::test(),
            pending_seq_max_wait: Duration::from_millis(40),
            pending_seq_max_num: 100,
            skipped_seq_max_wait: Duration::from_millis(100),
            skipped_clean_batch_size: 10,
            ..Default::default()
        }
    }
}

/// Bounds for one channel's cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelCacheOptions {
    /// Entry count below which age pruning never shrinks the cache
    pub min_length: usize,
    /// Entry count above which the oldest entries are dropped
    pub max_length: usize,
    /// Entries older than this are dropped once min_length is satisfied
    #[serde(with = "duration_millis")]
    pub max_age: Duration,
}

impl Default for ChannelCacheOptions {
    fn default() -> Self {
        ChannelCacheOptions {
            min_length: 50,
            max_length: 500,
            max_age: Duration::from_secs(60),
        }
    }
}

impl ChannelCacheOptions {
    /// Configuration for tests (small bounds)
    pub fn test() -> Self {
        ChannelCacheOptions {
            min_length: 5,
            max_length: 20,
            max_age: Duration::from_millis(200),
        }
    }
}

/// Durations cross the config boundary as integer milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
