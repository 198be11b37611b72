//! Reader-path errors.

use crate::store::StoreError;

/// Error surfaced to changes-feed readers. Ingestion never returns errors;
/// the feed is authoritative and cannot be paused.
#[derive(Debug)]
pub enum CacheError {
    /// The cache has been stopped; callers should treat this as
    /// service-unavailable.
    Stopped,
    /// Backing-store failure while filling a request below the cache's
    /// validity window.
    Store(StoreError),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Stopped => write!(f, "change cache is stopped"),
            CacheError::Store(e) => write!(f, "backing store error: {}", e),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Stopped => None,
            CacheError::Store(e) => Some(e),
        }
    }
}

impl From<StoreError> for CacheError {
    fn from(e: StoreError) -> Self {
        CacheError::Store(e)
    }
}
