//! Feed events in, sync metadata out.
//!
//! The backing store pushes mutations at its own rate; this module defines
//! the event shape, the special marker keys used for sequence management,
//! and the metadata section the cache reads off each document.

pub mod event;
pub mod sync_meta;

pub use event::{
    datatype, parse_unused_sequence, parse_unused_sequence_range, FeedEvent, FeedOpcode,
    ROLE_DOC_PREFIX, UNUSED_SEQ_PREFIX, UNUSED_SEQ_RANGE_PREFIX, USER_DOC_PREFIX,
};
pub use sync_meta::{parse_sync_data, sync_body, SyncData, SyncMetaError};
