//! Registry of sequences the cache has advanced past without seeing.
//!
//! The push rule (strictly increasing sequences only) makes sequence order
//! equal insertion-time order, so a single ordered map serves both the
//! by-sequence lookups and the oldest-first expiry walks.

use crate::clock::Timestamp;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Error for a push that would break the ordering invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPushError {
    sequence: u64,
    tail: u64,
}

impl fmt::Display for SkippedPushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "can't push sequence {} at or below existing maximum {}",
            self.sequence, self.tail
        )
    }
}

impl std::error::Error for SkippedPushError {}

/// Ordered, time-stamped set of skipped sequences.
#[derive(Debug, Default)]
pub struct SkippedSequenceList {
    entries: BTreeMap<u64, Timestamp>,
}

impl SkippedSequenceList {
    pub fn new() -> Self {
        SkippedSequenceList {
            entries: BTreeMap::new(),
        }
    }

    /// Append a sequence. Rejects a sequence at or below the current tail,
    /// which keeps the list strictly increasing in both sequence and
    /// time added.
    pub fn push(&mut self, sequence: u64, time_added: Timestamp) -> Result<(), SkippedPushError> {
        if let Some((&tail, _)) = self.entries.last_key_value() {
            if sequence <= tail {
                return Err(SkippedPushError { sequence, tail });
            }
        }
        self.entries.insert(sequence, time_added);
        Ok(())
    }

    /// Remove a sequence; false if it was not present.
    pub fn remove(&mut self, sequence: u64) -> bool {
        self.entries.remove(&sequence).is_some()
    }

    pub fn contains(&self, sequence: u64) -> bool {
        self.entries.contains_key(&sequence)
    }

    /// Sequence of the oldest (lowest) entry
    pub fn oldest(&self) -> Option<u64> {
        self.entries.first_key_value().map(|(&seq, _)| seq)
    }

    /// Sequences whose entries are older than `max_age` as of `now`.
    /// Entries are time-ordered, so the walk stops at the first fresh one.
    pub fn older_than(&self, now: Timestamp, max_age: Duration) -> Vec<u64> {
        let mut old = Vec::new();
        for (&seq, &added) in &self.entries {
            if added.age(now) > max_age {
                old.push(seq);
            } else {
                break;
            }
        }
        old
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
