//! External encoding of a position in the changes feed.
//!
//! Most of the time `triggered_by` is 0, but if a revision is being sent
//! retroactively because a user got access to a channel, `triggered_by` is
//! the sequence of the change that granted the access. `low_seq` carries the
//! lowest contiguous sequence on the feed at emission time, so a client can
//! resume without missing sequences that were still in flight.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A change sequence as reported externally in a changes feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SequenceId {
    /// The actual internal sequence
    pub seq: u64,
    /// The sequence that triggered this entry (0 if none)
    pub triggered_by: u64,
    /// Lowest contiguous sequence seen on the feed (0 if unset)
    pub low_seq: u64,
}

/// Upper bound for feed iteration.
pub const MAX_SEQUENCE_ID: SequenceId = SequenceId {
    seq: u64::MAX,
    triggered_by: 0,
    low_seq: 0,
};

impl SequenceId {
    pub fn new(seq: u64) -> Self {
        SequenceId {
            seq,
            ..Default::default()
        }
    }

    /// The position this id is safe to resume from. `low_seq` wins when it
    /// is a real lower bound; a `low_seq` at or above `seq` occurs when
    /// sending previously skipped sequences and is ignored.
    pub fn safe_sequence(&self) -> u64 {
        if self.low_seq > 0 && self.low_seq < self.seq {
            self.low_seq
        } else {
            self.seq
        }
    }

    /// Feed ordering. The most significant value is `triggered_by`, unless
    /// it is zero, in which case the safe sequence is used. The tricky part
    /// is that "n" sorts after "n:m" for any nonzero m.
    pub fn before(&self, other: &SequenceId) -> bool {
        if self.triggered_by == other.triggered_by {
            // untriggered, or triggered by the same sequence
            self.safe_sequence() < other.safe_sequence()
        } else if self.triggered_by == 0 {
            // other triggered but not self
            self.safe_sequence() < other.triggered_by
        } else if other.triggered_by == 0 {
            // self triggered but not other
            self.triggered_by <= other.safe_sequence()
        } else {
            // both triggered, by different sequences
            self.triggered_by < other.triggered_by
        }
    }
}

/// Sequence ids are rendered in one of three forms:
///   `seq`                      - simple sequence
///   `triggeredBy:seq`          - when triggered_by is nonzero, low_seq zero
///   `lowSeq:triggeredBy:seq`   - when low_seq is nonzero
/// When low_seq is nonzero but triggered_by is zero, the middle component is
/// empty: `lowSeq::seq`.
impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.low_seq > 0 && self.low_seq < self.seq {
            if self.triggered_by > 0 {
                write!(f, "{}:{}:{}", self.low_seq, self.triggered_by, self.seq)
            } else {
                write!(f, "{}::{}", self.low_seq, self.seq)
            }
        } else if self.triggered_by > 0 {
            write!(f, "{}:{}", self.triggered_by, self.seq)
        } else {
            write!(f, "{}", self.seq)
        }
    }
}

/// Error for a sequence string that matches none of the three forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSequenceError {
    input: String,
}

impl ParseSequenceError {
    fn new(input: &str) -> Self {
        ParseSequenceError {
            input: input.to_string(),
        }
    }
}

impl fmt::Display for ParseSequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid sequence: {:?}", self.input)
    }
}

impl std::error::Error for ParseSequenceError {}

fn parse_component(component: &str, allow_empty: bool) -> Result<u64, ()> {
    if allow_empty && component.is_empty() {
        return Ok(0);
    }
    component.parse::<u64>().map_err(|_| ())
}

impl FromStr for SequenceId {
    type Err = ParseSequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(SequenceId::default());
        }
        let err = || ParseSequenceError::new(s);
        let components: Vec<&str> = s.split(':').collect();
        let mut id = SequenceId::default();
        match components.as_slice() {
            [seq] => {
                id.seq = parse_component(seq, false).map_err(|_| err())?;
            }
            [triggered_by, seq] => {
                id.triggered_by = parse_component(triggered_by, false).map_err(|_| err())?;
                id.seq = parse_component(seq, false).map_err(|_| err())?;
            }
            [low_seq, triggered_by, seq] => {
                id.low_seq = parse_component(low_seq, false).map_err(|_| err())?;
                id.triggered_by = parse_component(triggered_by, true).map_err(|_| err())?;
                id.seq = parse_component(seq, false).map_err(|_| err())?;
            }
            _ => return Err(err()),
        }
        Ok(id)
    }
}

/// Serialized as a bare number when there are no extras, otherwise as the
/// quoted string form, matching what clients see on the wire.
impl Serialize for SequenceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.triggered_by > 0 || self.low_seq > 0 {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_u64(self.seq)
        }
    }
}

impl<'de> Deserialize<'de> for SequenceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SequenceIdVisitor;

        impl<'de> Visitor<'de> for SequenceIdVisitor {
            type Value = SequenceId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a sequence number or sequence id string")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<SequenceId, E> {
                Ok(SequenceId::new(value))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<SequenceId, E> {
                value.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(SequenceIdVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(s: u64) -> SequenceId {
        SequenceId::new(s)
    }

    fn triggered(triggered_by: u64, s: u64) -> SequenceId {
        SequenceId {
            seq: s,
            triggered_by,
            low_seq: 0,
        }
    }

    fn with_low(low_seq: u64, triggered_by: u64, s: u64) -> SequenceId {
        SequenceId {
            seq: s,
            triggered_by,
            low_seq,
        }
    }

    #[test]
    fn test_format_forms() {
        assert_eq!(seq(10).to_string(), "10");
        assert_eq!(triggered(8, 20).to_string(), "8:20");
        assert_eq!(with_low(5, 0, 20).to_string(), "5::20");
        assert_eq!(with_low(5, 8, 20).to_string(), "5:8:20");
    }

    #[test]
    fn test_low_seq_ignored_when_not_lower() {
        // A low_seq at or above seq happens when resending previously
        // skipped sequences and must not appear in the encoding.
        assert_eq!(with_low(20, 0, 20).to_string(), "20");
        assert_eq!(with_low(25, 0, 20).to_string(), "20");
        assert_eq!(with_low(25, 8, 20).to_string(), "8:20");
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!("10".parse::<SequenceId>().unwrap(), seq(10));
        assert_eq!("8:20".parse::<SequenceId>().unwrap(), triggered(8, 20));
        assert_eq!("5::20".parse::<SequenceId>().unwrap(), with_low(5, 0, 20));
        assert_eq!("5:8:20".parse::<SequenceId>().unwrap(), with_low(5, 8, 20));
        assert_eq!("".parse::<SequenceId>().unwrap(), SequenceId::default());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["x", "1:2:3:4", "1:x", "::5", "x::5", "-1", "5:"] {
            assert!(bad.parse::<SequenceId>().is_err(), "should reject {:?}", bad);
        }
    }

    #[test]
    fn test_round_trip() {
        for id in [
            seq(1),
            seq(u64::MAX),
            triggered(8, 20),
            with_low(5, 0, 20),
            with_low(5, 8, 20),
        ] {
            let parsed: SequenceId = id.to_string().parse().unwrap();
            assert_eq!(parsed, id, "round trip of {}", id);
        }
    }

    #[test]
    fn test_safe_sequence() {
        assert_eq!(seq(10).safe_sequence(), 10);
        assert_eq!(with_low(5, 0, 20).safe_sequence(), 5);
        assert_eq!(with_low(25, 0, 20).safe_sequence(), 20);
        assert_eq!(with_low(20, 0, 20).safe_sequence(), 20);
    }

    #[test]
    fn test_before_untriggered() {
        assert!(seq(1).before(&seq(2)));
        assert!(!seq(2).before(&seq(1)));
        assert!(!seq(2).before(&seq(2)));
    }

    #[test]
    fn test_before_retroactive_grant() {
        // A retroactive delivery sorts where the granting change occurred,
        // not where the doc was written.
        let x = seq(10);
        let y = triggered(8, 20);
        assert!(!x.before(&y), "10 is not before a grant at 8");
        assert!(y.before(&x), "a grant at 8 is before 10");

        let early = seq(5);
        assert!(early.before(&y), "5 is before a grant at 8");
        assert!(!y.before(&early));
    }

    #[test]
    fn test_before_triggered_sorts_after_trigger_seq() {
        // "n" sorts after "n:m" for any nonzero m
        let grant = triggered(8, 20);
        assert!(grant.before(&seq(8)));
        assert!(!seq(8).before(&grant));
    }

    #[test]
    fn test_before_both_triggered() {
        let a = triggered(8, 30);
        let b = triggered(9, 10);
        assert!(a.before(&b));
        assert!(!b.before(&a));

        // same trigger compares the inner sequence
        let c = triggered(8, 10);
        assert!(c.before(&a));
    }

    #[test]
    fn test_before_uses_low_seq() {
        let resumed = with_low(5, 0, 20);
        assert!(resumed.before(&seq(10)), "safe sequence 5 sorts before 10");
        assert!(!seq(10).before(&resumed));
    }

    #[test]
    fn test_ordering_survives_round_trip() {
        let pairs = [
            (seq(1), seq(2)),
            (seq(5), triggered(8, 20)),
            (triggered(8, 20), seq(8)),
            (with_low(5, 0, 20), seq(10)),
        ];
        for (a, b) in pairs {
            assert!(a.before(&b));
            let a2: SequenceId = a.to_string().parse().unwrap();
            let b2: SequenceId = b.to_string().parse().unwrap();
            assert!(a2.before(&b2), "{} should still sort before {}", a2, b2);
        }
    }

    #[test]
    fn test_json_round_trip() {
        let plain = seq(42);
        assert_eq!(serde_json::to_string(&plain).unwrap(), "42");

        let grant = triggered(8, 20);
        assert_eq!(serde_json::to_string(&grant).unwrap(), "\"8:20\"");

        for id in [plain, grant, with_low(5, 8, 20)] {
            let json = serde_json::to_string(&id).unwrap();
            let back: SequenceId = serde_json::from_str(&json).unwrap();
            assert_eq!(back, id);
        }

        // bare numbers and quoted strings both deserialize
        let from_num: SequenceId = serde_json::from_str("7").unwrap();
        assert_eq!(from_num, seq(7));
        let from_str: SequenceId = serde_json::from_str("\"5::20\"").unwrap();
        assert_eq!(from_str, with_low(5, 0, 20));
    }

    #[test]
    fn test_max_sequence() {
        assert!(!MAX_SEQUENCE_ID.before(&seq(u64::MAX - 1)));
        assert!(seq(1).before(&MAX_SEQUENCE_ID));
    }
}
