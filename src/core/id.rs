use std::{
    fmt::Display,
    sync::atomic::{
        AtomicU64,
        Ordering,
    },
};

use serde::{
    de::{
        Unexpected,
        Visitor,
    },
    Deserialize,
    Serialize,
};
use thiserror::Error;

/// An identifier used in WAMP messages.
///
/// Covers session ids, request ids, and the router-assigned ids for
/// publications, subscriptions, and registrations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Id(u64);

impl Id {
    pub const MIN: u64 = 1;
    pub const MAX: u64 = 1 << 53;
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Error for an id outside the WAMP integer range.
#[derive(Debug, Error)]
#[error("{value} is out of range for IDs")]
pub struct IdOutOfRange {
    value: u64,
}

impl From<Id> for u64 {
    fn from(value: Id) -> Self {
        value.0
    }
}

impl TryFrom<u64> for Id {
    type Error = IdOutOfRange;
    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value < Self::MIN || value > Self::MAX {
            Err(IdOutOfRange { value })
        } else {
            Ok(Id(value))
        }
    }
}

struct IdVisitor;

impl<'de> Visitor<'de> for IdVisitor {
    type Value = Id;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            formatter,
            "an unsigned integer in the range [{}, {}]",
            Id::MIN,
            Id::MAX
        )
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Id::try_from(v).map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_u64(IdVisitor)
    }
}

/// A monotonic allocator for request ids of a single request class.
///
/// Ids start at 1 and strictly increase for the lifetime of a session. The
/// read-and-increment is atomic, so any number of concurrent requesters
/// receive distinct, ordered ids.
#[derive(Debug)]
pub struct RequestIdAllocator {
    next: AtomicU64,
}

impl RequestIdAllocator {
    /// Allocates the next id in the sequence.
    pub fn generate(&self) -> Id {
        // Wrap-around would take centuries of requests, but stay inside the
        // WAMP integer range regardless.
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        Id(((id - 1) % Id::MAX) + 1)
    }

    /// Resets the sequence for a fresh session.
    pub fn reset(&self) {
        self.next.store(Id::MIN, Ordering::Relaxed);
    }
}

impl Default for RequestIdAllocator {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(Id::MIN),
        }
    }
}

#[cfg(test)]
mod id_test {
    use crate::core::id::{
        Id,
        RequestIdAllocator,
    };

    #[test]
    fn fails_deserialization_out_of_range() {
        assert_matches::assert_matches!(serde_json::from_str::<Id>(r#"0"#), Err(err) => {
            assert!(err.to_string().contains("expected an unsigned integer in the range"));
        });
        assert_matches::assert_matches!(serde_json::from_str::<Id>(r#"9007199254740993"#), Err(err) => {
            assert!(err.to_string().contains("expected an unsigned integer in the range"));
        });
    }

    #[test]
    fn allocates_strictly_increasing_ids_from_one() {
        let allocator = RequestIdAllocator::default();
        assert_eq!(allocator.generate(), Id::try_from(1).unwrap());
        assert_eq!(allocator.generate(), Id::try_from(2).unwrap());
        assert_eq!(allocator.generate(), Id::try_from(3).unwrap());

        allocator.reset();
        assert_eq!(allocator.generate(), Id::try_from(1).unwrap());
    }

    #[test]
    fn allocators_for_different_classes_are_independent() {
        let calls = RequestIdAllocator::default();
        let publishes = RequestIdAllocator::default();
        calls.generate();
        calls.generate();
        assert_eq!(publishes.generate(), Id::try_from(1).unwrap());
        assert_eq!(calls.generate(), Id::try_from(3).unwrap());
    }
}
