//! Identity types for review records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Defines a transparent 64-bit identifier newtype.
///
/// # Example
/// ```ignore
/// define_id!(ReviewId, "Identifier of a review record.");
/// let id = ReviewId::new(42);
/// assert_eq!(id.as_u64(), 42);
/// ```
macro_rules! define_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw identifier.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw identifier.
            pub const fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(ReviewId, "Identifier of a review record.");
define_id!(ReplyId, "Identifier of a merchant reply.");
define_id!(AppealId, "Identifier of a merchant appeal.");
define_id!(OrderId, "Identifier of the order a review is written for.");
define_id!(StoreId, "Identifier of the store that owns a review.");
define_id!(UserId, "Identifier of the reviewing user.");

// ============================================================================
// UNIQUE ID SOURCE
// ============================================================================

/// Source of globally unique 64-bit identifiers.
///
/// Implementations must never block indefinitely and must never hand out
/// the same value twice over the lifetime of the system.
pub trait IdSource: Send + Sync {
    /// Produce the next identifier.
    fn next_id(&self) -> u64;
}

/// Custom epoch (2024-01-01T00:00:00Z) in milliseconds.
const EPOCH_MS: u64 = 1_704_067_200_000;

/// Bits reserved for the node identifier (low bits).
const NODE_BITS: u32 = 10;

/// Bits reserved for the per-millisecond sequence.
const SEQUENCE_BITS: u32 = 12;

/// Largest node identifier that fits in [`NODE_BITS`].
pub const MAX_NODE_ID: u16 = (1 << NODE_BITS) - 1;

/// Time-ordered identifier source in the snowflake layout.
///
/// Layout, most significant first: milliseconds since [`EPOCH_MS`],
/// a 12-bit sequence, then a 10-bit node id. The node id occupies the
/// lowest bits so that sequence overflow carries into the timestamp and
/// never into another node's identifier space.
#[derive(Debug)]
pub struct SnowflakeIdSource {
    node_id: u64,
    last: AtomicU64,
}

impl SnowflakeIdSource {
    /// Create a source for the given node. Node ids above [`MAX_NODE_ID`]
    /// are masked into range.
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id: u64::from(node_id & MAX_NODE_ID),
            last: AtomicU64::new(0),
        }
    }

    fn elapsed_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(EPOCH_MS)
            .saturating_sub(EPOCH_MS)
    }
}

impl Default for SnowflakeIdSource {
    fn default() -> Self {
        Self::new(0)
    }
}

impl IdSource for SnowflakeIdSource {
    fn next_id(&self) -> u64 {
        let step = 1u64 << NODE_BITS;
        let candidate = (Self::elapsed_ms() << (SEQUENCE_BITS + NODE_BITS)) | self.node_id;
        let mut last = self.last.load(Ordering::Acquire);
        loop {
            let next = if candidate > last { candidate } else { last + step };
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_id_display_and_raw() {
        let id = ReviewId::new(7);
        assert_eq!(id.as_u64(), 7);
        assert_eq!(id.to_string(), "7");
        assert_eq!(ReviewId::from(7), id);
    }

    #[test]
    fn test_id_serializes_transparently() {
        let json = serde_json::to_string(&StoreId::new(76089)).unwrap();
        assert_eq!(json, "76089");
        let back: StoreId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StoreId::new(76089));
    }

    #[test]
    fn test_snowflake_is_strictly_increasing() {
        let source = SnowflakeIdSource::new(3);
        let mut prev = 0;
        for _ in 0..10_000 {
            let id = source.next_id();
            assert!(id > prev);
            prev = id;
        }
    }

    #[test]
    fn test_snowflake_keeps_node_bits() {
        let source = SnowflakeIdSource::new(5);
        for _ in 0..5_000 {
            assert_eq!(source.next_id() & u64::from(MAX_NODE_ID), 5);
        }
    }

    #[test]
    fn test_snowflake_unique_across_threads() {
        let source = Arc::new(SnowflakeIdSource::new(1));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let source = Arc::clone(&source);
                std::thread::spawn(move || (0..2_000).map(|_| source.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 16_000);
    }

    #[test]
    fn test_distinct_nodes_never_collide() {
        let a = SnowflakeIdSource::new(1);
        let b = SnowflakeIdSource::new(2);
        let ids_a: HashSet<_> = (0..3_000).map(|_| a.next_id()).collect();
        let ids_b: HashSet<_> = (0..3_000).map(|_| b.next_id()).collect();
        assert!(ids_a.is_disjoint(&ids_b));
    }
}
