//! Value types shared by transactions and error details.
//!
//! These are the pieces of the data model that error details carry by copy:
//! hybrid-logical-clock timestamps, keys, replica and range descriptors,
//! leases, and intents. They are plain values; nothing here performs I/O or
//! owns any lifecycle beyond cloning.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{NodeId, RangeId, ReplicaId, StoreId, TxnId};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// A hybrid-logical-clock timestamp.
///
/// `wall_time` is nanoseconds since the Unix epoch as read from the node's
/// physical clock; `logical` orders events that share a wall time. The zero
/// value means "unset".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp {
    /// Physical component, in nanoseconds.
    pub wall_time: i64,
    /// Logical component, disambiguating equal wall times.
    pub logical: i32,
}

impl Timestamp {
    /// Creates a new [`Timestamp`].
    pub const fn new(wall_time: i64, logical: i32) -> Self {
        Self { wall_time, logical }
    }

    /// Returns `true` if this is the zero (unset) timestamp.
    pub fn is_empty(self) -> bool {
        self == Self::default()
    }

    /// Advances `self` to `other` if `other` is later. Returns whether it moved.
    pub fn forward(&mut self, other: Timestamp) -> bool {
        if *self < other {
            *self = other;
            true
        } else {
            false
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:09},{}",
            self.wall_time.div_euclid(NANOS_PER_SECOND),
            self.wall_time.rem_euclid(NANOS_PER_SECOND),
            self.logical
        )
    }
}

/// The timestamp a given node's clock reported when a transaction first
/// visited it. Reads against that node need not consider values above this
/// timestamp as uncertain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObservedTimestamp {
    pub node_id: NodeId,
    pub timestamp: Timestamp,
}

// ---------------------------------------------------------------------------
// Keys and values
// ---------------------------------------------------------------------------

/// A key in the ordered keyspace.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Key(Vec<u8>);

impl Key {
    /// Creates a key from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns `true` for the empty key.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0.escape_ascii())
    }
}

/// A stored value together with the timestamp it was written at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    pub raw_bytes: Vec<u8>,
    pub timestamp: Timestamp,
}

impl Value {
    /// Creates an untimestamped value from raw bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            raw_bytes: bytes.into(),
            timestamp: Timestamp::default(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.raw_bytes.escape_ascii())?;
        if !self.timestamp.is_empty() {
            write!(f, " @{}", self.timestamp)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Replicas, leases, and ranges
// ---------------------------------------------------------------------------

/// Where one replica of a range lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaDescriptor {
    pub node_id: NodeId,
    pub store_id: StoreId,
    pub replica_id: ReplicaId,
}

impl fmt::Display for ReplicaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(n{},s{}):", self.node_id, self.store_id)?;
        if self.replica_id.get() == 0 {
            write!(f, "?")
        } else {
            write!(f, "{}", self.replica_id)
        }
    }
}

/// A range lease: the right of one replica to serve reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub start: Timestamp,
    pub replica: ReplicaDescriptor,
    /// Liveness epoch of the holder's node; zero for expiration-based leases.
    pub epoch: i64,
    pub sequence: u64,
}

impl fmt::Display for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "repl={} seq={} start={} epo={}",
            self.replica, self.sequence, self.start, self.epoch
        )
    }
}

/// Describes the span and replica set of a range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeDescriptor {
    pub range_id: RangeId,
    pub start_key: Key,
    pub end_key: Key,
    pub replicas: Vec<ReplicaDescriptor>,
    pub next_replica_id: ReplicaId,
}

impl RangeDescriptor {
    /// Returns `true` once the descriptor has been populated from a real range.
    ///
    /// A freshly created replica that has not yet received a snapshot carries
    /// an empty descriptor; only the end key is guaranteed to be set afterwards.
    pub fn is_initialized(&self) -> bool {
        !self.end_key.is_empty()
    }
}

impl fmt::Display for RangeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}:{}-{} [", self.range_id, self.start_key, self.end_key)?;
        for (i, replica) in self.replicas.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{replica}")?;
        }
        write!(f, ", next={}]", self.next_replica_id)
    }
}

// ---------------------------------------------------------------------------
// Intents
// ---------------------------------------------------------------------------

/// A provisional write left by a transaction that has not yet resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub key: Key,
    pub txn_id: TxnId,
    pub txn_epoch: u32,
}

impl Intent {
    /// Creates an intent on `key` owned by the given transaction epoch.
    pub fn new(key: impl Into<Key>, txn_id: TxnId, txn_epoch: u32) -> Self {
        Self {
            key: key.into(),
            txn_id,
            txn_epoch,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {{id={} epo={}}}",
            self.key,
            self.txn_id.short(),
            self.txn_epoch
        )
    }
}
