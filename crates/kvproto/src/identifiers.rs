//! Newtype identifiers for cluster topology and transactions.
//!
//! Nodes, stores, ranges, and replicas are all numbered with small integers
//! assigned by the cluster. Wrapping each in its own type prevents passing a
//! [`StoreId`] where a [`NodeId`] is expected, which would silently misroute a
//! request rather than fail to compile.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for integer-wrapped newtypes (cluster-assigned numbers).
// Generates: struct (Copy, Ord), new(), get(), Display.
// ---------------------------------------------------------------------------
macro_rules! int_id {
    (
        $(#[$attr:meta])*
        $name:ident($repr:ty)
    ) => {
        $(#[$attr])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($repr);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub const fn new(value: $repr) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub const fn get(self) -> $repr {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Topology identifiers
// ---------------------------------------------------------------------------

int_id! {
    /// Identifies a node (one process) in the cluster.
    NodeId(i32)
}

int_id! {
    /// Identifies a store (one storage engine) on a node.
    ///
    /// Zero is never assigned and is used by callers to mean "unknown store".
    StoreId(i32)
}

int_id! {
    /// Identifies a range: a contiguous span of the keyspace replicated as a unit.
    RangeId(i64)
}

int_id! {
    /// Identifies one replica of a range. Unique only within that range.
    ReplicaId(i32)
}

// ---------------------------------------------------------------------------
// Transaction identifier
// ---------------------------------------------------------------------------

/// Identifies a transaction across all of its epochs.
///
/// The nil UUID marks a transaction record that has not been initialized yet;
/// [`crate::Transaction::update`] treats such a record as empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxnId(Uuid);

impl TxnId {
    /// Generates a new random transaction identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`TxnId`] from an existing UUID (e.g. decoded from a request).
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }

    /// Returns `true` for the nil identifier of an uninitialized record.
    pub fn is_nil(self) -> bool {
        self.0.is_nil()
    }

    /// Returns the first eight hex digits, which is how transactions are
    /// named in log lines and error messages.
    pub fn short(self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }
}

impl std::fmt::Display for TxnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
