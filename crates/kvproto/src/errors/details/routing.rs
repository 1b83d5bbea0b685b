//! Details telling the sender it reached the wrong replica, range, store, or
//! node. None of these restart the transaction; the sender reroutes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{DetailSource, ProtocolViolation, UnionSlot};
use crate::{Key, Lease, RangeDescriptor, RangeId, ReplicaDescriptor, ReplicaId, StoreId};

// ---------------------------------------------------------------------------
// Lease routing
// ---------------------------------------------------------------------------

/// The replica that received the request does not hold the range lease.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotLeaseHolderError {
    /// The replica that rejected the request.
    pub replica: ReplicaDescriptor,
    /// The lease holder, if known.
    pub lease_holder: Option<ReplicaDescriptor>,
    /// The current lease, if known. More informative than `lease_holder`.
    pub lease: Option<Lease>,
    /// Range the request was addressed to.
    pub range_id: RangeId,
    /// Replaces the generated text when set.
    pub custom_msg: String,
}

impl fmt::Display for NotLeaseHolderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREFIX: &str = "[NotLeaseHolderError] ";
        if !self.custom_msg.is_empty() {
            return write!(f, "{PREFIX}{}", self.custom_msg);
        }
        write!(
            f,
            "{PREFIX}r{}: replica {} not lease holder; ",
            self.range_id, self.replica
        )?;
        match (&self.lease_holder, &self.lease) {
            (None, _) => f.write_str("lease holder unknown"),
            (Some(_), Some(lease)) => write!(f, "current lease is {lease}"),
            (Some(holder), None) => write!(f, "replica {holder} is"),
        }
    }
}

impl DetailSource for NotLeaseHolderError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

/// A lease request was refused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRejectedError {
    /// Why the lease was refused.
    pub message: String,
    /// The lease that was asked for.
    pub requested: Lease,
    /// The lease in place when the request was evaluated.
    pub existing: Lease,
}

impl fmt::Display for LeaseRejectedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot replace lease {} with {}: {}",
            self.existing, self.requested, self.message
        )
    }
}

impl DetailSource for LeaseRejectedError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

// ---------------------------------------------------------------------------
// Range addressing
// ---------------------------------------------------------------------------

/// The addressed range does not exist on the receiving store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeNotFoundError {
    /// The range that could not be found.
    pub range_id: RangeId,
    /// The store that was searched, when known.
    pub store_id: Option<StoreId>,
}

impl RangeNotFoundError {
    pub fn new(range_id: RangeId, store_id: Option<StoreId>) -> Self {
        Self { range_id, store_id }
    }
}

impl fmt::Display for RangeNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{} was not found", self.range_id)?;
        if let Some(store_id) = self.store_id {
            write!(f, " on s{store_id}")?;
        }
        Ok(())
    }
}

impl DetailSource for RangeNotFoundError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

/// The request's key span is not contained in the range it was sent to.
///
/// When the receiving replica knows the range it actually holds, that
/// descriptor is returned so the client can update its range cache. An
/// uninitialized descriptor would poison that cache, so none of the
/// constructors, nor deserialization, will accept one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RangeKeyMismatchFields")]
pub struct RangeKeyMismatchError {
    pub request_start_key: Key,
    pub request_end_key: Key,
    mismatched_range: Option<RangeDescriptor>,
}

#[derive(Deserialize)]
struct RangeKeyMismatchFields {
    request_start_key: Key,
    request_end_key: Key,
    mismatched_range: Option<RangeDescriptor>,
}

impl TryFrom<RangeKeyMismatchFields> for RangeKeyMismatchError {
    type Error = ProtocolViolation;

    fn try_from(fields: RangeKeyMismatchFields) -> Result<Self, Self::Error> {
        Self::try_new(
            fields.request_start_key,
            fields.request_end_key,
            fields.mismatched_range,
        )
    }
}

impl RangeKeyMismatchError {
    /// Builds the error, rejecting an uninitialized `desc`.
    pub fn try_new(start: Key, end: Key, desc: Option<RangeDescriptor>) -> Result<Self, ProtocolViolation> {
        if let Some(desc) = desc.as_ref().filter(|d| !d.is_initialized()) {
            let violation = ProtocolViolation::UninitializedRangeDescriptor {
                descriptor: format!("{desc:?}"),
            };
            tracing::error!(range_id = %desc.range_id, %violation, "refusing to return range descriptor");
            return Err(violation);
        }
        Ok(Self {
            request_start_key: start,
            request_end_key: end,
            mismatched_range: desc,
        })
    }

    /// Builds the error.
    ///
    /// # Panics
    ///
    /// Panics if `desc` is present but not initialized.
    pub fn new(start: Key, end: Key, desc: Option<RangeDescriptor>) -> Self {
        match Self::try_new(start, end, desc) {
            Ok(err) => err,
            Err(violation) => panic!("{violation}"),
        }
    }

    /// The range the replica actually holds, if it reported one.
    pub fn mismatched_range(&self) -> Option<&RangeDescriptor> {
        self.mismatched_range.as_ref()
    }
}

impl fmt::Display for RangeKeyMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mismatched_range {
            Some(range) => write!(
                f,
                "key range {}-{} outside of bounds of range {}-{}",
                self.request_start_key, self.request_end_key, range.start_key, range.end_key
            ),
            None => write!(
                f,
                "key range {}-{} could not be located within a range on store",
                self.request_start_key, self.request_end_key
            ),
        }
    }
}

impl DetailSource for RangeKeyMismatchError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

// ---------------------------------------------------------------------------
// Stores, replicas, nodes
// ---------------------------------------------------------------------------

/// The addressed store is not present on the receiving node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreNotFoundError {
    pub store_id: StoreId,
}

impl StoreNotFoundError {
    pub fn new(store_id: StoreId) -> Self {
        Self { store_id }
    }
}

impl fmt::Display for StoreNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store {} was not found", self.store_id)
    }
}

impl DetailSource for StoreNotFoundError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

/// A message came from a replica that has since been removed from the range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaTooOldError {
    pub replica_id: ReplicaId,
}

impl ReplicaTooOldError {
    pub fn new(replica_id: ReplicaId) -> Self {
        Self { replica_id }
    }
}

impl fmt::Display for ReplicaTooOldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("sender replica too old, discarding message")
    }
}

impl DetailSource for ReplicaTooOldError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

/// The node cannot serve requests right now.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeUnavailableError;

impl fmt::Display for NodeUnavailableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("node unavailable; try another peer")
    }
}

impl DetailSource for NodeUnavailableError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}
