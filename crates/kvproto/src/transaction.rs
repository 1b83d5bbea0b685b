//! The transaction record as seen by the error subsystem.
//!
//! Error envelopes hold a snapshot of the transaction that was in flight when
//! the error was produced. The snapshot is always a clone; later copies of the
//! same logical transaction are folded in with [`Transaction::update`], which
//! never moves progress backwards.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Key, NodeId, ObservedTimestamp, Timestamp, TxnId};

/// Lifecycle state of a transaction record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Running; may still read and write.
    #[default]
    Pending,
    /// A parallel commit has been proposed but not yet confirmed on every
    /// participant. The true outcome may need explicit recovery to determine.
    Staging,
    /// Committed; final.
    Committed,
    /// Aborted; final.
    Aborted,
}

impl TransactionStatus {
    /// Returns `true` for `Committed` and `Aborted`.
    pub fn is_finalized(self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }

    /// Returns `true` if a record in this status may move to `next` without
    /// an epoch change. Statuses only move forward: a pending record may take
    /// any status, a staging one only a final status, a final one none.
    pub fn can_advance_to(self, next: TransactionStatus) -> bool {
        match self {
            Self::Pending => true,
            Self::Staging => next.is_finalized(),
            Self::Committed | Self::Aborted => false,
        }
    }

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Staging => "STAGING",
            Self::Committed => "COMMITTED",
            Self::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transaction record.
///
/// Zero values mean "unset" for every field; [`Transaction::update`] relies on
/// that when folding one copy into another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxnId,
    pub name: String,
    /// Anchor key where the transaction record lives.
    pub key: Key,
    /// Retry generation; bumped on every restart.
    pub epoch: u32,
    pub status: TransactionStatus,
    /// Provisional commit timestamp.
    pub timestamp: Timestamp,
    /// Timestamp the current epoch started reading at.
    pub orig_timestamp: Timestamp,
    /// Upper bound of the uncertainty interval.
    pub max_timestamp: Timestamp,
    pub priority: i32,
    pub sequence: i32,
    /// Clock readings per visited node, kept sorted by node.
    pub observed_timestamps: Vec<ObservedTimestamp>,
}

impl Transaction {
    /// Creates a pending transaction starting at `now` with an uncertainty
    /// window of `max_offset_nanos`.
    pub fn new(name: impl Into<String>, key: impl Into<Key>, now: Timestamp, max_offset_nanos: i64) -> Self {
        Self {
            id: TxnId::new_random(),
            name: name.into(),
            key: key.into(),
            timestamp: now,
            orig_timestamp: now,
            max_timestamp: Timestamp::new(now.wall_time.saturating_add(max_offset_nanos), now.logical),
            ..Self::default()
        }
    }

    /// Records the clock reading of `node_id`, keeping the earliest reading
    /// per node. Returns the timestamp now on record for that node.
    pub fn update_observed_timestamp(&mut self, node_id: NodeId, timestamp: Timestamp) -> Timestamp {
        match self
            .observed_timestamps
            .binary_search_by_key(&node_id, |ot| ot.node_id)
        {
            Ok(i) => {
                let existing = &mut self.observed_timestamps[i];
                if timestamp < existing.timestamp {
                    existing.timestamp = timestamp;
                }
                existing.timestamp
            }
            Err(i) => {
                self.observed_timestamps
                    .insert(i, ObservedTimestamp { node_id, timestamp });
                timestamp
            }
        }
    }

    /// Returns the recorded clock reading for `node_id`, if any.
    pub fn observed_timestamp(&self, node_id: NodeId) -> Option<Timestamp> {
        self.observed_timestamps
            .binary_search_by_key(&node_id, |ot| ot.node_id)
            .ok()
            .map(|i| self.observed_timestamps[i].timestamp)
    }

    /// Folds a possibly more advanced copy of the same transaction into `self`.
    ///
    /// Fields set on `other` win; fields unset on `other` keep the value
    /// already held. Counters and timestamps only ratchet forward, so progress
    /// recorded by either copy survives. The status of a newer epoch replaces
    /// the held one; within the same epoch it only moves forward (see
    /// [`TransactionStatus::can_advance_to`]); an older epoch's status is
    /// ignored. An uninitialized `self` (nil id) becomes a clone of `other`.
    pub fn update(&mut self, other: &Transaction) {
        if self.id.is_nil() {
            *self = other.clone();
            return;
        }
        if !other.name.is_empty() {
            self.name.clone_from(&other.name);
        }
        if !other.key.is_empty() {
            self.key.clone_from(&other.key);
        }
        if other.epoch > self.epoch
            || (other.epoch == self.epoch && self.status.can_advance_to(other.status))
        {
            self.status = other.status;
        }
        self.epoch = self.epoch.max(other.epoch);
        self.timestamp.forward(other.timestamp);
        self.orig_timestamp.forward(other.orig_timestamp);
        self.max_timestamp.forward(other.max_timestamp);
        self.priority = self.priority.max(other.priority);
        self.sequence = self.sequence.max(other.sequence);
        for ot in &other.observed_timestamps {
            self.update_observed_timestamp(ot.node_id, ot.timestamp);
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.name.is_empty() {
            write!(f, "{:?} ", self.name)?;
        }
        write!(
            f,
            "id={} key={} pri={} stat={} epo={} ts={} orig={} max={} seq={}",
            self.id.short(),
            self.key,
            self.priority,
            self.status,
            self.epoch,
            self.timestamp,
            self.orig_timestamp,
            self.max_timestamp,
            self.sequence
        )
    }
}
