//! Details that force the transaction to restart at a bumped epoch.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{envelope_txn, OrNil};
use crate::errors::{DetailSource, Error, TransactionRestart, UnionSlot};
use crate::{ObservedTimestamp, Timestamp, Transaction};

// ---------------------------------------------------------------------------
// Transaction aborted
// ---------------------------------------------------------------------------

/// Why a transaction was found aborted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionAbortedReason {
    #[default]
    Unknown,
    /// The transaction record was found in the ABORTED state.
    AbortedRecordFound,
    /// The client asked for the abort.
    ClientReject,
    /// A pusher aborted the transaction.
    PusherAborted,
    /// The abort span of a range recorded the transaction as aborted.
    AbortSpan,
    /// A request arrived after the record was finalized; possibly a replay.
    AlreadyCommittedOrRolledBackPossibleReplay,
    /// The timestamp cache rejected creation of the record; possibly a replay.
    TimestampCacheRejectedPossibleReplay,
    /// A new lease prevents the record from being created.
    NewLeasePreventsTxn,
}

impl TransactionAbortedReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "ABORT_REASON_UNKNOWN",
            Self::AbortedRecordFound => "ABORT_REASON_ABORTED_RECORD_FOUND",
            Self::ClientReject => "ABORT_REASON_CLIENT_REJECT",
            Self::PusherAborted => "ABORT_REASON_PUSHER_ABORTED",
            Self::AbortSpan => "ABORT_REASON_ABORT_SPAN",
            Self::AlreadyCommittedOrRolledBackPossibleReplay => {
                "ABORT_REASON_ALREADY_COMMITTED_OR_ROLLED_BACK_POSSIBLE_REPLAY"
            }
            Self::TimestampCacheRejectedPossibleReplay => {
                "ABORT_REASON_TIMESTAMP_CACHE_REJECTED_POSSIBLE_REPLAY"
            }
            Self::NewLeasePreventsTxn => "ABORT_REASON_NEW_LEASE_PREVENTS_TXN",
        }
    }
}

impl fmt::Display for TransactionAbortedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transaction was aborted by another party and must start over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionAbortedError {
    /// Why the transaction was aborted.
    pub reason: TransactionAbortedReason,
}

impl TransactionAbortedError {
    pub fn new(reason: TransactionAbortedReason) -> Self {
        Self { reason }
    }
}

impl fmt::Display for TransactionAbortedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionAbortedError({})", self.reason)
    }
}

impl DetailSource for TransactionAbortedError {
    fn message(&self, envelope: Option<&Error>) -> String {
        format!("{self}: {}", envelope_txn(envelope))
    }

    fn transaction_restart(&self) -> TransactionRestart {
        TransactionRestart::Immediate
    }

    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

// ---------------------------------------------------------------------------
// Transaction push failed
// ---------------------------------------------------------------------------

/// The transaction failed to push a conflicting transaction out of its way.
///
/// The envelope's transaction may carry an increased priority for the retry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPushError {
    /// The transaction that could not be pushed.
    pub pushee_txn: Transaction,
}

impl TransactionPushError {
    pub fn new(pushee_txn: Transaction) -> Self {
        Self { pushee_txn }
    }
}

impl fmt::Display for TransactionPushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to push {}", self.pushee_txn)
    }
}

impl DetailSource for TransactionPushError {
    fn message(&self, envelope: Option<&Error>) -> String {
        match envelope.and_then(Error::txn) {
            Some(txn) => format!("txn {txn} {self}"),
            None => self.to_string(),
        }
    }

    fn transaction_restart(&self) -> TransactionRestart {
        TransactionRestart::Immediate
    }

    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

// ---------------------------------------------------------------------------
// Generic transaction retry
// ---------------------------------------------------------------------------

/// Why a transaction must retry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionRetryReason {
    #[default]
    Unknown,
    /// A write was pushed above its original timestamp by a newer value.
    WriteTooOld,
    /// A range deletion ran at a pushed timestamp.
    DeleteRange,
    /// A serializable transaction's timestamp was pushed and refresh failed.
    Serializable,
    /// A batch may have been replayed.
    PossibleReplay,
    /// An asynchronously pipelined write failed to land.
    AsyncWriteFailure,
    /// The commit deadline passed before the commit timestamp.
    CommitDeadlineExceeded,
}

impl TransactionRetryReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "RETRY_REASON_UNKNOWN",
            Self::WriteTooOld => "RETRY_WRITE_TOO_OLD",
            Self::DeleteRange => "RETRY_DELETE_RANGE",
            Self::Serializable => "RETRY_SERIALIZABLE",
            Self::PossibleReplay => "RETRY_POSSIBLE_REPLAY",
            Self::AsyncWriteFailure => "RETRY_ASYNC_WRITE_FAILURE",
            Self::CommitDeadlineExceeded => "RETRY_COMMIT_DEADLINE_EXCEEDED",
        }
    }
}

impl fmt::Display for TransactionRetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transaction must retry at a bumped epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRetryError {
    /// Why the transaction must retry.
    pub reason: TransactionRetryReason,
    /// Free-form context appended to the reason; may be empty.
    pub extra_msg: String,
}

impl TransactionRetryError {
    pub fn new(reason: TransactionRetryReason, extra_msg: impl Into<String>) -> Self {
        Self {
            reason,
            extra_msg: extra_msg.into(),
        }
    }
}

impl fmt::Display for TransactionRetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionRetryError: retry txn ({}", self.reason)?;
        if !self.extra_msg.is_empty() {
            write!(f, " - {}", self.extra_msg)?;
        }
        f.write_str(")")
    }
}

impl DetailSource for TransactionRetryError {
    fn message(&self, envelope: Option<&Error>) -> String {
        format!("{self}: {}", envelope_txn(envelope))
    }

    fn transaction_restart(&self) -> TransactionRestart {
        TransactionRestart::Immediate
    }

    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

// ---------------------------------------------------------------------------
// Write too old
// ---------------------------------------------------------------------------

/// A write found a committed value at or above its own timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteTooOldError {
    /// Timestamp the write was attempted at.
    pub timestamp: Timestamp,
    /// Timestamp the write would have to move to.
    pub actual_timestamp: Timestamp,
}

impl WriteTooOldError {
    pub fn new(timestamp: Timestamp, actual_timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            actual_timestamp,
        }
    }
}

impl fmt::Display for WriteTooOldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WriteTooOldError: write at timestamp {} too old; wrote at {}",
            self.timestamp, self.actual_timestamp
        )
    }
}

impl DetailSource for WriteTooOldError {
    fn transaction_restart(&self) -> TransactionRestart {
        TransactionRestart::Immediate
    }

    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

// ---------------------------------------------------------------------------
// Read within uncertainty interval
// ---------------------------------------------------------------------------

/// A read found a value above its timestamp but inside the uncertainty
/// window, so it cannot tell whether the write happened before it.
///
/// The observed timestamps let the retry skip uncertainty against nodes whose
/// clock reading is already known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadWithinUncertaintyIntervalError {
    /// Timestamp the read was performed at.
    pub read_timestamp: Timestamp,
    /// Timestamp of the value found inside the uncertainty window.
    pub existing_timestamp: Timestamp,
    /// The reader's uncertainty limit at the time of the read.
    pub max_timestamp: Option<Timestamp>,
    pub observed_timestamps: Vec<ObservedTimestamp>,
}

impl ReadWithinUncertaintyIntervalError {
    /// Captures the uncertainty facts at the moment of the read.
    ///
    /// The max timestamp and observed timestamps are copied out of `txn`
    /// now; later changes to the transaction do not affect this error.
    pub fn new(read_timestamp: Timestamp, existing_timestamp: Timestamp, txn: Option<&Transaction>) -> Self {
        Self {
            read_timestamp,
            existing_timestamp,
            max_timestamp: txn.map(|t| t.max_timestamp),
            observed_timestamps: txn.map(|t| t.observed_timestamps.clone()).unwrap_or_default(),
        }
    }
}

impl fmt::Display for ReadWithinUncertaintyIntervalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut observed = self.observed_timestamps.clone();
        observed.sort_by_key(|ot| ot.node_id);

        write!(
            f,
            "ReadWithinUncertaintyIntervalError: read at time {} encountered previous write \
             with future timestamp {} within uncertainty interval `t <= {}`; observed timestamps: [",
            self.read_timestamp,
            self.existing_timestamp,
            OrNil(self.max_timestamp.as_ref())
        )?;
        for (i, ot) in observed.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{{{} {}}}", ot.node_id, ot.timestamp)?;
        }
        f.write_str("]")
    }
}

impl DetailSource for ReadWithinUncertaintyIntervalError {
    fn transaction_restart(&self) -> TransactionRestart {
        TransactionRestart::Immediate
    }

    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}
