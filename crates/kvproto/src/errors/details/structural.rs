//! Terminal and structural details: the request cannot succeed by retrying
//! the transaction.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{deserialize_lenient, envelope_txn, ErrorDetail};
use crate::errors::{DetailSource, Error, UnionSlot};
use crate::Timestamp;

// ---------------------------------------------------------------------------
// Replica state
// ---------------------------------------------------------------------------

/// The replica detected corruption of its own data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaCorruptionError {
    pub error_msg: String,
    /// Whether the corruption has already been handled by the store.
    pub processed: bool,
}

impl ReplicaCorruptionError {
    /// Records the text of the error that revealed the corruption.
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        Self {
            error_msg: err.to_string(),
            processed: false,
        }
    }
}

impl fmt::Display for ReplicaCorruptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "replica corruption (processed={})", self.processed)?;
        if !self.error_msg.is_empty() {
            write!(f, ": {}", self.error_msg)?;
        }
        Ok(())
    }
}

impl DetailSource for ReplicaCorruptionError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

/// The replica's raft group was removed while the request was in flight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaftGroupDeletedError;

impl fmt::Display for RaftGroupDeletedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("raft group deleted")
    }
}

impl DetailSource for RaftGroupDeletedError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

/// The range is being merged into its left neighbour; requests must wait
/// for the merge to finish and then be re-addressed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeInProgressError;

impl fmt::Display for MergeInProgressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("merge in progress")
    }
}

impl DetailSource for MergeInProgressError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

// ---------------------------------------------------------------------------
// Transaction misuse
// ---------------------------------------------------------------------------

/// The transaction already failed and cannot be used anymore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnAlreadyEncounteredError {
    /// Text of the error that poisoned the transaction.
    pub prev_error: String,
}

impl TxnAlreadyEncounteredError {
    pub fn new(prev_error: impl Into<String>) -> Self {
        Self {
            prev_error: prev_error.into(),
        }
    }
}

impl fmt::Display for TxnAlreadyEncounteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "txn already encountered an error; cannot be used anymore (previous err: {})",
            self.prev_error
        )
    }
}

impl DetailSource for TxnAlreadyEncounteredError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

/// Why a [`TransactionStatusError`] was raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatusReason {
    /// No specific reason recorded.
    #[default]
    ReasonUnknown,
    /// The transaction record was already committed.
    ReasonTxnCommitted,
}

impl TransactionStatusReason {
    /// Wire name of the reason.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReasonUnknown => "REASON_UNKNOWN",
            Self::ReasonTxnCommitted => "REASON_TXN_COMMITTED",
        }
    }
}

impl fmt::Display for TransactionStatusReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transaction record is in a state that does not permit the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatusError {
    pub msg: String,
    pub reason: TransactionStatusReason,
}

impl TransactionStatusError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            reason: TransactionStatusReason::ReasonUnknown,
        }
    }

    /// The record was found already committed.
    pub fn committed() -> Self {
        Self {
            msg: "already committed".to_owned(),
            reason: TransactionStatusReason::ReasonTxnCommitted,
        }
    }
}

impl fmt::Display for TransactionStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionStatusError: {} ({})", self.msg, self.reason)
    }
}

impl DetailSource for TransactionStatusError {
    fn message(&self, envelope: Option<&Error>) -> String {
        format!("{self}: {}", envelope_txn(envelope))
    }

    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

/// A request that only makes sense inside a transaction arrived without one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpRequiresTxnError;

impl fmt::Display for OpRequiresTxnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("the operation requires transactional context")
    }
}

impl DetailSource for OpRequiresTxnError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

// ---------------------------------------------------------------------------
// Request shape and transport
// ---------------------------------------------------------------------------

/// The receiving node does not implement the request type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsupportedRequestError;

impl fmt::Display for UnsupportedRequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unsupported request")
    }
}

impl DetailSource for UnsupportedRequestError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

/// The RPC could not be delivered to any replica.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendError {
    pub message: String,
}

impl SendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to send RPC: {}", self.message)
    }
}

impl DetailSource for SendError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

/// The batch reads below the replica's garbage-collection threshold, where
/// history has already been discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTimestampBeforeGcError {
    pub timestamp: Timestamp,
    pub threshold: Timestamp,
}

impl BatchTimestampBeforeGcError {
    pub fn new(timestamp: Timestamp, threshold: Timestamp) -> Self {
        Self {
            timestamp,
            threshold,
        }
    }
}

impl fmt::Display for BatchTimestampBeforeGcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch timestamp {} must be after replica GC threshold {}",
            self.timestamp, self.threshold
        )
    }
}

impl DetailSource for BatchTimestampBeforeGcError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

// ---------------------------------------------------------------------------
// Partial batch failure
// ---------------------------------------------------------------------------

/// Part of a batch succeeded before another part failed.
///
/// Holds the cause as a structured detail when it is a union member. The
/// cause's text is always kept too, so a receiver that cannot decode the
/// nested detail still has it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MixedSuccessError {
    #[serde(default, deserialize_with = "deserialize_lenient")]
    wrapped: Option<Box<ErrorDetail>>,
    #[serde(default)]
    wrapped_message: String,
}

impl MixedSuccessError {
    /// Wraps `cause`. Wrapping a `MixedSuccessError` returns it unchanged.
    pub fn wrap<D: DetailSource>(cause: D) -> Self {
        let text = cause.to_string();
        match cause.into_union() {
            UnionSlot::Detail(ErrorDetail::MixedSuccess(already)) => already,
            UnionSlot::Detail(detail) => Self {
                wrapped: Some(Box::new(detail)),
                wrapped_message: text,
            },
            UnionSlot::Envelope(_) | UnionSlot::Unrepresentable => {
                tracing::debug!(cause = %text, "mixed success cause kept as text");
                Self {
                    wrapped: None,
                    wrapped_message: text,
                }
            }
        }
    }

    /// The structured cause, if it survived wrapping.
    pub fn wrapped(&self) -> Option<&ErrorDetail> {
        self.wrapped.as_deref()
    }

    /// Text of the cause, whether or not it is structured.
    pub fn cause_message(&self) -> String {
        match &self.wrapped {
            Some(detail) => detail.to_string(),
            None => self.wrapped_message.clone(),
        }
    }
}

impl fmt::Display for MixedSuccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "the batch experienced mixed success and failure: {}",
            self.cause_message()
        )
    }
}

impl DetailSource for MixedSuccessError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

// ---------------------------------------------------------------------------
// Range feeds
// ---------------------------------------------------------------------------

/// Why a range feed must be re-established.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RangeFeedRetryReason {
    /// The replica serving the feed was removed from the range.
    #[default]
    ReplicaRemoved,
    /// The range split; the feed must be re-opened per child range.
    RangeSplit,
    /// The range was merged into its left neighbour.
    RangeMerged,
    /// A raft snapshot replaced the replica's state, losing the log tail.
    RaftSnapshot,
    /// Logical operations needed to produce events were not logged.
    LogicalOpsMissing,
    /// The consumer fell too far behind the producer.
    SlowConsumer,
}

impl RangeFeedRetryReason {
    /// Wire name of the reason.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReplicaRemoved => "REASON_REPLICA_REMOVED",
            Self::RangeSplit => "REASON_RANGE_SPLIT",
            Self::RangeMerged => "REASON_RANGE_MERGED",
            Self::RaftSnapshot => "REASON_RAFT_SNAPSHOT",
            Self::LogicalOpsMissing => "REASON_LOGICAL_OPS_MISSING",
            Self::SlowConsumer => "REASON_SLOW_CONSUMER",
        }
    }
}

impl fmt::Display for RangeFeedRetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The range feed was disconnected and must be restarted by its consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeFeedRetryError {
    pub reason: RangeFeedRetryReason,
}

impl RangeFeedRetryError {
    pub fn new(reason: RangeFeedRetryReason) -> Self {
        Self { reason }
    }
}

impl fmt::Display for RangeFeedRetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "retry rangefeed ({})", self.reason)
    }
}

impl DetailSource for RangeFeedRetryError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::UnstructuredError;

    #[test]
    fn mixed_success_wrap_is_idempotent() {
        let once = MixedSuccessError::wrap(SendError::new("boom"));
        let twice = MixedSuccessError::wrap(once.clone());
        assert_eq!(twice, once);

        let via_union = MixedSuccessError::wrap(ErrorDetail::from(once.clone()));
        assert_eq!(via_union, once);
    }

    #[test]
    fn mixed_success_keeps_structured_cause() {
        let wrapped = MixedSuccessError::wrap(SendError::new("boom"));
        assert!(matches!(wrapped.wrapped(), Some(ErrorDetail::Send(_))));
        assert_eq!(
            wrapped.to_string(),
            "the batch experienced mixed success and failure: failed to send RPC: boom"
        );
    }

    #[test]
    fn mixed_success_keeps_text_of_unrepresentable_cause() {
        let wrapped = MixedSuccessError::wrap(UnstructuredError::new("disk full"));
        assert!(wrapped.wrapped().is_none());
        assert_eq!(wrapped.cause_message(), "disk full");
        assert_eq!(
            wrapped.to_string(),
            "the batch experienced mixed success and failure: disk full"
        );
    }

    #[test]
    fn mixed_success_with_unknown_nested_cause_keeps_text() {
        let json = serde_json::json!({
            "wrapped": {"future_error": {"detail": 1}},
            "wrapped_message": "something new broke",
        });
        let err: MixedSuccessError = serde_json::from_value(json).unwrap();
        assert!(err.wrapped().is_none());
        assert_eq!(err.cause_message(), "something new broke");
    }

    #[test]
    fn mixed_success_survives_the_wire() {
        let err = MixedSuccessError::wrap(SendError::new("boom"));
        let json = serde_json::to_value(&err).unwrap();
        let back: MixedSuccessError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
        assert!(matches!(back.wrapped(), Some(ErrorDetail::Send(_))));
    }

    #[test]
    fn replica_corruption_from_error() {
        let io = std::io::Error::new(std::io::ErrorKind::InvalidData, "checksum mismatch");
        let err = ReplicaCorruptionError::from_error(&io);
        assert_eq!(err.to_string(), "replica corruption (processed=false): checksum mismatch");
        assert_eq!(ReplicaCorruptionError::default().to_string(), "replica corruption (processed=false)");
    }

    #[test]
    fn transaction_status_committed() {
        let err = TransactionStatusError::committed();
        assert_eq!(err.to_string(), "TransactionStatusError: already committed (REASON_TXN_COMMITTED)");
        assert_eq!(
            err.message(None),
            "TransactionStatusError: already committed (REASON_TXN_COMMITTED): <nil>"
        );
    }

    #[test]
    fn fixed_text_details() {
        assert_eq!(RaftGroupDeletedError.to_string(), "raft group deleted");
        assert_eq!(MergeInProgressError.to_string(), "merge in progress");
        assert_eq!(OpRequiresTxnError.to_string(), "the operation requires transactional context");
        assert_eq!(UnsupportedRequestError.to_string(), "unsupported request");
        assert_eq!(
            RangeFeedRetryError::new(RangeFeedRetryReason::SlowConsumer).to_string(),
            "retry rangefeed (REASON_SLOW_CONSUMER)"
        );
        assert_eq!(
            TxnAlreadyEncounteredError::new("boom").to_string(),
            "txn already encountered an error; cannot be used anymore (previous err: boom)"
        );
        assert_eq!(
            BatchTimestampBeforeGcError::new(Timestamp::new(1, 0), Timestamp::new(2, 0)).to_string(),
            "batch timestamp 0.000000001,0 must be after replica GC threshold 0.000000002,0"
        );
    }
}
