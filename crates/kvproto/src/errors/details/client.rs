//! Details visible to clients: transparent retry and ambiguous outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{DetailSource, Error, UnionSlot};
use crate::{Transaction, TxnId};

/// The client must restart the operation using the carried transaction.
///
/// Produced by the coordinator after it handled a restart-classified error;
/// `transaction` is the record the next attempt should use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRetryWithProtoRefreshError {
    /// Message of the error that caused the restart.
    pub msg: String,
    /// The transaction that was restarted.
    pub txn_id: TxnId,
    /// The transaction to use for the next attempt.
    pub transaction: Transaction,
}

impl TransactionRetryWithProtoRefreshError {
    pub fn new(msg: impl Into<String>, txn_id: TxnId, transaction: Transaction) -> Self {
        Self {
            msg: msg.into(),
            txn_id,
            transaction,
        }
    }

    /// Returns `true` if the restarted transaction was aborted, in which case
    /// the client needs a brand new transaction rather than a bumped epoch.
    pub fn prev_txn_aborted(&self) -> bool {
        self.txn_id != self.transaction.id
    }
}

impl fmt::Display for TransactionRetryWithProtoRefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionRetryWithProtoRefreshError: {}", self.msg)
    }
}

impl DetailSource for TransactionRetryWithProtoRefreshError {
    fn is_client_visible_retry(&self) -> bool {
        true
    }

    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

/// The request may or may not have been applied.
///
/// Typical causes are a lost connection after sending a commit or a replica
/// being removed while a command was in flight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousResultError {
    /// What made the outcome unknown.
    pub message: String,
}

impl AmbiguousResultError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for AmbiguousResultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "result is ambiguous ({})", self.message)
    }
}

impl DetailSource for AmbiguousResultError {
    fn is_client_visible_ambiguous(&self) -> bool {
        true
    }

    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

/// A transaction record was found STAGING and its outcome cannot be decided
/// from local information.
///
/// Unlike [`AmbiguousResultError`], resolving this requires running status
/// recovery against every in-flight write of `staging_txn`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndeterminateCommitError {
    /// The transaction record found in the STAGING state.
    pub staging_txn: Transaction,
}

impl IndeterminateCommitError {
    pub fn new(staging_txn: Transaction) -> Self {
        Self { staging_txn }
    }
}

impl fmt::Display for IndeterminateCommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "found txn in indeterminate STAGING state {}", self.staging_txn)
    }
}

impl DetailSource for IndeterminateCommitError {
    fn message(&self, envelope: Option<&Error>) -> String {
        match envelope.and_then(Error::txn) {
            Some(txn) => format!("txn {txn} {self}"),
            None => self.to_string(),
        }
    }

    fn is_client_visible_ambiguous(&self) -> bool {
        true
    }

    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}
