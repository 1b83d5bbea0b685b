//! Conversion of envelopes into ordinary Rust errors.

use serde::{Deserialize, Serialize};

use super::{DetailSource, Error, ErrorDetail, InternalError, TransactionRestart};

/// A restart-classified error that reached code which cannot restart the
/// transaction.
///
/// Carries the whole envelope so the caller that can handle the restart
/// still sees the transaction and detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{}", .error.message())]
pub struct UnhandledRetryableError {
    pub error: Error,
}

/// An envelope reduced to a standard error value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum PlainError {
    /// The envelope required a transaction restart.
    #[error(transparent)]
    UnhandledRetryable(UnhandledRetryableError),

    /// The structured detail, without the envelope.
    #[error(transparent)]
    Detail(ErrorDetail),

    /// An envelope with no structured detail.
    #[error(transparent)]
    Internal(InternalError),
}

impl PlainError {
    pub fn is_unhandled_retryable(&self) -> bool {
        matches!(self, Self::UnhandledRetryable(_))
    }

    pub fn as_unhandled_retryable(&self) -> Option<&UnhandledRetryableError> {
        match self {
            Self::UnhandledRetryable(err) => Some(err),
            _ => None,
        }
    }

    /// Restart classification of the underlying failure.
    pub fn transaction_restart(&self) -> TransactionRestart {
        match self {
            Self::UnhandledRetryable(err) => err.error.transaction_restart(),
            Self::Detail(detail) => detail.transaction_restart(),
            Self::Internal(err) => err.envelope().transaction_restart(),
        }
    }
}

impl Error {
    /// Converts the envelope into a [`PlainError`].
    ///
    /// Anything restart-classified becomes [`PlainError::UnhandledRetryable`]
    /// regardless of its detail. Otherwise the detail is returned bare, or the
    /// envelope is wrapped as [`InternalError`] when there is none.
    pub fn into_plain(self) -> PlainError {
        if self.transaction_restart().requires_restart() {
            return PlainError::UnhandledRetryable(UnhandledRetryableError { error: self });
        }
        match self.detail().known() {
            Some(detail) => PlainError::Detail(detail.clone()),
            None => PlainError::Internal(InternalError::new(self)),
        }
    }

    /// As [`Error::into_plain`], leaving `self` intact.
    pub fn to_plain(&self) -> PlainError {
        self.clone().into_plain()
    }
}

impl From<Error> for PlainError {
    fn from(err: Error) -> Self {
        err.into_plain()
    }
}
