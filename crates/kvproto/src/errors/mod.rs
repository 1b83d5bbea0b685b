//! Error envelope, detail variants, and retry classification.
//!
//! Every failure produced below the SQL layer travels as an [`Error`]
//! envelope. The envelope carries a rendered message, an optional snapshot of
//! the transaction that was in flight, the failed request's batch index, and
//! at most one structured [`ErrorDetail`]. The detail declares how the failure
//! must be handled through the [`DetailSource`] capabilities:
//!
//! - [`TransactionRestart`]: whether the coordinator must restart the
//!   transaction at a bumped epoch, and how urgently.
//! - client-visible retry: the whole client operation can be transparently
//!   restarted with a new transaction.
//! - client-visible ambiguous: the outcome is unknown and the operation must
//!   not be blindly retried.
//!
//! Code that leaves protocol-aware error handling converts an envelope with
//! [`Error::into_plain`]. A restart-classified envelope always becomes an
//! [`UnhandledRetryableError`] so it cannot be mistaken for a terminal error.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod details;
mod envelope;
mod plain;

pub use details::{ErrorDetail, UnionMember};
pub use envelope::{DetailRef, ErrPosition, Error, InternalError, UnstructuredError};
pub use plain::{PlainError, UnhandledRetryableError};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// How a transaction coordinator must react to an error.
///
/// Only [`TransactionRestart::Immediate`] is declared by any detail today.
/// `Backoff` is part of the wire enumeration so that an envelope from a node
/// that uses it still decodes and still converts to an
/// [`UnhandledRetryableError`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionRestart {
    /// No restart; the error is handled by whatever layer understands it.
    #[default]
    None,
    /// Restart at a bumped epoch after backing off.
    Backoff,
    /// Restart at a bumped epoch right away.
    Immediate,
}

impl TransactionRestart {
    /// Returns `true` for every value other than [`TransactionRestart::None`].
    pub fn requires_restart(self) -> bool {
        self != Self::None
    }

    /// Wire name of the classification.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Backoff => "BACKOFF",
            Self::Immediate => "IMMEDIATE",
        }
    }
}

impl fmt::Display for TransactionRestart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse handling category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Transient; the transaction restarts at a bumped epoch.
    Restart,
    /// The client operation restarts with a fresh transaction.
    ClientVisibleRetry,
    /// Outcome undetermined; persisted state must be inspected first.
    ClientVisibleAmbiguous,
    /// Request reached the wrong replica, range, store, or node.
    Routing,
    /// Conflicting or invalid data; the request itself cannot succeed as is.
    Conflict,
    /// Nothing the caller can retry its way out of.
    Terminal,
}

// ---------------------------------------------------------------------------
// Detail capability contract
// ---------------------------------------------------------------------------

/// Capabilities every failure placed into an [`Error`] must provide.
///
/// All members of [`ErrorDetail`] implement this, as do [`DetailRef`],
/// [`InternalError`] and [`UnstructuredError`]. Types outside the closed
/// union may implement it too; they then travel as raw text only, and must
/// not declare a restart classification.
pub trait DetailSource: fmt::Display {
    /// Renders the message for this failure inside `envelope`.
    ///
    /// Formatters that name the in-flight transaction read it from the
    /// envelope; `None` means "no envelope yet".
    fn message(&self, envelope: Option<&Error>) -> String {
        let _ = envelope;
        self.to_string()
    }

    fn transaction_restart(&self) -> TransactionRestart {
        TransactionRestart::None
    }

    /// Safe and necessary to restart the whole client operation transparently.
    fn is_client_visible_retry(&self) -> bool {
        false
    }

    /// The operation's outcome is unknown; do not retry blindly.
    fn is_client_visible_ambiguous(&self) -> bool {
        false
    }

    /// Hands the failure over to the envelope's union slot.
    fn into_union(self) -> UnionSlot
    where
        Self: Sized;
}

/// What a [`DetailSource`] turns into when stored in an envelope.
#[derive(Debug)]
pub enum UnionSlot {
    /// A member of the closed detail union.
    Detail(ErrorDetail),
    /// A complete envelope passed back through; it replaces the target as is.
    Envelope(Error),
    /// The failure has no structured representation; only its text survives.
    Unrepresentable,
}

// ---------------------------------------------------------------------------
// Contract violations
// ---------------------------------------------------------------------------

/// Programming errors detected while building envelopes or details.
///
/// These are never retryable. The `try_*` constructors return them; the
/// plain constructors panic with their text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// An envelope was requested for a failure that does not exist.
    #[error("cannot build an error envelope from an absent failure")]
    MissingFailure,

    /// A failure declared a restart classification but cannot be stored in
    /// the detail union, so the classification would be lost on the next hop.
    #[error("{detail_type} declares transaction restart {restart} but is not an error detail")]
    UnrepresentableRestartDetail {
        detail_type: &'static str,
        restart: TransactionRestart,
    },

    /// A failure declared one restart classification but stored a union
    /// member that declares another.
    #[error("{detail_type} declares transaction restart {declared} but stores {stored_type} with restart {stored}")]
    MismatchedRestartDetail {
        detail_type: &'static str,
        declared: TransactionRestart,
        stored_type: &'static str,
        stored: TransactionRestart,
    },

    /// A range descriptor without keys was about to be returned to a client.
    #[error("descriptor is not initialized: {descriptor}")]
    UninitializedRangeDescriptor { descriptor: String },
}

/// Text used when a response unexpectedly carries an error.
pub fn error_unexpectedly_set<C, R: fmt::Debug>(culprit: &C, response: &R) -> String {
    let _ = culprit;
    format!(
        "error is unexpectedly set, culprit is {}:\n{:#?}",
        std::any::type_name::<C>(),
        response
    )
}
