//! The [`Error`] envelope and its raw-text fallbacks.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::details::{deserialize_lenient, UnionMember};
use super::{DetailSource, ErrorDetail, ProtocolViolation, TransactionRestart, UnionSlot};
use crate::Transaction;

/// Position of the failed request within its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrPosition {
    /// Zero-based index of the request within the batch.
    pub index: i32,
}

/// An error as exchanged between nodes and between the storage and SQL layers.
///
/// Built once where the failure is recognized. Afterwards only two mutations
/// are expected, both by the owner of the return path: attaching or merging
/// the transaction ([`Error::update_txn`], [`Error::set_txn`]) and stamping
/// the failed request index ([`Error::set_error_index`]).
///
/// The transaction snapshot is always a clone, so later changes to the live
/// transaction never show through an envelope already handed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Error {
    message: String,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    detail: Option<ErrorDetail>,
    #[serde(default)]
    txn: Option<Transaction>,
    #[serde(default)]
    transaction_restart: TransactionRestart,
    #[serde(default)]
    index: Option<ErrPosition>,
}

impl Error {
    fn empty() -> Self {
        Self {
            message: String::new(),
            detail: None,
            txn: None,
            transaction_restart: TransactionRestart::None,
            index: None,
        }
    }

    /// Builds an envelope around `detail`.
    ///
    /// # Panics
    ///
    /// Panics if `detail` declares a restart classification but cannot be
    /// stored in the detail union. See [`Error::try_new`].
    pub fn new<D: DetailSource>(detail: D) -> Self {
        match Self::try_new(detail) {
            Ok(err) => err,
            Err(violation) => panic!("{violation}"),
        }
    }

    /// Builds an envelope around `detail`, reporting contract violations.
    pub fn try_new<D: DetailSource>(detail: D) -> Result<Self, ProtocolViolation> {
        let mut err = Self::empty();
        err.try_set_detail(detail)?;
        Ok(err)
    }

    /// Builds an envelope from a failure that may be absent.
    ///
    /// An absent failure is a caller bug: there is no envelope for "no error".
    pub fn try_from_failure<D: DetailSource>(failure: Option<D>) -> Result<Self, ProtocolViolation> {
        match failure {
            Some(detail) => Self::try_new(detail),
            None => {
                tracing::error!("error envelope requested without a failure");
                Err(ProtocolViolation::MissingFailure)
            }
        }
    }

    /// Builds an envelope around `detail` and attaches a clone of `txn`.
    ///
    /// # Panics
    ///
    /// As [`Error::new`].
    pub fn with_txn<D: DetailSource>(detail: D, txn: Option<&Transaction>) -> Self {
        let mut err = Self::new(detail);
        err.set_txn(txn);
        err
    }

    /// Builds an unstructured envelope from any standard error.
    pub fn from_std(err: &dyn std::error::Error) -> Self {
        Self::new(UnstructuredError::from_error(err))
    }

    /// Builds an unstructured envelope whose message is prefixed with the
    /// caller's `file:line`. Usually reached through [`crate::errorf!`].
    #[track_caller]
    pub fn with_location(message: impl fmt::Display) -> Self {
        let location = std::panic::Location::caller();
        Self::new(UnstructuredError::new(format!(
            "{}:{}: {message}",
            location.file(),
            location.line()
        )))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The rendered message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// How the coordinator must react to this error.
    pub fn transaction_restart(&self) -> TransactionRestart {
        self.transaction_restart
    }

    /// The attached transaction snapshot, if any.
    pub fn txn(&self) -> Option<&Transaction> {
        self.txn.as_ref()
    }

    /// Index of the failed request within its batch, if stamped.
    pub fn index(&self) -> Option<i32> {
        self.index.map(|p| p.index)
    }

    /// The detail, or the raw-message fallback if the envelope carries none.
    pub fn detail(&self) -> DetailRef<'_> {
        match &self.detail {
            Some(detail) => DetailRef::Known(detail),
            None => DetailRef::Unknown(self),
        }
    }

    /// The detail as a concrete type, if it is one.
    pub fn detail_as<T: UnionMember>(&self) -> Option<&T> {
        self.detail.as_ref().and_then(T::from_detail)
    }

    pub fn is_client_visible_retry(&self) -> bool {
        self.detail().is_client_visible_retry()
    }

    pub fn is_client_visible_ambiguous(&self) -> bool {
        self.detail().is_client_visible_ambiguous()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Replaces the detail.
    ///
    /// # Panics
    ///
    /// As [`Error::new`].
    pub fn set_detail<D: DetailSource>(&mut self, detail: D) {
        if let Err(violation) = self.try_set_detail(detail) {
            panic!("{violation}");
        }
    }

    /// Replaces the detail, rendering its message against this envelope.
    ///
    /// A detail outside the union keeps only its text, and only if it does
    /// not declare a restart classification. An [`InternalError`] replaces
    /// the whole envelope with the one it wraps. On error `self` is left
    /// unchanged.
    pub fn try_set_detail<D: DetailSource>(&mut self, detail: D) -> Result<(), ProtocolViolation> {
        let message = detail.message(Some(&*self));
        let restart = detail.transaction_restart();
        match detail.into_union() {
            UnionSlot::Envelope(envelope) => *self = envelope,
            UnionSlot::Detail(detail) => {
                let stored = detail.transaction_restart();
                if stored != restart {
                    let violation = ProtocolViolation::MismatchedRestartDetail {
                        detail_type: std::any::type_name::<D>(),
                        declared: restart,
                        stored_type: detail.type_name(),
                        stored,
                    };
                    tracing::error!(%violation, "refusing a detail whose restart classification would change");
                    return Err(violation);
                }
                self.message = message;
                self.transaction_restart = stored;
                self.detail = Some(detail);
            }
            UnionSlot::Unrepresentable => {
                let detail_type = std::any::type_name::<D>();
                if restart.requires_restart() {
                    let violation = ProtocolViolation::UnrepresentableRestartDetail { detail_type, restart };
                    tracing::error!(%violation, "refusing to drop a restart classification");
                    return Err(violation);
                }
                tracing::debug!(detail_type, "error detail kept as message only");
                self.message = message;
                self.transaction_restart = TransactionRestart::None;
                self.detail = None;
            }
        }
        Ok(())
    }

    /// Replaces the transaction snapshot with a clone of `txn` (or clears it)
    /// and re-renders the message.
    pub fn set_txn(&mut self, txn: Option<&Transaction>) {
        self.txn = txn.cloned();
        self.refresh_message();
    }

    /// Folds `txn` into the snapshot and re-renders the message.
    ///
    /// The first transaction is cloned in. Later ones are merged with
    /// [`Transaction::update`], so progress recorded by an earlier copy is
    /// kept. `None` is a no-op.
    pub fn update_txn(&mut self, txn: Option<&Transaction>) {
        let Some(other) = txn else {
            return;
        };
        match &mut self.txn {
            Some(existing) => {
                existing.update(other);
                tracing::trace!(txn_id = %existing.id, epoch = existing.epoch, "merged transaction into error");
            }
            None => self.txn = Some(other.clone()),
        }
        self.refresh_message();
    }

    pub fn set_error_index(&mut self, index: i32) {
        self.index = Some(ErrPosition { index });
    }

    fn refresh_message(&mut self) {
        let message = self.detail.as_ref().map(|d| d.message(Some(self)));
        if let Some(message) = message {
            self.message = message;
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// ---------------------------------------------------------------------------
// Extracted detail
// ---------------------------------------------------------------------------

/// What [`Error::detail`] returns: the structured detail, or the envelope
/// itself standing in for a detail that did not survive.
///
/// Both answer the same [`DetailSource`] questions, so callers need not care
/// which one they got.
#[derive(Debug, Clone, Copy)]
pub enum DetailRef<'a> {
    Known(&'a ErrorDetail),
    Unknown(&'a Error),
}

impl<'a> DetailRef<'a> {
    /// The structured detail, if present.
    pub fn known(self) -> Option<&'a ErrorDetail> {
        match self {
            Self::Known(detail) => Some(detail),
            Self::Unknown(_) => None,
        }
    }
}

impl fmt::Display for DetailRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(detail) => detail.fmt(f),
            Self::Unknown(envelope) => f.write_str(envelope.message()),
        }
    }
}

impl DetailSource for DetailRef<'_> {
    fn message(&self, envelope: Option<&Error>) -> String {
        match self {
            Self::Known(detail) => detail.message(envelope),
            Self::Unknown(own) => own.message.clone(),
        }
    }

    fn transaction_restart(&self) -> TransactionRestart {
        match self {
            Self::Known(detail) => detail.transaction_restart(),
            Self::Unknown(own) => own.transaction_restart,
        }
    }

    fn is_client_visible_retry(&self) -> bool {
        match self {
            Self::Known(detail) => detail.is_client_visible_retry(),
            Self::Unknown(_) => false,
        }
    }

    fn is_client_visible_ambiguous(&self) -> bool {
        match self {
            Self::Known(detail) => detail.is_client_visible_ambiguous(),
            Self::Unknown(_) => false,
        }
    }

    fn into_union(self) -> UnionSlot {
        match self {
            Self::Known(detail) => UnionSlot::Detail(detail.clone()),
            Self::Unknown(own) => UnionSlot::Envelope(own.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw-text fallbacks
// ---------------------------------------------------------------------------

/// An envelope without a structured detail, viewed as a plain error.
///
/// Passing it back into [`Error::set_detail`] restores the envelope as it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(transparent)]
#[error("{}", .0.message())]
pub struct InternalError(Error);

impl InternalError {
    pub fn new(envelope: Error) -> Self {
        Self(envelope)
    }

    pub fn envelope(&self) -> &Error {
        &self.0
    }

    pub fn into_envelope(self) -> Error {
        self.0
    }
}

impl DetailSource for InternalError {
    fn message(&self, _envelope: Option<&Error>) -> String {
        self.0.message.clone()
    }

    fn transaction_restart(&self) -> TransactionRestart {
        self.0.transaction_restart
    }

    fn into_union(self) -> UnionSlot {
        UnionSlot::Envelope(self.0)
    }
}

/// A failure with no structured representation; only its text travels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct UnstructuredError {
    pub message: String,
}

impl UnstructuredError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn from_error(err: &dyn std::error::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl DetailSource for UnstructuredError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Unrepresentable
    }
}

/// Builds an unstructured [`Error`] from format arguments, prefixed with the
/// caller's `file:line`.
#[macro_export]
macro_rules! errorf {
    ($($arg:tt)*) => {
        $crate::Error::with_location(::std::format!($($arg)*))
    };
}
