//! The closed union of structured error details.
//!
//! Each variant is its own value type, grouped into submodules by how it is
//! handled. [`ErrorDetail`] is the tagged union an [`Error`] envelope stores;
//! it dispatches the [`DetailSource`] capabilities to the variant it holds.

use std::fmt;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use super::{DetailSource, Error, ErrorClass, TransactionRestart, UnionSlot};

mod client;
mod conflict;
mod restart;
mod routing;
mod structural;

pub use client::{AmbiguousResultError, IndeterminateCommitError, TransactionRetryWithProtoRefreshError};
pub use conflict::{ConditionFailedError, IntegerOverflowError, IntentMissingError, WriteIntentError};
pub use restart::{
    ReadWithinUncertaintyIntervalError, TransactionAbortedError, TransactionAbortedReason,
    TransactionPushError, TransactionRetryError, TransactionRetryReason, WriteTooOldError,
};
pub use routing::{
    LeaseRejectedError, NodeUnavailableError, NotLeaseHolderError, RangeKeyMismatchError,
    RangeNotFoundError, ReplicaTooOldError, StoreNotFoundError,
};
pub use structural::{
    BatchTimestampBeforeGcError, MergeInProgressError, MixedSuccessError, OpRequiresTxnError,
    RaftGroupDeletedError, RangeFeedRetryError, RangeFeedRetryReason, ReplicaCorruptionError,
    SendError, TransactionStatusError, TransactionStatusReason, TxnAlreadyEncounteredError,
    UnsupportedRequestError,
};

/// Typed access to one member of the [`ErrorDetail`] union.
pub trait UnionMember: DetailSource + Sized {
    /// Returns the variant if `detail` holds this type.
    fn from_detail(detail: &ErrorDetail) -> Option<&Self>;
}

/// Renders `Some(v)` as `v` and `None` as `<nil>`.
pub(crate) struct OrNil<'a, T>(pub(crate) Option<&'a T>);

impl<T: fmt::Display> fmt::Display for OrNil<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => v.fmt(f),
            None => f.write_str("<nil>"),
        }
    }
}

/// The transaction attached to `envelope`, if any.
pub(crate) fn envelope_txn(envelope: Option<&Error>) -> OrNil<'_, crate::Transaction> {
    OrNil(envelope.and_then(Error::txn))
}

/// Decodes an optional detail slot, dropping variants this build does not know.
///
/// Used wherever a detail is nested in a wire type, so that a newer node's
/// detail degrades only the slot holding it.
pub(crate) fn deserialize_lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<ErrorDetail>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Known(ErrorDetail),
        Unknown(IgnoredAny),
    }

    Ok(match Option::<Lenient>::deserialize(deserializer)? {
        Some(Lenient::Known(detail)) => Some(T::from(detail)),
        Some(Lenient::Unknown(_)) => {
            tracing::debug!("dropping unrecognized error detail");
            None
        }
        None => None,
    })
}

// ---------------------------------------------------------------------------
// Macro generating the union enum from its member list.
// Generates: enum, From<member>, UnionMember, std::error::Error per member,
// and a dyn view used for capability dispatch.
// ---------------------------------------------------------------------------
macro_rules! detail_union {
    (
        $(#[$attr:meta])*
        pub enum $name:ident {
            $( $(#[$vattr:meta])* $variant:ident($ty:ident), )+
        }
    ) => {
        $(#[$attr])*
        pub enum $name {
            $( $(#[$vattr])* $variant($ty), )+
        }

        impl $name {
            /// Name of the concrete detail type, for logs and assertions.
            pub fn type_name(&self) -> &'static str {
                match self {
                    $( Self::$variant(_) => stringify!($ty), )+
                }
            }

            fn as_dyn(&self) -> &dyn DetailSource {
                match self {
                    $( Self::$variant(d) => d, )+
                }
            }
        }

        $(
            impl From<$ty> for $name {
                fn from(detail: $ty) -> Self {
                    Self::$variant(detail)
                }
            }

            impl UnionMember for $ty {
                fn from_detail(detail: &$name) -> Option<&Self> {
                    match detail {
                        $name::$variant(d) => Some(d),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }

            impl std::error::Error for $ty {}
        )+
    };
}

detail_union! {
    /// One structured failure condition.
    ///
    /// The set is closed: a failure that is not listed here reaches other
    /// nodes only as the envelope's message text.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ErrorDetail {
        NotLeaseHolder(NotLeaseHolderError),
        RangeNotFound(RangeNotFoundError),
        RangeKeyMismatch(RangeKeyMismatchError),
        ReadWithinUncertaintyInterval(ReadWithinUncertaintyIntervalError),
        TransactionAborted(TransactionAbortedError),
        TransactionPush(TransactionPushError),
        TransactionRetry(TransactionRetryError),
        TransactionStatus(TransactionStatusError),
        WriteIntent(WriteIntentError),
        WriteTooOld(WriteTooOldError),
        OpRequiresTxn(OpRequiresTxnError),
        ConditionFailed(ConditionFailedError),
        LeaseRejected(LeaseRejectedError),
        NodeUnavailable(NodeUnavailableError),
        Send(SendError),
        RaftGroupDeleted(RaftGroupDeletedError),
        ReplicaCorruption(ReplicaCorruptionError),
        ReplicaTooOld(ReplicaTooOldError),
        AmbiguousResult(AmbiguousResultError),
        StoreNotFound(StoreNotFoundError),
        TransactionRetryWithProtoRefresh(TransactionRetryWithProtoRefreshError),
        IntegerOverflow(IntegerOverflowError),
        UnsupportedRequest(UnsupportedRequestError),
        MixedSuccess(MixedSuccessError),
        BatchTimestampBeforeGc(BatchTimestampBeforeGcError),
        TxnAlreadyEncounteredError(TxnAlreadyEncounteredError),
        IntentMissing(IntentMissingError),
        MergeInProgress(MergeInProgressError),
        RangeFeedRetry(RangeFeedRetryError),
        IndeterminateCommit(IndeterminateCommitError),
    }
}

impl ErrorDetail {
    /// Handling category of this detail.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::TransactionAborted(_)
            | Self::TransactionPush(_)
            | Self::TransactionRetry(_)
            | Self::WriteTooOld(_)
            | Self::ReadWithinUncertaintyInterval(_) => ErrorClass::Restart,

            Self::TransactionRetryWithProtoRefresh(_) => ErrorClass::ClientVisibleRetry,

            Self::AmbiguousResult(_) | Self::IndeterminateCommit(_) => {
                ErrorClass::ClientVisibleAmbiguous
            }

            Self::NotLeaseHolder(_)
            | Self::RangeNotFound(_)
            | Self::RangeKeyMismatch(_)
            | Self::StoreNotFound(_)
            | Self::ReplicaTooOld(_)
            | Self::NodeUnavailable(_)
            | Self::LeaseRejected(_) => ErrorClass::Routing,

            Self::WriteIntent(_)
            | Self::ConditionFailed(_)
            | Self::IntentMissing(_)
            | Self::IntegerOverflow(_) => ErrorClass::Conflict,

            Self::ReplicaCorruption(_)
            | Self::RaftGroupDeleted(_)
            | Self::MergeInProgress(_)
            | Self::TxnAlreadyEncounteredError(_)
            | Self::TransactionStatus(_)
            | Self::OpRequiresTxn(_)
            | Self::UnsupportedRequest(_)
            | Self::Send(_)
            | Self::BatchTimestampBeforeGc(_)
            | Self::MixedSuccess(_)
            | Self::RangeFeedRetry(_) => ErrorClass::Terminal,
        }
    }

    /// Returns the held variant if it is a `T`.
    pub fn downcast_ref<T: UnionMember>(&self) -> Option<&T> {
        T::from_detail(self)
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_dyn().fmt(f)
    }
}

impl std::error::Error for ErrorDetail {}

impl DetailSource for ErrorDetail {
    fn message(&self, envelope: Option<&Error>) -> String {
        self.as_dyn().message(envelope)
    }

    fn transaction_restart(&self) -> TransactionRestart {
        self.as_dyn().transaction_restart()
    }

    fn is_client_visible_retry(&self) -> bool {
        self.as_dyn().is_client_visible_retry()
    }

    fn is_client_visible_ambiguous(&self) -> bool {
        self.as_dyn().is_client_visible_ambiguous()
    }

    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self)
    }
}
