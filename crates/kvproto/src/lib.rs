//! Error envelope and retry classification for a transactional key-value store.
//!
//! Failures raised by the storage, replication and transaction layers travel
//! between nodes as an [`Error`] envelope. The envelope carries a structured
//! [`ErrorDetail`], a snapshot of the in-flight [`Transaction`], and a
//! [`TransactionRestart`] classification that tells the coordinator whether
//! the transaction must be restarted.
//!
//! ## Architectural Layer
//!
//! **Protocol types only.** This crate has no I/O and no runtime. It defines
//! what a failure looks like on the wire and how it must be handled; the
//! layers that produce and consume failures live elsewhere.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`NodeId`, `RangeId`, `TxnId`, etc.) |
//! | [`types`] | Shared value types (`Timestamp`, `Key`, `RangeDescriptor`, etc.) |
//! | [`transaction`] | The `Transaction` record and its merge rules |
//! | [`errors`] | The error envelope, detail variants, and classification |

pub mod errors;
pub mod identifiers;
pub mod transaction;
pub mod types;

// Re-export the common surface at the crate root.
pub use errors::{
    DetailRef, DetailSource, ErrPosition, Error, ErrorClass, ErrorDetail, InternalError, PlainError,
    ProtocolViolation, TransactionRestart, UnhandledRetryableError, UnionMember, UnionSlot,
    UnstructuredError,
};
pub use identifiers::{NodeId, RangeId, ReplicaId, StoreId, TxnId};
pub use transaction::{Transaction, TransactionStatus};
pub use types::{Intent, Key, Lease, ObservedTimestamp, RangeDescriptor, ReplicaDescriptor, Timestamp, Value};
