//! End-to-end behavior of the error envelope as seen by a transaction
//! coordinator and by code that receives envelopes from other nodes.

use std::fmt;

use kvproto::errors::details::{
    ConditionFailedError, IndeterminateCommitError, MixedSuccessError, RangeKeyMismatchError,
    ReadWithinUncertaintyIntervalError, TransactionAbortedError, TransactionAbortedReason,
    TransactionPushError, TransactionRetryError, TransactionRetryReason, WriteIntentError,
    WriteTooOldError,
};
use kvproto::{
    errorf, DetailRef, DetailSource, Error, ErrorClass, ErrorDetail, InternalError, Intent, Key,
    NodeId, PlainError, ProtocolViolation, RangeDescriptor, RangeId, Timestamp, Transaction,
    TransactionRestart, TxnId, UnionSlot, UnstructuredError,
};
use uuid::Uuid;

fn txn(name: &str) -> Transaction {
    Transaction {
        id: TxnId::from_uuid(Uuid::from_u128(0xfeed)),
        name: name.into(),
        key: Key::from("anchor"),
        ..Transaction::default()
    }
}

fn restart_details() -> Vec<ErrorDetail> {
    let mut reader = txn("reader");
    reader.max_timestamp = Timestamp::new(50, 0);
    reader.update_observed_timestamp(NodeId::new(1), Timestamp::new(20, 0));
    vec![
        TransactionAbortedError::new(TransactionAbortedReason::AbortedRecordFound).into(),
        TransactionPushError::new(txn("pushee")).into(),
        TransactionRetryError::new(TransactionRetryReason::WriteTooOld, "").into(),
        WriteTooOldError::new(Timestamp::new(10, 0), Timestamp::new(11, 1)).into(),
        ReadWithinUncertaintyIntervalError::new(Timestamp::new(10, 0), Timestamp::new(30, 0), Some(&reader))
            .into(),
    ]
}

// ---------------------------------------------------------------------------
// Detail round trip
// ---------------------------------------------------------------------------

#[test]
fn every_restart_detail_survives_attach_and_extract() {
    for detail in restart_details() {
        let err = Error::new(detail.clone());
        assert_eq!(err.transaction_restart(), TransactionRestart::Immediate, "{}", detail.type_name());

        let extracted = err.detail();
        assert_eq!(extracted.known(), Some(&detail));
        assert_eq!(extracted.transaction_restart(), err.transaction_restart());
        assert_eq!(detail.class(), ErrorClass::Restart);
    }
}

#[test]
fn every_restart_detail_survives_the_wire() {
    for detail in restart_details() {
        let mut err = Error::with_txn(detail, Some(&txn("coordinator")));
        err.set_error_index(2);

        let json = serde_json::to_string(&err).unwrap();
        let back: Error = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
        assert_eq!(back.index(), Some(2));
    }
}

#[test]
fn unrepresentable_detail_falls_back_to_message() {
    let err = Error::new(UnstructuredError::new("raft log truncated"));
    assert_eq!(err.transaction_restart(), TransactionRestart::None);

    let extracted = err.detail();
    assert!(matches!(extracted, DetailRef::Unknown(_)));
    assert_eq!(extracted.message(None), err.message());
    assert_eq!(extracted.transaction_restart(), TransactionRestart::None);

    let plain = err.to_plain();
    assert!(matches!(plain, PlainError::Internal(_)));
    assert_eq!(plain.to_string(), err.message());
}

/// A failure from outside the crate that insists on a restart.
#[derive(Debug)]
struct ForeignRestart;

impl fmt::Display for ForeignRestart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("foreign restart")
    }
}

impl DetailSource for ForeignRestart {
    fn transaction_restart(&self) -> TransactionRestart {
        TransactionRestart::Backoff
    }

    fn into_union(self) -> UnionSlot {
        UnionSlot::Unrepresentable
    }
}

#[test]
fn unrepresentable_restart_detail_is_a_protocol_violation() {
    match Error::try_new(ForeignRestart) {
        Err(ProtocolViolation::UnrepresentableRestartDetail { detail_type, restart }) => {
            assert!(detail_type.ends_with("ForeignRestart"), "{detail_type}");
            assert_eq!(restart, TransactionRestart::Backoff);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
#[should_panic(expected = "declares transaction restart BACKOFF but is not an error detail")]
fn unrepresentable_restart_detail_panics_when_not_checked() {
    let _ = Error::new(ForeignRestart);
}

/// Declares a restart but hands over a detail that carries none.
#[derive(Debug)]
struct RestartOnPlainDetail;

impl fmt::Display for RestartOnPlainDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("restart on plain detail")
    }
}

impl DetailSource for RestartOnPlainDetail {
    fn transaction_restart(&self) -> TransactionRestart {
        TransactionRestart::Immediate
    }

    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(ConditionFailedError::new(None).into())
    }
}

#[test]
fn restart_classification_always_matches_the_stored_detail() {
    let err = Error::try_new(RestartOnPlainDetail).unwrap_err();
    assert!(matches!(
        err,
        ProtocolViolation::MismatchedRestartDetail {
            declared: TransactionRestart::Immediate,
            stored: TransactionRestart::None,
            ..
        }
    ));
    assert!(err.to_string().contains("stores ConditionFailedError with restart NONE"), "{err}");
}

#[test]
fn absent_failure_cannot_be_wrapped() {
    let err = Error::try_from_failure(None::<ConditionFailedError>).unwrap_err();
    assert_eq!(err, ProtocolViolation::MissingFailure);
    assert_eq!(err.to_string(), "cannot build an error envelope from an absent failure");
}

// ---------------------------------------------------------------------------
// Transaction attach and merge
// ---------------------------------------------------------------------------

#[test]
fn merging_transactions_keeps_progress_from_both() {
    let mut first = txn("writer");
    first.epoch = 1;
    first.priority = 2;

    let mut second = txn("");
    second.epoch = 3;

    let mut err = Error::new(TransactionAbortedError::new(TransactionAbortedReason::ClientReject));
    err.update_txn(Some(&first));
    err.update_txn(Some(&second));

    let merged = err.txn().unwrap();
    assert_eq!(merged.epoch, 3);
    assert_eq!(merged.priority, 2);
    assert_eq!(merged.name, "writer");
    assert!(err.message().contains("epo=3"), "{}", err.message());
    assert!(err.message().contains("pri=2"), "{}", err.message());
}

#[test]
fn set_txn_replaces_instead_of_merging() {
    let mut first = txn("first");
    first.epoch = 5;
    let mut err = Error::with_txn(TransactionAbortedError::default(), Some(&first));

    err.set_txn(Some(&txn("second")));
    assert_eq!(err.txn().map(|t| t.epoch), Some(0));
    assert!(err.message().contains("\"second\""), "{}", err.message());
}

#[test]
fn indeterminate_commit_names_both_transactions() {
    let mut staging = txn("staging");
    staging.status = kvproto::TransactionStatus::Staging;
    let err = Error::with_txn(IndeterminateCommitError::new(staging), Some(&txn("observer")));

    assert!(err.message().starts_with("txn \"observer\""), "{}", err.message());
    assert!(err.message().contains("found txn in indeterminate STAGING state \"staging\""));
    assert!(err.is_client_visible_ambiguous());
    assert!(!err.transaction_restart().requires_restart());
}

// ---------------------------------------------------------------------------
// Individual details through the envelope
// ---------------------------------------------------------------------------

#[test]
fn write_intent_summaries() {
    let intents = |n: usize| -> Vec<Intent> {
        (0..n)
            .map(|i| Intent::new(format!("key-{i}").as_str(), TxnId::default(), 0))
            .collect()
    };

    let short = Error::new(WriteIntentError::new(intents(3)));
    assert_eq!(
        short.message(),
        "conflicting intents on \"key-0\", \"key-1\", \"key-2\""
    );

    let long = Error::new(WriteIntentError::new(intents(12)));
    assert!(long.message().contains("\"key-4\" ... \"key-7\""), "{}", long.message());
    assert!(!long.message().contains("\"key-5\""));
    assert!(!long.message().contains("\"key-6\""));
    assert!(long.message().ends_with("\"key-11\""));
}

#[test]
fn range_key_mismatch_rejects_uninitialized_descriptor() {
    let uninitialized = RangeDescriptor {
        range_id: RangeId::new(7),
        ..RangeDescriptor::default()
    };
    let err = RangeKeyMismatchError::try_new(Key::from("a"), Key::from("b"), Some(uninitialized));
    assert!(matches!(err, Err(ProtocolViolation::UninitializedRangeDescriptor { .. })));

    let initialized = RangeDescriptor {
        range_id: RangeId::new(7),
        start_key: Key::from("a"),
        end_key: Key::from("m"),
        ..RangeDescriptor::default()
    };
    let ok = RangeKeyMismatchError::new(Key::from("a"), Key::from("z"), Some(initialized));
    assert_eq!(
        Error::new(ok).message(),
        "key range \"a\"-\"z\" outside of bounds of range \"a\"-\"m\""
    );
}

#[test]
fn mixed_success_wrapping_is_idempotent() {
    let once = MixedSuccessError::wrap(ConditionFailedError::new(None));
    let twice = MixedSuccessError::wrap(once.clone());
    assert_eq!(once, twice);
    assert_eq!(
        Error::new(twice).message(),
        "the batch experienced mixed success and failure: unexpected value: <nil>"
    );
}

// ---------------------------------------------------------------------------
// Conversion out of the protocol
// ---------------------------------------------------------------------------

#[test]
fn aborted_transaction_becomes_unhandled_retryable_across_the_wire() {
    let err = Error::with_txn(
        TransactionAbortedError::new(TransactionAbortedReason::PusherAborted),
        Some(&txn("victim")),
    );
    let plain = err.into_plain();
    assert!(plain.is_unhandled_retryable());

    let json = serde_json::to_string(&plain).unwrap();
    let back: PlainError = serde_json::from_str(&json).unwrap();
    assert!(back.is_unhandled_retryable());
    assert_eq!(back.transaction_restart(), TransactionRestart::Immediate);
    assert_eq!(back, plain);

    let carried = &back.as_unhandled_retryable().unwrap().error;
    assert!(carried.detail_as::<TransactionAbortedError>().is_some());
    assert_eq!(carried.txn().map(|t| t.name.as_str()), Some("victim"));
}

#[test]
fn client_visible_details_are_returned_bare() {
    let err = Error::new(IndeterminateCommitError::new(txn("staging")));
    match err.into_plain() {
        PlainError::Detail(ErrorDetail::IndeterminateCommit(detail)) => {
            assert_eq!(detail.staging_txn.name, "staging");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn internal_error_round_trips_the_envelope() {
    let mut original = errorf!("replica {} is gone", 4);
    original.update_txn(Some(&txn("t")));
    original.set_error_index(1);

    let PlainError::Internal(internal) = original.to_plain() else {
        panic!("expected an internal error");
    };
    assert_eq!(Error::new(internal.clone()), original);
    assert_eq!(InternalError::new(original.clone()), internal);
}

// ---------------------------------------------------------------------------
// Wire compatibility
// ---------------------------------------------------------------------------

#[test]
fn unknown_detail_from_newer_node_is_dropped_leniently() {
    let json = r#"{
        "message": "something only a newer node understands",
        "detail": {"quantum_entanglement": {"qubits": 3}},
        "txn": null,
        "transaction_restart": "BACKOFF",
        "index": {"index": 5}
    }"#;
    let err: Error = serde_json::from_str(json).unwrap();

    assert_eq!(err.message(), "something only a newer node understands");
    assert!(err.detail().known().is_none());
    assert_eq!(err.transaction_restart(), TransactionRestart::Backoff);
    assert_eq!(err.index(), Some(5));
    assert!(err.to_plain().is_unhandled_retryable());
}

#[test]
fn unknown_nested_cause_degrades_only_the_nested_slot() {
    let json = r#"{
        "message": "the batch experienced mixed success and failure: quantum decoherence",
        "detail": {"mixed_success": {
            "wrapped": {"quantum_entanglement": {"qubits": 3}},
            "wrapped_message": "quantum decoherence"
        }}
    }"#;
    let err: Error = serde_json::from_str(json).unwrap();

    let mixed = err.detail_as::<MixedSuccessError>().unwrap();
    assert!(mixed.wrapped().is_none());
    assert_eq!(mixed.cause_message(), "quantum decoherence");
    assert_eq!(err.detail().to_string(), err.message());
}

#[test]
fn minimal_envelope_decodes_with_defaults() {
    let err: Error = serde_json::from_str(r#"{"message": "bare"}"#).unwrap();
    assert_eq!(err.message(), "bare");
    assert_eq!(err.transaction_restart(), TransactionRestart::None);
    assert!(err.txn().is_none());
    assert_eq!(err.index(), None);
}

#[test]
fn uninitialized_descriptor_is_rejected_on_decode() {
    let json = r#"{
        "message": "m",
        "detail": {"range_key_mismatch": {
            "request_start_key": [97],
            "request_end_key": [98],
            "mismatched_range": {
                "range_id": 3, "start_key": [], "end_key": [],
                "replicas": [], "next_replica_id": 0
            }
        }}
    }"#;
    let err: Error = serde_json::from_str(json).unwrap();
    assert!(err.detail().known().is_none());
}

#[test]
fn errorf_prefixes_file_and_line() {
    let (err, line) = (errorf!("lost {} replicas", 2), line!());
    assert_eq!(err.message(), format!("{}:{line}: lost 2 replicas", file!()));
    assert_eq!(err.transaction_restart(), TransactionRestart::None);
}
