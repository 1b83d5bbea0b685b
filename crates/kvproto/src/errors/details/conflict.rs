//! Details reporting conflicting or invalid data.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::OrNil;
use crate::errors::{DetailSource, UnionSlot};
use crate::{Intent, Key, Value};

/// Number of intents named at each end of a long conflict list.
const INTENT_SUMMARY_EDGE: usize = 5;

/// A request ran into intents of other transactions that must be resolved
/// before it can proceed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteIntentError {
    /// The conflicting intents, in the order they were encountered.
    pub intents: Vec<Intent>,
}

impl WriteIntentError {
    pub fn new(intents: Vec<Intent>) -> Self {
        Self { intents }
    }
}

impl fmt::Display for WriteIntentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn keys(f: &mut fmt::Formatter<'_>, intents: &[Intent]) -> fmt::Result {
            for (i, intent) in intents.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", intent.key)?;
            }
            Ok(())
        }

        f.write_str("conflicting intents on ")?;
        let n = self.intents.len();
        if n <= 2 * INTENT_SUMMARY_EDGE {
            return keys(f, &self.intents);
        }
        keys(f, &self.intents[..INTENT_SUMMARY_EDGE])?;
        f.write_str(" ... ")?;
        keys(f, &self.intents[n - INTENT_SUMMARY_EDGE..])
    }
}

impl DetailSource for WriteIntentError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

/// A conditional put found a value other than the expected one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionFailedError {
    /// The value actually stored; `None` if the key was absent.
    pub actual_value: Option<Value>,
}

impl ConditionFailedError {
    pub fn new(actual_value: Option<Value>) -> Self {
        Self { actual_value }
    }
}

impl fmt::Display for ConditionFailedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unexpected value: {}", OrNil(self.actual_value.as_ref()))
    }
}

impl DetailSource for ConditionFailedError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

/// Intent resolution expected an intent at `key` that is not there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentMissingError {
    /// Key where the intent was expected.
    pub key: Key,
    /// The intent of a different transaction found at the key instead.
    pub wrong_intent: Option<Intent>,
}

impl IntentMissingError {
    pub fn new(key: Key, wrong_intent: Option<Intent>) -> Self {
        Self { key, wrong_intent }
    }
}

impl fmt::Display for IntentMissingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("intent missing")?;
        if let Some(intent) = &self.wrong_intent {
            write!(f, "; found intent {intent} at key instead")?;
        }
        Ok(())
    }
}

impl DetailSource for IntentMissingError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

/// An increment would overflow the stored integer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerOverflowError {
    /// Key holding the integer.
    pub key: Key,
    /// Value stored before the increment.
    pub current_value: i64,
    /// Increment that would overflow.
    pub increment_value: i64,
}

impl IntegerOverflowError {
    pub fn new(key: Key, current_value: i64, increment_value: i64) -> Self {
        Self {
            key,
            current_value,
            increment_value,
        }
    }
}

impl fmt::Display for IntegerOverflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "key {} with value {} incremented by {} results in overflow",
            self.key, self.current_value, self.increment_value
        )
    }
}

impl DetailSource for IntegerOverflowError {
    fn into_union(self) -> UnionSlot {
        UnionSlot::Detail(self.into())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::TxnId;

    fn intents(n: usize) -> Vec<Intent> {
        (0..n)
            .map(|i| Intent::new(Key::new(format!("k{i:02}")), TxnId::default(), 0))
            .collect()
    }

    #[test]
    fn few_intents_are_all_listed() {
        let err = WriteIntentError::new(intents(3));
        assert_eq!(err.to_string(), "conflicting intents on \"k00\", \"k01\", \"k02\"");
    }

    #[test]
    fn ten_intents_are_all_listed() {
        let msg = WriteIntentError::new(intents(10)).to_string();
        assert!(!msg.contains("..."));
        assert_eq!(msg.matches("\"k").count(), 10);
    }

    #[test]
    fn many_intents_show_first_and_last_five() {
        let msg = WriteIntentError::new(intents(12)).to_string();
        assert_eq!(
            msg,
            "conflicting intents on \"k00\", \"k01\", \"k02\", \"k03\", \"k04\" ... \
             \"k07\", \"k08\", \"k09\", \"k10\", \"k11\""
        );
        assert_eq!(msg.matches(" ... ").count(), 1);
    }

    #[test]
    fn condition_failed_renders_nil_for_missing_value() {
        assert_eq!(ConditionFailedError::new(None).to_string(), "unexpected value: <nil>");
        assert_eq!(
            ConditionFailedError::new(Some(Value::from_bytes("v"))).to_string(),
            "unexpected value: \"v\""
        );
    }

    #[test]
    fn intent_missing_names_wrong_intent() {
        assert_eq!(IntentMissingError::new(Key::from("a"), None).to_string(), "intent missing");
        let wrong = Intent::new(Key::from("a"), TxnId::default(), 2);
        assert_eq!(
            IntentMissingError::new(Key::from("a"), Some(wrong)).to_string(),
            "intent missing; found intent \"a\" {id=00000000 epo=2} at key instead"
        );
    }

    #[test]
    fn integer_overflow_message() {
        assert_eq!(
            IntegerOverflowError::new(Key::from("ctr"), i64::MAX, 1).to_string(),
            format!("key \"ctr\" with value {} incremented by 1 results in overflow", i64::MAX)
        );
    }

    proptest! {
        #[test]
        fn intent_summary_is_bounded(n in 0usize..200) {
            let msg = WriteIntentError::new(intents(n)).to_string();
            let shown = msg.matches("\"k").count();
            prop_assert_eq!(shown, n.min(10));
            prop_assert_eq!(msg.contains(" ... "), n > 10);
        }
    }
}
