//! Transaction type for Hashledger

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sender recorded on mining reward transactions.
pub const REWARD_SENDER: &str = "0";

/// A value transfer waiting in the mempool or sealed inside a block.
///
/// Fields hold whatever JSON value was submitted. Only their presence is
/// required; there is no balance model and no shape check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Value,
    pub recipient: Value,
    pub amount: Value,
}

impl Transaction {
    pub fn new(
        sender: impl Into<Value>,
        recipient: impl Into<Value>,
        amount: impl Into<Value>,
    ) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            amount: amount.into(),
        }
    }

    /// The reward credited to `recipient` for mining a block.
    pub fn reward(recipient: impl Into<Value>, amount: u64) -> Self {
        Transaction::new(REWARD_SENDER, recipient, amount)
    }

    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }

    /// JSON text used when hashing the enclosing block: `sender`,
    /// `recipient`, `amount`, compact.
    pub fn canonical_json(&self) -> String {
        format!(
            r#"{{"sender":{},"recipient":{},"amount":{}}}"#,
            self.sender, self.recipient, self.amount
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_in_construction_order() {
        let tx = Transaction::new("alice", "bob", 5u64);
        assert_eq!(
            serde_json::to_string(&tx).unwrap(),
            r#"{"sender":"alice","recipient":"bob","amount":5}"#
        );
    }

    #[test]
    fn test_float_amount_kept_as_given() {
        let tx: Transaction =
            serde_json::from_str(r#"{"sender":"a","recipient":"b","amount":2.5}"#).unwrap();
        assert_eq!(tx.amount.as_f64(), Some(2.5));
        assert!(!tx.is_reward());
    }

    #[test]
    fn test_any_json_value_is_accepted() {
        let tx: Transaction =
            serde_json::from_str(r#"{"sender":null,"recipient":7,"amount":"5"}"#).unwrap();
        assert!(tx.sender.is_null());
        assert_eq!(tx.recipient, 7);
        assert_eq!(tx.amount, "5");
        assert_eq!(
            tx.canonical_json(),
            r#"{"sender":null,"recipient":7,"amount":"5"}"#
        );
    }

    #[test]
    fn test_reward_transaction() {
        let tx = Transaction::reward("node", 1);
        assert!(tx.is_reward());
        assert_eq!(tx.recipient, "node");
        assert_eq!(tx.amount, 1);
    }

    #[test]
    fn test_numeric_zero_sender_is_not_a_reward() {
        assert!(!Transaction::new(0u64, "b", 1u64).is_reward());
    }

    #[test]
    fn test_canonical_json_escapes_strings() {
        let tx = Transaction::new("a\"b", "c", 3u64);
        assert_eq!(tx.canonical_json(), r#"{"sender":"a\"b","recipient":"c","amount":3}"#);
    }
}
