use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use utoipa::ToSchema;

use super::crypto;

/// Reasons a transaction is refused admission to the pending pool
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransactionError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: f64, available: f64 },
}

impl TransactionError {
    /// Short reason recorded in the audit log
    pub fn reason(&self) -> &'static str {
        match self {
            TransactionError::InvalidSignature => "Invalid signature",
            TransactionError::InvalidAmount(_) => "Invalid amount",
            TransactionError::InsufficientBalance { .. } => "Insufficient balance",
        }
    }
}

/// Unsigned minting sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
    /// Block reward paid to a miner
    Coinbase,
    /// Initial allocation in the genesis block
    Genesis,
}

impl Sentinel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentinel::Coinbase => "COINBASE",
            Sentinel::Genesis => "GENESIS",
        }
    }
}

/// Origin of a transfer. Serialized as a plain string: `"COINBASE"`,
/// `"GENESIS"` or the sender's address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sender {
    Sentinel(Sentinel),
    Signed(String),
}

impl Sender {
    /// The address debited by this sender, if any
    pub fn address(&self) -> Option<&str> {
        match self {
            Sender::Signed(address) => Some(address),
            Sender::Sentinel(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Sender::Sentinel(sentinel) => sentinel.as_str(),
            Sender::Signed(address) => address,
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Sender {
    fn from(s: &str) -> Self {
        match s {
            "COINBASE" => Sender::Sentinel(Sentinel::Coinbase),
            "GENESIS" => Sender::Sentinel(Sentinel::Genesis),
            address => Sender::Signed(address.to_string()),
        }
    }
}

impl Serialize for Sender {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Sender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Sender::from(raw.as_str()))
    }
}

/// A value transfer between two addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's address, or `COINBASE` / `GENESIS` for minted value
    #[schema(value_type = String, example = "COINBASE")]
    pub sender: Sender,

    /// Recipient's address
    pub receiver: String,

    /// Amount being transferred
    pub amount: f64,

    /// Hex signature over the transfer payload, empty for sentinel senders
    #[serde(default)]
    pub signature: String,

    /// Hex public key of the signer, empty for sentinel senders
    #[serde(default)]
    pub public_key: String,
}

impl Transaction {
    /// Creates a transfer from `wallet`'s address, signed by `wallet`
    #[cfg(test)]
    pub fn signed(wallet: &crypto::Wallet, receiver: &str, amount: f64) -> Self {
        let signature = wallet.sign(&crypto::transfer_message(wallet.address(), receiver, amount));

        Transaction {
            sender: Sender::Signed(wallet.address().to_string()),
            receiver: receiver.to_string(),
            amount,
            signature,
            public_key: wallet.public_key_hex(),
        }
    }

    /// Creates a new coinbase transaction (mining reward or faucet credit)
    pub fn coinbase(receiver: &str, amount: f64) -> Self {
        Self::minted(Sentinel::Coinbase, receiver, amount)
    }

    /// Creates the initial allocation carried by the genesis block
    pub fn genesis(receiver: &str, amount: f64) -> Self {
        Self::minted(Sentinel::Genesis, receiver, amount)
    }

    fn minted(sentinel: Sentinel, receiver: &str, amount: f64) -> Self {
        Transaction {
            sender: Sender::Sentinel(sentinel),
            receiver: receiver.to_string(),
            amount,
            signature: String::new(),
            public_key: String::new(),
        }
    }

    /// Bytes covered by the sender's signature
    pub fn signing_payload(&self) -> Vec<u8> {
        crypto::transfer_message(self.sender.as_str(), &self.receiver, self.amount)
    }

    /// Checks that a signed transaction was authorised by its sender.
    ///
    /// Sentinel senders need no signature. Otherwise the declared public key
    /// must hash to the sender's address and the signature must cover this
    /// transaction's payload. Any decoding failure counts as a bad signature.
    pub fn verify(&self) -> bool {
        let address = match self.sender.address() {
            Some(address) => address,
            None => return true,
        };

        match crypto::public_key_from_hex(&self.public_key) {
            Ok(key) if crypto::address_from_public_key(&key) == address => {}
            _ => return false,
        }

        crypto::verify_signature(&self.signing_payload(), &self.signature, &self.public_key)
            .unwrap_or(false)
    }

    /// Net effect of this transaction on `address`'s balance
    pub fn balance_delta(&self, address: &str) -> f64 {
        let mut delta = 0.0;
        if self.sender.address() == Some(address) {
            delta -= self.amount;
        }
        if self.receiver == address {
            delta += self.amount;
        }
        delta
    }

    pub fn is_coinbase(&self) -> bool {
        self.sender == Sender::Sentinel(Sentinel::Coinbase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::Wallet;

    #[test]
    fn test_signed_transaction_verifies() {
        let wallet = Wallet::generate();
        let tx = Transaction::signed(&wallet, "recipient", 10.5);

        assert_eq!(tx.sender, Sender::Signed(wallet.address().to_string()));
        assert_eq!(tx.public_key, wallet.public_key_hex());
        assert!(tx.verify());
    }

    #[test]
    fn test_tampered_amount_fails_verification() {
        let wallet = Wallet::generate();
        let mut tx = Transaction::signed(&wallet, "recipient", 10.0);
        tx.amount = 1000.0;
        assert!(!tx.verify());
    }

    /// A valid signature is not enough: the signing key must also own the
    /// sender address.
    #[test]
    fn test_key_not_matching_sender_fails_verification() {
        let owner = Wallet::generate();
        let thief = Wallet::generate();

        let mut tx = Transaction::signed(&thief, "thief", 10.0);
        tx.sender = Sender::Signed(owner.address().to_string());
        tx.signature = thief.sign(&tx.signing_payload());
        assert!(!tx.verify());
    }

    #[test]
    fn test_garbage_signature_is_rejected_not_panicking() {
        let wallet = Wallet::generate();
        let mut tx = Transaction::signed(&wallet, "recipient", 1.0);

        tx.signature = "not hex at all".to_string();
        assert!(!tx.verify());

        tx.signature = String::new();
        assert!(!tx.verify());

        tx.public_key = "deadbeef".to_string();
        assert!(!tx.verify());
    }

    #[test]
    fn test_sentinels_verify_without_signature() {
        assert!(Transaction::coinbase("miner", 5.0).verify());
        assert!(Transaction::genesis("master", 1000.0).verify());
    }

    #[test]
    fn test_sender_serializes_as_plain_string() {
        let tx = Transaction::coinbase("miner", 5.0);
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["sender"], "COINBASE");

        let parsed: Transaction = serde_json::from_str(
            r#"{"sender":"GENESIS","receiver":"a","amount":1}"#,
        )
        .unwrap();
        assert_eq!(parsed.sender, Sender::Sentinel(Sentinel::Genesis));
        assert_eq!(parsed.amount, 1.0);
        assert!(parsed.signature.is_empty());

        let parsed: Transaction = serde_json::from_str(
            r#"{"sender":"abc","receiver":"a","amount":1.5,"signature":"","public_key":""}"#,
        )
        .unwrap();
        assert_eq!(parsed.sender, Sender::Signed("abc".to_string()));
    }

    #[test]
    fn test_balance_delta() {
        let tx = Transaction {
            sender: Sender::Signed("alice".to_string()),
            receiver: "bob".to_string(),
            amount: 7.0,
            signature: String::new(),
            public_key: String::new(),
        };
        assert_eq!(tx.balance_delta("alice"), -7.0);
        assert_eq!(tx.balance_delta("bob"), 7.0);
        assert_eq!(tx.balance_delta("carol"), 0.0);

        let self_transfer = Transaction {
            receiver: "alice".to_string(),
            ..tx
        };
        assert_eq!(self_transfer.balance_delta("alice"), 0.0);

        // Sentinels never debit, even if an address string happens to match
        assert_eq!(Transaction::coinbase("x", 3.0).balance_delta("COINBASE"), 0.0);
    }
}
