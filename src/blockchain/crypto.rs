use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Number of hex characters of the public-key digest kept as the address
pub const ADDRESS_HEX_LEN: usize = 40;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Decoding error: {0}")]
    DecodingError(#[from] hex::FromHexError),
}

/// SHA-256 of `data` as lowercase hex
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// The message a sender signs: canonical JSON of `{amount, receiver, sender}`
pub fn transfer_message(sender: &str, receiver: &str, amount: f64) -> Vec<u8> {
    serde_json::json!({
        "sender": sender,
        "receiver": receiver,
        "amount": amount,
    })
    .to_string()
    .into_bytes()
}

/// Derives an address from a public key: the first 40 hex characters of the
/// SHA-256 of the raw key bytes
pub fn address_from_public_key(public_key: &VerifyingKey) -> String {
    let mut digest = sha256_hex(public_key.as_bytes());
    digest.truncate(ADDRESS_HEX_LEN);
    digest
}

fn decode_fixed<const N: usize>(hex_str: &str) -> Result<[u8; N], CryptoError> {
    let bytes = hex::decode(hex_str)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        CryptoError::InvalidSignature(format!("expected {} bytes, got {}", N, len))
    })
}

/// Parses a hex-encoded Ed25519 public key
pub fn public_key_from_hex(public_key_hex: &str) -> Result<VerifyingKey, CryptoError> {
    let bytes: [u8; 32] = decode_fixed(public_key_hex)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// Represents a wallet with a keypair
#[derive(Debug, Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    address: String,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(signing_key)
    }

    /// Creates a wallet from a hex-encoded 32-byte secret key
    pub fn from_private_key_hex(private_key_hex: &str) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = decode_fixed(private_key_hex)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&bytes)))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        let address = address_from_public_key(&verifying_key);
        Wallet {
            signing_key,
            verifying_key,
            address,
        }
    }

    /// Gets the wallet's address
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key.as_bytes())
    }

    /// Exports the wallet's secret key as hex. The caller is responsible for
    /// keeping it.
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Signs the SHA-256 digest of `message`, returning the hex signature
    pub fn sign(&self, message: &[u8]) -> String {
        let digest = Sha256::digest(message);
        hex::encode(self.signing_key.sign(&digest).to_bytes())
    }
}

/// Generates a fresh identity as `(private_key, public_key, address)`, all hex
pub fn generate_identity() -> (String, String, String) {
    let wallet = Wallet::generate();
    (
        wallet.private_key_hex(),
        wallet.public_key_hex(),
        wallet.address().to_string(),
    )
}

/// Signs a transfer with a hex private key.
///
/// # Returns
///
/// The hex signature together with the signer's hex public key
pub fn sign_transfer(
    private_key_hex: &str,
    sender: &str,
    receiver: &str,
    amount: f64,
) -> Result<(String, String), CryptoError> {
    let wallet = Wallet::from_private_key_hex(private_key_hex)?;
    let signature = wallet.sign(&transfer_message(sender, receiver, amount));
    Ok((signature, wallet.public_key_hex()))
}

/// Verifies a hex signature over the SHA-256 digest of `message`.
///
/// Malformed keys and signatures are reported as errors; a well-formed
/// signature that does not match yields `Ok(false)`.
pub fn verify_signature(
    message: &[u8],
    signature_hex: &str,
    public_key_hex: &str,
) -> Result<bool, CryptoError> {
    let public_key = public_key_from_hex(public_key_hex)?;
    let signature_bytes: [u8; 64] = decode_fixed(signature_hex)?;
    let signature = Signature::from_bytes(&signature_bytes);
    let digest = Sha256::digest(message);

    Ok(public_key.verify(&digest, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_creation() {
        let wallet = Wallet::generate();
        assert_eq!(wallet.address().len(), ADDRESS_HEX_LEN);
        assert_eq!(wallet.public_key_hex().len(), 64);
        assert_eq!(wallet.private_key_hex().len(), 64);
    }

    #[test]
    fn test_address_is_prefix_of_public_key_digest() {
        let (_, public_key, address) = generate_identity();
        let digest = sha256_hex(&hex::decode(public_key).unwrap());
        assert_eq!(&digest[..ADDRESS_HEX_LEN], address);
    }

    #[test]
    fn test_wallet_round_trips_through_private_key() {
        let wallet = Wallet::generate();
        let restored = Wallet::from_private_key_hex(&wallet.private_key_hex()).unwrap();
        assert_eq!(restored.address(), wallet.address());
        assert_eq!(restored.public_key_hex(), wallet.public_key_hex());
    }

    #[test]
    fn test_signing_and_verification() {
        let wallet = Wallet::generate();
        let message = b"Hello, world!";

        let signature = wallet.sign(message);
        assert!(verify_signature(message, &signature, &wallet.public_key_hex()).unwrap());

        // Verify with wrong message
        assert!(!verify_signature(b"Wrong message", &signature, &wallet.public_key_hex()).unwrap());
    }

    #[test]
    fn test_sign_transfer_matches_wallet_key() {
        let wallet = Wallet::generate();
        let (signature, public_key) =
            sign_transfer(&wallet.private_key_hex(), wallet.address(), "bob", 12.5).unwrap();

        assert_eq!(public_key, wallet.public_key_hex());
        let message = transfer_message(wallet.address(), "bob", 12.5);
        assert!(verify_signature(&message, &signature, &public_key).unwrap());
    }

    #[test]
    fn test_malformed_inputs_are_errors() {
        let wallet = Wallet::generate();
        let signature = wallet.sign(b"msg");

        assert!(verify_signature(b"msg", "zz", &wallet.public_key_hex()).is_err());
        assert!(verify_signature(b"msg", &signature[..60], &wallet.public_key_hex()).is_err());
        assert!(verify_signature(b"msg", &signature, "abcd").is_err());
        assert!(Wallet::from_private_key_hex("not-hex").is_err());
        assert!(Wallet::from_private_key_hex("00ff").is_err());
    }

    #[test]
    fn test_transfer_message_is_sorted_and_float() {
        let message = transfer_message("alice", "bob", 50.0);
        assert_eq!(
            String::from_utf8(message).unwrap(),
            r#"{"amount":50.0,"receiver":"bob","sender":"alice"}"#
        );
    }
}
