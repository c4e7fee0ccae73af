//! Cryptographic primitives for the Sierpinski ledger
//!
//! The ledger only needs two capabilities from a signature scheme: something
//! that can sign bytes and report its public identity ([`Signer`]), and
//! something that can check a signature against an identity ([`Verifier`]).
//! secp256k1 ECDSA over SHA-256 digests is the built-in backend.

use crate::error::LedgerError;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use sha2::{Digest, Sha256};

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Key material able to sign on behalf of one public identity.
pub trait Signer {
    /// Serialized public identity the signatures verify against.
    fn public_identity(&self) -> Vec<u8>;

    fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, LedgerError>;

    fn public_identity_hex(&self) -> String {
        hex::encode(self.public_identity())
    }
}

/// Signature checking for one scheme. Never errors: anything that does not
/// verify is simply `false`.
pub trait Verifier: Send + Sync {
    fn verify_message(&self, message: &[u8], signature: &[u8], identity: &[u8]) -> bool;
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Result<Self, LedgerError> {
        Ok(Self::derive(SecretKey::new(&mut OsRng)))
    }

    fn derive(secret_key: SecretKey) -> Self {
        KeyPair {
            public_key: PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key),
            secret_key,
        }
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                LedgerError::Crypto(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                LedgerError::Crypto(format!("Invalid secret key bytes: {}", e))
            }
        })?;

        Ok(Self::derive(secret_key))
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, LedgerError> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| LedgerError::Crypto(format!("Invalid secret key hex: {}", e)))?;
        Self::from_secret_bytes(&bytes)
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Returns the KeyPair's public key as a compressed byte array.
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public_key.serialize()
    }

    /// Signs a message (which is first hashed using SHA-256) and returns the compact signature bytes.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; COMPACT_SIGNATURE_SIZE], LedgerError> {
        let digest = Sha256::digest(message);

        let message = Message::from_digest_slice(&digest)
            .map_err(|e| LedgerError::Crypto(format!("Failed to create message: {}", e)))?;

        let signature = SECP256K1_CONTEXT.sign_ecdsa(&message, &self.secret_key);
        Ok(signature.serialize_compact())
    }
}

impl Signer for KeyPair {
    fn public_identity(&self) -> Vec<u8> {
        self.public_key_bytes().to_vec()
    }

    fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, LedgerError> {
        Ok(self.sign(message)?.to_vec())
    }
}

/// Verifies an ECDSA signature given the raw public key bytes, message, and signature bytes.
pub fn verify_signature(
    public_key_bytes: &[u8],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<(), LedgerError> {
    if public_key_bytes.len() != PUBLIC_KEY_SIZE {
        return Err(LedgerError::Crypto(format!(
            "Public key must be exactly {} bytes (compressed), got {}",
            PUBLIC_KEY_SIZE,
            public_key_bytes.len()
        )));
    }
    if signature_bytes.len() != COMPACT_SIGNATURE_SIZE {
        return Err(LedgerError::Crypto(format!(
            "Signature must be exactly {} bytes (compact), got {}",
            COMPACT_SIGNATURE_SIZE,
            signature_bytes.len()
        )));
    }

    let public_key = PublicKey::from_slice(public_key_bytes)
        .map_err(|e| LedgerError::Crypto(format!("Invalid public key: {}", e)))?;

    let digest = Sha256::digest(message);

    let message = Message::from_digest_slice(&digest)
        .map_err(|e| LedgerError::Crypto(format!("Failed to create message: {}", e)))?;

    let signature = Signature::from_compact(signature_bytes)
        .map_err(|e| LedgerError::Crypto(format!("Invalid signature: {}", e)))?;

    SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .map_err(|_| LedgerError::Crypto("Signature verification failed".to_string()))
}

/// Checks that `identity_hex` is a well-formed compressed public key.
pub fn validate_public_key_hex(identity_hex: &str) -> Result<(), LedgerError> {
    let bytes = hex::decode(identity_hex)
        .map_err(|e| LedgerError::Crypto(format!("Invalid public key hex: {}", e)))?;
    PublicKey::from_slice(&bytes)
        .map(|_| ())
        .map_err(|e| LedgerError::Crypto(format!("Invalid public key: {}", e)))
}

/// The built-in [`Verifier`] backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Verifier;

impl Verifier for Secp256k1Verifier {
    fn verify_message(&self, message: &[u8], signature: &[u8], identity: &[u8]) -> bool {
        verify_signature(identity, message, signature).is_ok()
    }
}
