//! Error types for the Sierpinski ledger

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Invalid fractal position: {0}")]
    InvalidPosition(String),
    #[error("Malformed address: {0}")]
    MalformedAddress(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid party: {0}")]
    InvalidParty(String),
    #[error("Unauthorized signer: {0}")]
    UnauthorizedSigner(String),
    #[error("Unsigned transaction: {0}")]
    UnsignedTransaction(String),
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),
    #[error("A foundational wallet already exists: {0}")]
    FounderAlreadyExists(String),
    #[error("Fractal address space exhausted at depth {0}")]
    AddressSpaceExhausted(u32),
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),
    #[error("No foundational wallet; run founder onboarding first")]
    NoFoundationalWallet,
    #[error("Cryptographic error: {0}")]
    Crypto(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, LedgerError>;
