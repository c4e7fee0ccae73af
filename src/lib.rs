//! Sierpinski Ledger - a signed transaction ledger whose wallet addresses are
//! positions in a recursively subdividing triangle
//!
//! # Architecture
//!
//! ## Addressing
//! - [`fractal`] - `(level, index)` positions and their address strings
//! - [`wallet`] - Registry binding onboarded addresses to public keys
//!
//! ## Transactions
//! - [`transaction`] - Transaction types, canonical encoding and factory
//! - [`crypto`] - Signer/verifier capabilities (secp256k1)
//! - [`signature`] - Signing and verifying transactions
//!
//! ## Ledger
//! - [`ledger`] - Append-only store, snapshots, integrity verification and
//!   the thread-safe handle
//! - [`onboarding`] - Founder and standard onboarding flows
//! - [`visualize`] - Text rendering of the wallet hierarchy
//!
//! ## Configuration & Utilities
//! - [`config`] - TOML configuration
//! - [`persistence`] - Atomic state file
//! - [`keystore`] - Locally stored key pairs
//! - [`cli`] - Session used by the `sierpinski` binary
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Addressing
// ============================================================================
pub mod fractal;
pub mod wallet;

// ============================================================================
// Transactions & Cryptography
// ============================================================================
pub mod crypto;
pub mod signature;
pub mod transaction;

// ============================================================================
// Ledger
// ============================================================================
pub mod ledger;
pub mod onboarding;
pub mod visualize;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod cli;
pub mod config;
pub mod error;
pub mod keystore;
pub mod persistence;

pub use error::{LedgerError, Result};
pub use fractal::{FractalAddressing, FractalPosition};
pub use ledger::{Ledger, LedgerSnapshot, SharedLedger};
pub use onboarding::{OnboardingController, OnboardingPolicy};
pub use transaction::{Amount, Transaction, TransactionKind};
