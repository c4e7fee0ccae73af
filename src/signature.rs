//! Signing and verification of ledger transactions.

use crate::crypto::{Secp256k1Verifier, Signer, Verifier};
use crate::error::{LedgerError, Result};
use crate::transaction::Transaction;
use std::fmt;
use std::sync::Arc;

/// Binds transactions to their sender's key and re-checks those bindings
/// later. The verification backend is pluggable.
#[derive(Clone)]
pub struct SignatureEngine {
    verifier: Arc<dyn Verifier>,
}

impl fmt::Debug for SignatureEngine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SignatureEngine").finish_non_exhaustive()
    }
}

impl Default for SignatureEngine {
    fn default() -> Self {
        SignatureEngine::new(Secp256k1Verifier)
    }
}

impl SignatureEngine {
    pub fn new(verifier: impl Verifier + 'static) -> Self {
        SignatureEngine {
            verifier: Arc::new(verifier),
        }
    }

    /// Returns a signed copy of `tx`.
    ///
    /// `bound_identity` is the hex public key registered for `tx.sender`; the
    /// key must match it or the call fails with `UnauthorizedSigner`.
    pub fn sign(
        &self,
        tx: &Transaction,
        key: &dyn Signer,
        bound_identity: Option<&str>,
    ) -> Result<Transaction> {
        let identity = key.public_identity_hex();
        match bound_identity {
            Some(bound) if bound == identity => {}
            Some(_) => {
                return Err(LedgerError::UnauthorizedSigner(format!(
                    "key does not belong to {}",
                    tx.sender
                )))
            }
            None => {
                return Err(LedgerError::UnauthorizedSigner(format!(
                    "no key is bound to {}",
                    tx.sender
                )))
            }
        }

        if tx.id != tx.compute_id() {
            return Err(LedgerError::UnsignedTransaction(format!(
                "transaction {} does not match its canonical fields",
                tx.short_id()
            )));
        }

        let signature = key.sign_message(&tx.canonical_bytes())?;
        let mut signed = tx.clone();
        signed.signature = Some(hex::encode(signature));
        signed.public_key = Some(identity);
        Ok(signed)
    }

    /// `true` only when the id matches the canonical fields and the signature
    /// verifies against the embedded public key.
    pub fn verify(&self, tx: &Transaction) -> bool {
        let (signature, public_key) = match (&tx.signature, &tx.public_key) {
            (Some(sig), Some(pk)) => (sig, pk),
            _ => return false,
        };
        if tx.id != tx.compute_id() {
            return false;
        }
        let (signature, identity) = match (hex::decode(signature), hex::decode(public_key)) {
            (Ok(sig), Ok(pk)) => (sig, pk),
            _ => return false,
        };
        self.verifier
            .verify_message(&tx.canonical_bytes(), &signature, &identity)
    }
}
