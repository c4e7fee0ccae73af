//! Structured, serializable ledger state.

use super::store::Ledger;
use crate::crypto::validate_public_key_hex;
use crate::error::{LedgerError, Result};
use crate::fractal::FractalAddressing;
use crate::signature::SignatureEngine;
use crate::transaction::{Amount, Transaction};
use crate::wallet::WalletRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Complete ledger state: the transaction log in insertion order plus the
/// wallet registry. Indexes and balances are rebuilt on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub branching_factor: u8,
    pub max_depth: u32,
    pub transactions: Vec<Transaction>,
    pub wallets: Vec<WalletRecord>,
}

impl LedgerSnapshot {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a snapshot document; missing or mistyped fields are reported as
    /// `CorruptSnapshot`.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| LedgerError::CorruptSnapshot(format!("unreadable snapshot: {}", e)))
    }

    pub fn addressing(&self) -> FractalAddressing {
        FractalAddressing {
            branching_factor: self.branching_factor,
            max_depth: self.max_depth,
        }
    }
}

impl Ledger {
    pub fn to_snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            branching_factor: self.addressing.branching_factor,
            max_depth: self.addressing.max_depth,
            transactions: self.transactions.clone(),
            wallets: self.registry.by_position().cloned().collect(),
        }
    }

    /// Builds a ledger with the snapshot's own addressing and the default
    /// signature backend.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Result<Ledger> {
        let addressing = snapshot.addressing();
        addressing
            .validate()
            .map_err(|e| LedgerError::CorruptSnapshot(e.to_string()))?;
        rebuild(addressing, SignatureEngine::default(), snapshot)
    }

    /// Replaces all state with the snapshot's. On error `self` is untouched.
    pub fn restore(&mut self, snapshot: LedgerSnapshot) -> Result<()> {
        if snapshot.branching_factor != self.addressing.branching_factor {
            return Err(LedgerError::CorruptSnapshot(format!(
                "snapshot uses branching factor {}, ledger is configured for {}",
                snapshot.branching_factor, self.addressing.branching_factor
            )));
        }
        *self = rebuild(self.addressing, self.engine.clone(), snapshot)?;
        Ok(())
    }
}

fn rebuild(
    addressing: FractalAddressing,
    engine: SignatureEngine,
    snapshot: LedgerSnapshot,
) -> Result<Ledger> {
    let corrupt = |reason: String| LedgerError::CorruptSnapshot(reason);

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(corrupt(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }

    let mut ledger = Ledger::with_engine(addressing, engine);

    for wallet in snapshot.wallets {
        let position = addressing
            .decode_position(&wallet.address)
            .map_err(|e| corrupt(e.to_string()))?;
        if position != wallet.position() {
            return Err(corrupt(format!(
                "wallet {} is recorded at {} but its address encodes {}",
                wallet.address,
                wallet.position(),
                position
            )));
        }
        validate_public_key_hex(&wallet.public_key)
            .map_err(|e| corrupt(format!("wallet {}: {}", wallet.address, e)))?;
        ledger
            .registry
            .register(wallet)
            .map_err(|e| corrupt(e.to_string()))?;
    }

    let mut seen = HashSet::new();
    for tx in snapshot.transactions {
        for party in [&tx.sender, &tx.receiver] {
            addressing
                .decode_position(party)
                .map_err(|e| corrupt(format!("transaction {}: {}", tx.short_id(), e)))?;
        }
        if tx.amount < Amount::ZERO {
            return Err(corrupt(format!(
                "transaction {} has a negative amount",
                tx.short_id()
            )));
        }
        if !seen.insert(tx.id.clone()) {
            return Err(corrupt(format!("duplicate transaction id {}", tx.id)));
        }
        ledger.apply(tx);
    }

    debug!(
        transactions = ledger.len(),
        wallets = ledger.registry.len(),
        "restored ledger from snapshot"
    );
    Ok(ledger)
}
