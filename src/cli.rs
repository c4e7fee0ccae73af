//! Command-line session: load state, run one command, save state.
//!
//! State is written back only after a mutation succeeds. The binary in
//! `src/bin/sierpinski.rs` is a thin presentation layer over this.

use crate::config::{load_config, Config};
use crate::error::{LedgerError, Result};
use crate::keystore::Keystore;
use crate::ledger::{IntegrityReport, Ledger};
use crate::onboarding::{FounderOnboarding, OnboardingPolicy, StandardOnboarding};
use crate::persistence::{export_snapshot, import_snapshot, StateFile};
use crate::transaction::{amount_from_f64, Amount, Transaction};
use crate::visualize::RenderOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct LedgerSession {
    config: Config,
    policy: OnboardingPolicy,
    ledger: Ledger,
    state: StateFile,
    keystore: Keystore,
}

impl LedgerSession {
    /// Loads configuration, then the saved ledger (if any) and keystore.
    /// `state_override` replaces `storage.state_file` from the config.
    pub fn open(config_path: Option<&Path>, state_override: Option<PathBuf>) -> Result<Self> {
        let config = load_config(config_path)?;
        Self::with_config(config, state_override)
    }

    pub fn with_config(config: Config, state_override: Option<PathBuf>) -> Result<Self> {
        config.validate()?;
        let policy = config.onboarding_policy()?;
        let mut ledger = Ledger::new(config.addressing()?);

        let state = StateFile::new(state_override.unwrap_or_else(|| config.storage.state_file.clone()));
        if let Some(snapshot) = state.load()? {
            ledger.restore(snapshot)?;
        }
        debug!(
            state = %state.path().display(),
            transactions = ledger.len(),
            "opened ledger session"
        );

        let keystore = Keystore::load(config.storage.keystore_file.clone())?;
        Ok(LedgerSession {
            config,
            policy,
            ledger,
            state,
            keystore,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn state_path(&self) -> &Path {
        self.state.path()
    }

    fn commit(&self) -> Result<()> {
        self.state.save(&self.ledger.to_snapshot())
    }

    /// Builds, signs (with the sender's stored key) and inserts a transfer.
    pub fn add_transaction(&mut self, sender: &str, receiver: &str, amount: f64) -> Result<Transaction> {
        let amount = amount_from_f64(amount)?;
        let tx = self.ledger.factory().create(sender, receiver, amount)?;
        let key = self.keystore.require(sender)?;
        let tx = self.ledger.sign(&tx, &key)?;
        self.ledger.insert(vec![tx.clone()])?;
        self.commit()?;
        info!(id = %tx.short_id(), %sender, %receiver, %amount, "transaction added");
        Ok(tx)
    }

    pub fn query_transactions(&self, wallet: &str) -> Result<Vec<&Transaction>> {
        self.ledger.addressing().decode(wallet)?;
        Ok(self.ledger.query_by_wallet(wallet))
    }

    pub fn balance(&self, wallet: &str) -> Result<Amount> {
        self.ledger.addressing().decode(wallet)?;
        Ok(self.ledger.balance(wallet))
    }

    pub fn verify(&self) -> IntegrityReport {
        self.ledger.integrity_report()
    }

    pub fn visualize(&self, show_balances: bool) -> String {
        self.ledger.visualize_ledger(&RenderOptions { show_balances })
    }

    pub fn export(&self, path: &Path) -> Result<()> {
        export_snapshot(path, &self.ledger.to_snapshot())?;
        info!(path = %path.display(), "ledger exported");
        Ok(())
    }

    /// Replaces the current ledger with the snapshot at `path`.
    pub fn import(&mut self, path: &Path) -> Result<()> {
        let snapshot = import_snapshot(path)?;
        self.ledger.restore(snapshot)?;
        self.commit()?;
        info!(path = %path.display(), transactions = self.ledger.len(), "ledger imported");
        Ok(())
    }

    /// The address of a position. Nothing is registered.
    pub fn create_wallet(&self, level: u32, index: u64) -> Result<String> {
        self.ledger.addressing().encode(level, index)
    }

    pub fn founder_onboarding(&mut self) -> Result<FounderOnboarding> {
        let outcome = self.ledger.founder_onboarding(self.policy)?;
        self.keystore.insert(&outcome.foundational_wallet, &outcome.key);
        self.keystore.save()?;
        self.commit()?;
        Ok(outcome)
    }

    pub fn standard_onboarding(&mut self) -> Result<StandardOnboarding> {
        let founder = self
            .ledger
            .foundational_wallet()
            .map(|w| w.address.clone())
            .ok_or(LedgerError::NoFoundationalWallet)?;
        let funder = self.keystore.require(&founder)?;

        let outcome = self.ledger.standard_onboarding(self.policy, &funder)?;
        self.keystore.insert(&outcome.wallet, &outcome.key);
        self.keystore.save()?;
        self.commit()?;
        Ok(outcome)
    }
}
