//! Thread-safe ledger handle.
//!
//! One writer or many readers at a time. Readers always observe a state
//! between two complete mutations.

use super::snapshot::LedgerSnapshot;
use super::store::Ledger;
use super::verify::IntegrityReport;
use crate::crypto::Signer;
use crate::error::Result;
use crate::onboarding::{FounderOnboarding, OnboardingPolicy, StandardOnboarding};
use crate::transaction::{Amount, Transaction};
use crate::visualize::RenderOptions;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct SharedLedger {
    inner: Arc<RwLock<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        SharedLedger {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    pub fn insert(&self, transactions: Vec<Transaction>) -> Result<()> {
        self.inner.write().insert(transactions)
    }

    pub fn founder_onboarding(&self, policy: OnboardingPolicy) -> Result<FounderOnboarding> {
        self.inner.write().founder_onboarding(policy)
    }

    pub fn standard_onboarding(
        &self,
        policy: OnboardingPolicy,
        funder: &dyn Signer,
    ) -> Result<StandardOnboarding> {
        self.inner.write().standard_onboarding(policy, funder)
    }

    pub fn restore(&self, snapshot: LedgerSnapshot) -> Result<()> {
        self.inner.write().restore(snapshot)
    }

    /// Builds and signs a transfer from `sender` under the write lock, so the
    /// timestamp sequence stays monotonic across threads.
    pub fn transfer(
        &self,
        sender: &str,
        receiver: &str,
        amount: Amount,
        key: &dyn Signer,
    ) -> Result<Transaction> {
        let mut ledger = self.inner.write();
        let tx = ledger.factory().create(sender, receiver, amount)?;
        let tx = ledger.sign(&tx, key)?;
        ledger.insert(vec![tx.clone()])?;
        Ok(tx)
    }

    pub fn query_by_wallet(&self, wallet: &str) -> Vec<Transaction> {
        self.inner
            .read()
            .query_by_wallet(wallet)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn balance(&self, wallet: &str) -> Amount {
        self.inner.read().balance(wallet)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn verify_ledger(&self) -> bool {
        self.inner.read().verify_ledger()
    }

    pub fn integrity_report(&self) -> IntegrityReport {
        self.inner.read().integrity_report()
    }

    pub fn visualize_ledger(&self, options: &RenderOptions) -> String {
        self.inner.read().visualize_ledger(options)
    }

    pub fn to_snapshot(&self) -> LedgerSnapshot {
        self.inner.read().to_snapshot()
    }

    /// Runs `f` against a consistent view of the ledger.
    pub fn with_read<R>(&self, f: impl FnOnce(&Ledger) -> R) -> R {
        f(&self.inner.read())
    }
}
