use crate::crypto::Signer;
use crate::error::{LedgerError, Result};
use crate::fractal::{FractalAddressing, FractalPosition};
use crate::signature::SignatureEngine;
use crate::transaction::factory::validate_fields;
use crate::transaction::{Amount, Transaction, TransactionFactory, TransactionKind};
use crate::wallet::{WalletRecord, WalletRegistry, WalletRole};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Append-only transaction log with per-wallet indexes and balances.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub(crate) addressing: FractalAddressing,
    pub(crate) engine: SignatureEngine,
    pub(crate) transactions: Vec<Transaction>,
    pub(crate) ids: HashMap<String, usize>,
    pub(crate) wallet_index: HashMap<String, Vec<usize>>,
    pub(crate) balances: HashMap<String, Amount>,
    pub(crate) registry: WalletRegistry,
}

impl Default for Ledger {
    fn default() -> Self {
        Ledger::new(FractalAddressing::default())
    }
}

impl Ledger {
    pub fn new(addressing: FractalAddressing) -> Self {
        Ledger::with_engine(addressing, SignatureEngine::default())
    }

    pub fn with_engine(addressing: FractalAddressing, engine: SignatureEngine) -> Self {
        Ledger {
            addressing,
            engine,
            transactions: Vec::new(),
            ids: HashMap::new(),
            wallet_index: HashMap::new(),
            balances: HashMap::new(),
            registry: WalletRegistry::new(),
        }
    }

    pub fn addressing(&self) -> &FractalAddressing {
        &self.addressing
    }

    pub fn engine(&self) -> &SignatureEngine {
        &self.engine
    }

    pub fn registry(&self) -> &WalletRegistry {
        &self.registry
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    pub fn foundational_wallet(&self) -> Option<&WalletRecord> {
        self.registry.founder()
    }

    pub fn latest_timestamp(&self) -> u64 {
        self.transactions
            .iter()
            .map(|tx| tx.timestamp)
            .max()
            .unwrap_or(0)
    }

    /// A factory that continues the log's timestamp sequence.
    pub fn factory(&self) -> TransactionFactory {
        TransactionFactory::resume_after(self.addressing, self.latest_timestamp())
    }

    /// Signs `tx` with `key`, which must be the key bound to `tx.sender`.
    pub fn sign(&self, tx: &Transaction, key: &dyn Signer) -> Result<Transaction> {
        self.engine
            .sign(tx, key, self.registry.identity_of(&tx.sender))
    }

    /// Positions of every address the log mentions, registered or not.
    pub fn seen_positions(&self) -> BTreeSet<FractalPosition> {
        self.wallet_index
            .keys()
            .filter_map(|address| self.addressing.decode_position(address).ok())
            .collect()
    }

    /// Transactions where `wallet` is sender or receiver, in insertion order.
    pub fn query_by_wallet(&self, wallet: &str) -> Vec<&Transaction> {
        self.wallet_index
            .get(wallet)
            .map(|positions| positions.iter().map(|&i| &self.transactions[i]).collect())
            .unwrap_or_default()
    }

    pub fn balance(&self, wallet: &str) -> Amount {
        self.balances.get(wallet).copied().unwrap_or(Amount::ZERO)
    }

    /// Every address that appears in the log, with its balance.
    pub fn balances(&self) -> impl Iterator<Item = (&str, Amount)> {
        self.balances.iter().map(|(wallet, amount)| (wallet.as_str(), *amount))
    }

    /// Appends a batch. Either every transaction is accepted or none is.
    pub fn insert(&mut self, transactions: Vec<Transaction>) -> Result<()> {
        self.validate_batch(&transactions, None)?;
        let count = transactions.len();
        for tx in transactions {
            self.apply(tx);
        }
        debug!(count, total = self.transactions.len(), "inserted transaction batch");
        Ok(())
    }

    /// Registers `wallet` and appends its seed transaction as one unit.
    pub(crate) fn admit(&mut self, wallet: WalletRecord, seed: Transaction) -> Result<()> {
        let mut registry = self.registry.clone();
        registry.register(wallet.clone())?;
        self.validate_batch(std::slice::from_ref(&seed), Some(&wallet))?;
        self.registry = registry;
        self.apply(seed);
        Ok(())
    }

    fn validate_batch(&self, batch: &[Transaction], pending: Option<&WalletRecord>) -> Result<()> {
        let mut staged: HashMap<&str, Amount> = HashMap::new();
        let mut batch_ids: HashSet<&str> = HashSet::new();
        let mut genesis_seen = self
            .transactions
            .iter()
            .any(|tx| tx.kind == TransactionKind::Genesis);

        let role_of = |address: &str| {
            pending
                .filter(|w| w.address == address)
                .or_else(|| self.registry.get(address))
                .map(|w| w.role)
        };

        for tx in batch {
            if !tx.is_signed() {
                return Err(LedgerError::UnsignedTransaction(format!(
                    "transaction {} has no signature",
                    tx.short_id()
                )));
            }
            if !self.engine.verify(tx) {
                return Err(LedgerError::UnsignedTransaction(format!(
                    "signature on {} does not verify",
                    tx.short_id()
                )));
            }

            validate_fields(&self.addressing, tx.kind, &tx.sender, &tx.receiver, tx.amount)?;

            let bound = pending
                .filter(|w| w.address == tx.sender)
                .map(|w| w.public_key.as_str())
                .or_else(|| self.registry.identity_of(&tx.sender));
            if bound.is_none() || bound != tx.public_key.as_deref() {
                return Err(LedgerError::UnauthorizedSigner(format!(
                    "{} is not signed by the key bound to {}",
                    tx.short_id(),
                    tx.sender
                )));
            }

            if self.ids.contains_key(&tx.id) || !batch_ids.insert(tx.id.as_str()) {
                return Err(LedgerError::DuplicateTransaction(tx.id.clone()));
            }

            match tx.kind {
                TransactionKind::Genesis => {
                    if genesis_seen {
                        return Err(LedgerError::FounderAlreadyExists(tx.receiver.clone()));
                    }
                    if role_of(&tx.receiver) != Some(WalletRole::Founder) {
                        return Err(LedgerError::InvalidParty(format!(
                            "genesis must credit the foundational wallet, not {}",
                            tx.receiver
                        )));
                    }
                    genesis_seen = true;
                }
                TransactionKind::Allocation => {
                    if role_of(&tx.sender) != Some(WalletRole::Founder) {
                        return Err(LedgerError::InvalidParty(format!(
                            "allocations must be funded by the foundational wallet, not {}",
                            tx.sender
                        )));
                    }
                }
                TransactionKind::Transfer => {}
            }

            if tx.kind != TransactionKind::Genesis {
                let current = staged
                    .get(tx.sender.as_str())
                    .copied()
                    .unwrap_or_else(|| self.balance(&tx.sender));
                let remaining = current
                    .checked_sub(tx.amount)
                    .filter(|remaining| *remaining >= Amount::ZERO)
                    .ok_or_else(|| {
                        LedgerError::InsufficientBalance(format!(
                            "{} holds {} but {} sends {}",
                            tx.sender,
                            current,
                            tx.short_id(),
                            tx.amount
                        ))
                    })?;
                staged.insert(tx.sender.as_str(), remaining);
            }

            let credited = staged
                .get(tx.receiver.as_str())
                .copied()
                .unwrap_or_else(|| self.balance(&tx.receiver))
                .checked_add(tx.amount)
                .ok_or_else(|| {
                    LedgerError::InvalidAmount(format!(
                        "crediting {} to {} overflows",
                        tx.amount, tx.receiver
                    ))
                })?;
            staged.insert(tx.receiver.as_str(), credited);
        }
        Ok(())
    }

    /// Appends without validation and updates the derived indexes.
    pub(crate) fn apply(&mut self, tx: Transaction) {
        let position = self.transactions.len();
        self.ids.insert(tx.id.clone(), position);

        let mut parties = vec![tx.sender.clone()];
        if tx.receiver != tx.sender {
            parties.push(tx.receiver.clone());
        }
        for wallet in parties {
            let delta = tx.balance_delta(&wallet);
            let balance = self.balances.entry(wallet.clone()).or_insert(Amount::ZERO);
            *balance = balance.saturating_add(delta);
            self.wallet_index.entry(wallet).or_default().push(position);
        }

        self.transactions.push(tx);
    }
}
