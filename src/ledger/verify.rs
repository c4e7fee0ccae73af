//! Whole-ledger integrity checking.
//!
//! The verifier replays the log from the beginning and never consults the
//! clock, so the same log always produces the same verdict. It reports; it
//! does not repair.

use super::store::Ledger;
use crate::transaction::factory::validate_fields;
use crate::transaction::{Amount, TransactionKind};
use crate::wallet::WalletRole;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    InvalidSignature { id: String },
    UnboundSigner { id: String, sender: String },
    DuplicateId { id: String },
    InvalidFields { id: String, reason: String },
    NegativeBalance { id: String, wallet: String, balance: Amount },
    BalanceOverflow { id: String, wallet: String },
    MultipleGenesis { id: String },
    InvalidSeed { id: String, reason: String },
    MultipleFounders { count: usize },
    FounderNotAtRoot { address: String },
    FounderWithoutGenesis { address: String },
    PositionMismatch { address: String },
    OrphanWallet { address: String },
    BalanceDrift { wallet: String, recorded: Amount, replayed: Amount },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Violation::InvalidSignature { id } => write!(f, "transaction {} has an invalid signature", id),
            Violation::UnboundSigner { id, sender } => {
                write!(f, "transaction {} is not signed by the key bound to {}", id, sender)
            }
            Violation::DuplicateId { id } => write!(f, "transaction id {} appears more than once", id),
            Violation::InvalidFields { id, reason } => write!(f, "transaction {}: {}", id, reason),
            Violation::NegativeBalance { id, wallet, balance } => {
                write!(f, "transaction {} drives {} negative ({})", id, wallet, balance)
            }
            Violation::BalanceOverflow { id, wallet } => {
                write!(f, "transaction {} overflows the balance of {}", id, wallet)
            }
            Violation::MultipleGenesis { id } => write!(f, "transaction {} is a second genesis", id),
            Violation::InvalidSeed { id, reason } => write!(f, "seed transaction {}: {}", id, reason),
            Violation::MultipleFounders { count } => write!(f, "{} foundational wallets registered", count),
            Violation::FounderNotAtRoot { address } => {
                write!(f, "foundational wallet {} is not at the fractal root", address)
            }
            Violation::FounderWithoutGenesis { address } => {
                write!(f, "foundational wallet {} has no genesis transaction", address)
            }
            Violation::PositionMismatch { address } => {
                write!(f, "wallet {} does not match its recorded position", address)
            }
            Violation::OrphanWallet { address } => {
                write!(f, "wallet {} has no populated parent triangle", address)
            }
            Violation::BalanceDrift { wallet, recorded, replayed } => write!(
                f,
                "balance of {} is {} but the log replays to {}",
                wallet, recorded, replayed
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub transactions_checked: usize,
    pub wallets_checked: usize,
    pub violations: Vec<Violation>,
}

impl IntegrityReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

pub struct IntegrityVerifier<'a> {
    ledger: &'a Ledger,
}

impl<'a> IntegrityVerifier<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        IntegrityVerifier { ledger }
    }

    pub fn verify(&self) -> bool {
        self.report().is_valid()
    }

    pub fn report(&self) -> IntegrityReport {
        let mut report = IntegrityReport {
            transactions_checked: self.ledger.transactions.len(),
            wallets_checked: self.ledger.registry.len(),
            violations: Vec::new(),
        };
        self.check_log(&mut report.violations);
        self.check_founder(&mut report.violations);
        self.check_hierarchy(&mut report.violations);

        for violation in &report.violations {
            warn!(%violation, "ledger integrity violation");
        }
        report
    }

    fn check_log(&self, violations: &mut Vec<Violation>) {
        let ledger = self.ledger;
        let registry = &ledger.registry;
        let mut seen = HashSet::new();
        let mut genesis_seen = false;
        let mut replayed: HashMap<&str, Amount> = HashMap::new();

        for tx in &ledger.transactions {
            let id = tx.short_id().to_string();

            if !ledger.engine.verify(tx) {
                violations.push(Violation::InvalidSignature { id: id.clone() });
            }
            if registry.identity_of(&tx.sender).is_none()
                || registry.identity_of(&tx.sender) != tx.public_key.as_deref()
            {
                violations.push(Violation::UnboundSigner {
                    id: id.clone(),
                    sender: tx.sender.clone(),
                });
            }
            if !seen.insert(tx.id.as_str()) {
                violations.push(Violation::DuplicateId { id: id.clone() });
            }
            if let Err(e) = validate_fields(&ledger.addressing, tx.kind, &tx.sender, &tx.receiver, tx.amount) {
                violations.push(Violation::InvalidFields {
                    id: id.clone(),
                    reason: e.to_string(),
                });
            }

            let sender_role = registry.get(&tx.sender).map(|w| w.role);
            match tx.kind {
                TransactionKind::Genesis => {
                    if genesis_seen {
                        violations.push(Violation::MultipleGenesis { id: id.clone() });
                    }
                    genesis_seen = true;
                    if tx.sender != tx.receiver || sender_role != Some(WalletRole::Founder) {
                        violations.push(Violation::InvalidSeed {
                            id: id.clone(),
                            reason: "genesis must be a self-credit of the foundational wallet".to_string(),
                        });
                    }
                }
                TransactionKind::Allocation => {
                    if sender_role != Some(WalletRole::Founder) {
                        violations.push(Violation::InvalidSeed {
                            id: id.clone(),
                            reason: "allocation is not funded by the foundational wallet".to_string(),
                        });
                    }
                }
                TransactionKind::Transfer => {}
            }

            let mut parties = vec![tx.sender.as_str()];
            if tx.receiver != tx.sender {
                parties.push(tx.receiver.as_str());
            }
            for wallet in parties {
                let delta = tx.balance_delta(wallet);
                let balance = replayed.entry(wallet).or_insert(Amount::ZERO);
                match balance.checked_add(delta) {
                    Some(next) => *balance = next,
                    None => {
                        violations.push(Violation::BalanceOverflow {
                            id: id.clone(),
                            wallet: wallet.to_string(),
                        });
                        continue;
                    }
                }
                if *balance < Amount::ZERO {
                    violations.push(Violation::NegativeBalance {
                        id: id.clone(),
                        wallet: wallet.to_string(),
                        balance: *balance,
                    });
                }
            }
        }

        let wallets: HashSet<&str> = replayed
            .keys()
            .copied()
            .chain(ledger.balances.keys().map(String::as_str))
            .collect();
        let mut drift: Vec<Violation> = wallets
            .into_iter()
            .filter_map(|wallet| {
                let recorded = ledger.balance(wallet);
                let replayed = replayed.get(wallet).copied().unwrap_or(Amount::ZERO);
                (recorded != replayed).then(|| Violation::BalanceDrift {
                    wallet: wallet.to_string(),
                    recorded,
                    replayed,
                })
            })
            .collect();
        drift.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        violations.extend(drift);
    }

    fn check_founder(&self, violations: &mut Vec<Violation>) {
        let ledger = self.ledger;
        let founders: Vec<_> = ledger.registry.founders().collect();
        if founders.len() > 1 {
            violations.push(Violation::MultipleFounders {
                count: founders.len(),
            });
        }
        for founder in founders {
            if !founder.position().is_root() {
                violations.push(Violation::FounderNotAtRoot {
                    address: founder.address.clone(),
                });
            }
            let has_genesis = ledger
                .transactions
                .iter()
                .any(|tx| tx.kind == TransactionKind::Genesis && tx.receiver == founder.address);
            if !has_genesis {
                violations.push(Violation::FounderWithoutGenesis {
                    address: founder.address.clone(),
                });
            }
        }
    }

    fn check_hierarchy(&self, violations: &mut Vec<Violation>) {
        let addressing = &self.ledger.addressing;
        let registry = &self.ledger.registry;
        for wallet in registry.by_position() {
            match addressing.decode_position(&wallet.address) {
                Ok(position) if position == wallet.position() => {}
                _ => {
                    violations.push(Violation::PositionMismatch {
                        address: wallet.address.clone(),
                    });
                    continue;
                }
            }
            if let Some(parent) = addressing.parent(wallet.position()) {
                if !registry.is_populated(parent) {
                    violations.push(Violation::OrphanWallet {
                        address: wallet.address.clone(),
                    });
                }
            }
        }
    }
}

impl Ledger {
    /// `true` iff the log replays without a single integrity violation.
    pub fn verify_ledger(&self) -> bool {
        IntegrityVerifier::new(self).verify()
    }

    pub fn integrity_report(&self) -> IntegrityReport {
        IntegrityVerifier::new(self).report()
    }
}
