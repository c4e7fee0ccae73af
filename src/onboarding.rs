//! Bootstrap flows: the one-time founder onboarding and repeatable standard
//! onboarding of member wallets.
//!
//! Each flow allocates a fractal position, generates a key pair, binds it in
//! the registry and appends a signed seed transaction. Registration and seed
//! are committed together; a failure leaves the ledger unchanged.

use crate::crypto::{KeyPair, Signer};
use crate::error::{LedgerError, Result};
use crate::fractal::FractalPosition;
use crate::ledger::Ledger;
use crate::transaction::{Amount, TransactionKind};
use crate::wallet::{WalletRecord, WalletRole};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnboardingPolicy {
    /// Minted into the foundational wallet by the genesis seed
    pub founder_supply: Amount,
    /// Moved from the foundational wallet to every new member
    pub initial_allocation: Amount,
}

impl Default for OnboardingPolicy {
    fn default() -> Self {
        OnboardingPolicy {
            founder_supply: Amount::from_num(1_000_000),
            initial_allocation: Amount::from_num(100),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FounderOnboarding {
    pub message: String,
    pub foundational_wallet: String,
    pub balance: Amount,
    pub key: KeyPair,
}

#[derive(Debug, Clone)]
pub struct StandardOnboarding {
    pub message: String,
    pub wallet: String,
    pub position: FractalPosition,
    pub initial_balance: Amount,
    pub key: KeyPair,
}

pub struct OnboardingController<'a> {
    ledger: &'a mut Ledger,
    policy: OnboardingPolicy,
}

impl<'a> OnboardingController<'a> {
    pub fn new(ledger: &'a mut Ledger, policy: OnboardingPolicy) -> Self {
        OnboardingController { ledger, policy }
    }

    pub fn policy(&self) -> &OnboardingPolicy {
        &self.policy
    }

    /// Creates the foundational wallet at the fractal root and mints the
    /// founder supply into it.
    pub fn founder_onboarding(&mut self) -> Result<FounderOnboarding> {
        if let Some(existing) = self.ledger.foundational_wallet() {
            return Err(LedgerError::FounderAlreadyExists(existing.address.clone()));
        }
        if let Some(genesis) = self
            .ledger
            .transactions()
            .iter()
            .find(|tx| tx.kind == TransactionKind::Genesis)
        {
            return Err(LedgerError::FounderAlreadyExists(genesis.receiver.clone()));
        }

        let address = self.ledger.addressing().encode_position(FractalPosition::ROOT)?;
        let key = KeyPair::generate()?;
        let genesis = self.ledger.factory().create_seed(
            TransactionKind::Genesis,
            &address,
            &address,
            self.policy.founder_supply,
        )?;

        let record = WalletRecord {
            address: address.clone(),
            level: 0,
            index: 0,
            role: WalletRole::Founder,
            public_key: key.public_identity_hex(),
            created_at: genesis.timestamp,
        };
        let genesis = self
            .ledger
            .engine()
            .sign(&genesis, &key, Some(&record.public_key))?;
        self.ledger.admit(record, genesis)?;

        let balance = self.ledger.balance(&address);
        info!(wallet = %address, %balance, "foundational wallet onboarded");

        Ok(FounderOnboarding {
            message: format!("Foundational wallet {} created with balance {}", address, balance),
            foundational_wallet: address,
            balance,
            key,
        })
    }

    /// Allocates the next free member position and funds it from the
    /// foundational wallet. `funder` must be the founder's key.
    pub fn standard_onboarding(&mut self, funder: &dyn Signer) -> Result<StandardOnboarding> {
        let founder = self
            .ledger
            .foundational_wallet()
            .map(|w| w.address.clone())
            .ok_or(LedgerError::NoFoundationalWallet)?;

        let addressing = *self.ledger.addressing();
        let position = self
            .ledger
            .registry()
            .next_free_position_excluding(&addressing, &self.ledger.seen_positions())
            .ok_or(LedgerError::AddressSpaceExhausted(addressing.max_depth))?;
        let address = addressing.encode_position(position)?;

        let allocation = self.ledger.factory().create_seed(
            TransactionKind::Allocation,
            &founder,
            &address,
            self.policy.initial_allocation,
        )?;
        let allocation = self.ledger.sign(&allocation, funder)?;

        let key = KeyPair::generate()?;
        let record = WalletRecord {
            address: address.clone(),
            level: position.level,
            index: position.index,
            role: WalletRole::Member,
            public_key: key.public_identity_hex(),
            created_at: allocation.timestamp,
        };
        self.ledger.admit(record, allocation)?;

        let initial_balance = self.ledger.balance(&address);
        info!(wallet = %address, %position, %initial_balance, "member wallet onboarded");

        Ok(StandardOnboarding {
            message: format!(
                "Wallet {} onboarded at {} with balance {}",
                address, position, initial_balance
            ),
            wallet: address,
            position,
            initial_balance,
            key,
        })
    }
}

impl Ledger {
    pub fn founder_onboarding(&mut self, policy: OnboardingPolicy) -> Result<FounderOnboarding> {
        OnboardingController::new(self, policy).founder_onboarding()
    }

    pub fn standard_onboarding(
        &mut self,
        policy: OnboardingPolicy,
        funder: &dyn Signer,
    ) -> Result<StandardOnboarding> {
        OnboardingController::new(self, policy).standard_onboarding(funder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fractal::FractalAddressing;

    #[test]
    fn test_founder_onboarding() {
        let mut ledger = Ledger::default();
        let founder = ledger.founder_onboarding(OnboardingPolicy::default()).unwrap();

        assert_eq!(founder.balance, Amount::from_num(1_000_000));
        assert_eq!(
            ledger.addressing().decode(&founder.foundational_wallet).unwrap(),
            (0, 0)
        );
        assert_eq!(
            ledger.registry().identity_of(&founder.foundational_wallet),
            Some(founder.key.public_identity_hex().as_str())
        );
        assert_eq!(ledger.len(), 1);
        assert!(ledger.verify_ledger());
    }

    #[test]
    fn test_second_founder_rejected() {
        let mut ledger = Ledger::default();
        ledger.founder_onboarding(OnboardingPolicy::default()).unwrap();
        let result = ledger.founder_onboarding(OnboardingPolicy::default());
        assert!(matches!(result, Err(LedgerError::FounderAlreadyExists(_))));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.registry().len(), 1);
    }

    #[test]
    fn test_standard_onboarding_needs_founder() {
        let mut ledger = Ledger::default();
        let key = KeyPair::generate().unwrap();
        let result = ledger.standard_onboarding(OnboardingPolicy::default(), &key);
        assert!(matches!(result, Err(LedgerError::NoFoundationalWallet)));
    }

    #[test]
    fn test_standard_onboarding_allocates_in_order() {
        let mut ledger = Ledger::default();
        let policy = OnboardingPolicy::default();
        let founder = ledger.founder_onboarding(policy).unwrap();

        let mut positions = Vec::new();
        for _ in 0..4 {
            let member = ledger.standard_onboarding(policy, &founder.key).unwrap();
            assert_eq!(member.initial_balance, Amount::from_num(100));
            positions.push(member.position);
        }
        assert_eq!(
            positions,
            vec![
                FractalPosition::new(1, 0),
                FractalPosition::new(1, 1),
                FractalPosition::new(1, 2),
                FractalPosition::new(2, 0),
            ]
        );
        assert_eq!(
            ledger.balance(&founder.foundational_wallet),
            Amount::from_num(1_000_000 - 400)
        );
        assert!(ledger.verify_ledger());
    }

    #[test]
    fn test_wrong_funder_key_rejected() {
        let mut ledger = Ledger::default();
        let policy = OnboardingPolicy::default();
        ledger.founder_onboarding(policy).unwrap();

        let impostor = KeyPair::generate().unwrap();
        let result = ledger.standard_onboarding(policy, &impostor);
        assert!(matches!(result, Err(LedgerError::UnauthorizedSigner(_))));
        assert_eq!(ledger.registry().len(), 1);
    }

    #[test]
    fn test_founder_cannot_overfund() {
        let mut ledger = Ledger::default();
        let policy = OnboardingPolicy {
            founder_supply: Amount::from_num(150),
            initial_allocation: Amount::from_num(100),
        };
        let founder = ledger.founder_onboarding(policy).unwrap();
        ledger.standard_onboarding(policy, &founder.key).unwrap();

        let result = ledger.standard_onboarding(policy, &founder.key);
        assert!(matches!(result, Err(LedgerError::InsufficientBalance(_))));
        assert_eq!(ledger.registry().len(), 2);
        assert_eq!(ledger.balance(&founder.foundational_wallet), Amount::from_num(50));
    }

    #[test]
    fn test_address_space_exhausted() {
        let mut ledger = Ledger::new(FractalAddressing::new(2, 1).unwrap());
        let policy = OnboardingPolicy::default();
        let founder = ledger.founder_onboarding(policy).unwrap();
        ledger.standard_onboarding(policy, &founder.key).unwrap();
        ledger.standard_onboarding(policy, &founder.key).unwrap();

        let result = ledger.standard_onboarding(policy, &founder.key);
        assert!(matches!(result, Err(LedgerError::AddressSpaceExhausted(1))));
    }

    #[test]
    fn test_onboarding_skips_addresses_already_in_log() {
        let mut ledger = Ledger::default();
        let policy = OnboardingPolicy::default();
        let founder = ledger.founder_onboarding(policy).unwrap();
        let first = ledger.standard_onboarding(policy, &founder.key).unwrap();

        let credited = ledger.addressing().encode(1, 1).unwrap();
        let tx = ledger
            .factory()
            .create(&first.wallet, &credited, Amount::from_num(10))
            .unwrap();
        let tx = ledger.sign(&tx, &first.key).unwrap();
        ledger.insert(vec![tx]).unwrap();

        let second = ledger.standard_onboarding(policy, &founder.key).unwrap();
        assert_eq!(second.position, FractalPosition::new(1, 2));
        assert_ne!(second.wallet, credited);
        assert_eq!(second.initial_balance, policy.initial_allocation);
        assert!(!ledger.registry().contains(&credited));
        assert!(ledger.verify_ledger());
    }
}
