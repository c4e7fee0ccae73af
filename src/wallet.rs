//! Wallet registry: which fractal positions are populated and which public
//! key each onboarded address is bound to.

use crate::error::{LedgerError, Result};
use crate::fractal::{FractalAddressing, FractalPosition};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletRole {
    Founder,
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub address: String,
    pub level: u32,
    pub index: u64,
    pub role: WalletRole,
    /// Hex compressed public key bound to this address
    pub public_key: String,
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
}

impl WalletRecord {
    pub fn position(&self) -> FractalPosition {
        FractalPosition::new(self.level, self.index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletRegistry {
    wallets: BTreeMap<String, WalletRecord>,
    positions: BTreeMap<FractalPosition, String>,
}

impl WalletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record; its address and position must both be unused.
    pub fn register(&mut self, record: WalletRecord) -> Result<()> {
        if self.wallets.contains_key(&record.address) {
            return Err(LedgerError::InvalidParty(format!(
                "wallet {} is already registered",
                record.address
            )));
        }
        if let Some(existing) = self.positions.get(&record.position()) {
            return Err(LedgerError::InvalidPosition(format!(
                "position {} is already held by {}",
                record.position(),
                existing
            )));
        }
        if record.role == WalletRole::Founder && self.founder().is_some() {
            return Err(LedgerError::FounderAlreadyExists(record.address));
        }
        self.positions
            .insert(record.position(), record.address.clone());
        self.wallets.insert(record.address.clone(), record);
        Ok(())
    }

    pub fn get(&self, address: &str) -> Option<&WalletRecord> {
        self.wallets.get(address)
    }

    pub fn identity_of(&self, address: &str) -> Option<&str> {
        self.wallets.get(address).map(|w| w.public_key.as_str())
    }

    pub fn founder(&self) -> Option<&WalletRecord> {
        self.wallets
            .values()
            .find(|w| w.role == WalletRole::Founder)
    }

    pub fn founders(&self) -> impl Iterator<Item = &WalletRecord> {
        self.wallets
            .values()
            .filter(|w| w.role == WalletRole::Founder)
    }

    pub fn at(&self, position: FractalPosition) -> Option<&WalletRecord> {
        self.positions
            .get(&position)
            .and_then(|address| self.wallets.get(address))
    }

    pub fn is_populated(&self, position: FractalPosition) -> bool {
        self.positions.contains_key(&position)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.wallets.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Records ordered by position, shallowest first.
    pub fn by_position(&self) -> impl Iterator<Item = &WalletRecord> {
        self.positions
            .values()
            .filter_map(move |address| self.wallets.get(address))
    }

    /// Unordered records keyed by address.
    pub fn records(&self) -> impl Iterator<Item = &WalletRecord> {
        self.wallets.values()
    }

    pub fn populated_at(&self, level: u32) -> usize {
        self.positions
            .range(FractalPosition::new(level, 0)..=FractalPosition::new(level, u64::MAX))
            .count()
    }

    /// Next free member position: shallowest level below the root first, then
    /// the lowest unused index on that level.
    pub fn next_free_position(&self, addressing: &FractalAddressing) -> Option<FractalPosition> {
        self.next_free_position_excluding(addressing, &BTreeSet::new())
    }

    /// Like [`WalletRegistry::next_free_position`], also skipping `reserved`
    /// positions. Only children of populated triangles are candidates, so the
    /// hierarchy never gains an orphan.
    pub fn next_free_position_excluding(
        &self,
        addressing: &FractalAddressing,
        reserved: &BTreeSet<FractalPosition>,
    ) -> Option<FractalPosition> {
        let branching = u64::from(addressing.branching_factor);
        for level in 1..=addressing.max_depth {
            let parents = self
                .positions
                .range(FractalPosition::new(level - 1, 0)..=FractalPosition::new(level - 1, u64::MAX))
                .map(|(position, _)| position.index);
            for parent in parents {
                let first = parent.checked_mul(branching)?;
                let free = (first..first + branching)
                    .map(|index| FractalPosition::new(level, index))
                    .find(|position| !self.is_populated(*position) && !reserved.contains(position));
                if free.is_some() {
                    return free;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(addressing: &FractalAddressing, level: u32, index: u64, role: WalletRole) -> WalletRecord {
        WalletRecord {
            address: addressing.encode(level, index).unwrap(),
            level,
            index,
            role,
            public_key: format!("key-{}-{}", level, index),
            created_at: 0,
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let addressing = FractalAddressing::default();
        let mut registry = WalletRegistry::new();
        let founder = record(&addressing, 0, 0, WalletRole::Founder);
        registry.register(founder.clone()).unwrap();

        assert_eq!(registry.founder(), Some(&founder));
        assert_eq!(registry.identity_of(&founder.address), Some("key-0-0"));
        assert!(registry.is_populated(FractalPosition::ROOT));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let addressing = FractalAddressing::default();
        let mut registry = WalletRegistry::new();
        registry
            .register(record(&addressing, 1, 0, WalletRole::Member))
            .unwrap();
        assert!(registry
            .register(record(&addressing, 1, 0, WalletRole::Member))
            .is_err());
    }

    #[test]
    fn test_second_founder_rejected() {
        let addressing = FractalAddressing::default();
        let mut registry = WalletRegistry::new();
        registry
            .register(record(&addressing, 0, 0, WalletRole::Founder))
            .unwrap();
        let result = registry.register(record(&addressing, 1, 0, WalletRole::Founder));
        assert!(matches!(result, Err(LedgerError::FounderAlreadyExists(_))));
    }

    #[test]
    fn test_allocation_order_is_shallowest_then_lowest() {
        let addressing = FractalAddressing::new(3, 2).unwrap();
        let mut registry = WalletRegistry::new();
        registry
            .register(record(&addressing, 0, 0, WalletRole::Founder))
            .unwrap();

        let mut allocated = Vec::new();
        while let Some(position) = registry.next_free_position(&addressing) {
            allocated.push(position);
            registry
                .register(record(&addressing, position.level, position.index, WalletRole::Member))
                .unwrap();
        }

        assert_eq!(allocated.len(), 3 + 9);
        assert_eq!(allocated[0], FractalPosition::new(1, 0));
        assert_eq!(allocated[2], FractalPosition::new(1, 2));
        assert_eq!(allocated[3], FractalPosition::new(2, 0));
        assert_eq!(allocated[11], FractalPosition::new(2, 8));
    }

    #[test]
    fn test_next_free_fills_gaps() {
        let addressing = FractalAddressing::default();
        let mut registry = WalletRegistry::new();
        registry
            .register(record(&addressing, 0, 0, WalletRole::Founder))
            .unwrap();
        registry
            .register(record(&addressing, 1, 0, WalletRole::Member))
            .unwrap();
        registry
            .register(record(&addressing, 1, 2, WalletRole::Member))
            .unwrap();
        assert_eq!(
            registry.next_free_position(&addressing),
            Some(FractalPosition::new(1, 1))
        );
        assert_eq!(registry.populated_at(1), 2);
    }

    #[test]
    fn test_next_free_skips_reserved_and_orphans() {
        let addressing = FractalAddressing::default();
        let mut registry = WalletRegistry::new();
        assert_eq!(registry.next_free_position(&addressing), None);

        registry
            .register(record(&addressing, 0, 0, WalletRole::Founder))
            .unwrap();
        registry
            .register(record(&addressing, 1, 0, WalletRole::Member))
            .unwrap();
        let reserved: BTreeSet<_> = [FractalPosition::new(1, 1), FractalPosition::new(1, 2)]
            .into_iter()
            .collect();
        // (1, 1) and (1, 2) are taken, so allocation descends below (1, 0) only.
        assert_eq!(
            registry.next_free_position_excluding(&addressing, &reserved),
            Some(FractalPosition::new(2, 0))
        );
    }
}
