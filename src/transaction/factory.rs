//! Builds unsigned, canonically identified transactions.

use super::types::{Amount, Transaction, TransactionKind};
use crate::error::{LedgerError, Result};
use crate::fractal::FractalAddressing;

/// Converts a boundary `f64` into an [`Amount`], rejecting NaN, infinities,
/// negatives and values outside the fixed-point range.
pub fn amount_from_f64(value: f64) -> Result<Amount> {
    let amount = Amount::checked_from_num(value).ok_or_else(|| {
        LedgerError::InvalidAmount(format!("{} is not representable as an amount", value))
    })?;
    if amount < Amount::ZERO {
        return Err(LedgerError::InvalidAmount(format!(
            "amount cannot be negative, got {}",
            value
        )));
    }
    Ok(amount)
}

/// Field-level rules shared by the factory and ledger insertion.
pub(crate) fn validate_fields(
    addressing: &FractalAddressing,
    kind: TransactionKind,
    sender: &str,
    receiver: &str,
    amount: Amount,
) -> Result<()> {
    if amount < Amount::ZERO {
        return Err(LedgerError::InvalidAmount(format!(
            "amount cannot be negative, got {}",
            amount
        )));
    }
    if amount == Amount::ZERO && !kind.is_seed() {
        return Err(LedgerError::InvalidAmount(
            "zero-amount transactions are reserved for onboarding seeds".to_string(),
        ));
    }

    match kind {
        TransactionKind::Genesis if sender != receiver => {
            return Err(LedgerError::InvalidParty(
                "genesis seed must credit its own sender".to_string(),
            ))
        }
        TransactionKind::Transfer | TransactionKind::Allocation if sender == receiver => {
            return Err(LedgerError::InvalidParty(format!(
                "sender and receiver cannot be the same ({})",
                sender
            )))
        }
        _ => {}
    }

    addressing.decode_position(sender)?;
    addressing.decode_position(receiver)?;
    Ok(())
}

/// Issues transactions with monotonically non-decreasing timestamps.
#[derive(Debug, Clone)]
pub struct TransactionFactory {
    addressing: FractalAddressing,
    last_timestamp: u64,
}

impl TransactionFactory {
    pub fn new(addressing: FractalAddressing) -> Self {
        TransactionFactory {
            addressing,
            last_timestamp: 0,
        }
    }

    /// A factory whose first timestamp is no earlier than `timestamp`.
    pub fn resume_after(addressing: FractalAddressing, timestamp: u64) -> Self {
        TransactionFactory {
            addressing,
            last_timestamp: timestamp,
        }
    }

    /// Unsigned transfer between two distinct wallets.
    pub fn create(&mut self, sender: &str, receiver: &str, amount: Amount) -> Result<Transaction> {
        let timestamp = self.next_timestamp();
        self.create_at(TransactionKind::Transfer, sender, receiver, amount, timestamp)
    }

    /// Unsigned onboarding seed. Zero amounts are allowed here.
    pub fn create_seed(
        &mut self,
        kind: TransactionKind,
        sender: &str,
        receiver: &str,
        amount: Amount,
    ) -> Result<Transaction> {
        if !kind.is_seed() {
            return Err(LedgerError::InvalidParty(
                "seed transactions must be genesis or allocation".to_string(),
            ));
        }
        let timestamp = self.next_timestamp();
        self.create_at(kind, sender, receiver, amount, timestamp)
    }

    /// Validates the fields and derives the id for an explicit timestamp.
    pub fn create_at(
        &self,
        kind: TransactionKind,
        sender: &str,
        receiver: &str,
        amount: Amount,
        timestamp: u64,
    ) -> Result<Transaction> {
        validate_fields(&self.addressing, kind, sender, receiver, amount)?;

        let mut tx = Transaction {
            id: String::new(),
            kind,
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
            timestamp,
            signature: None,
            public_key: None,
        };
        tx.id = tx.compute_id();
        Ok(tx)
    }

    pub fn last_timestamp(&self) -> u64 {
        self.last_timestamp
    }

    fn next_timestamp(&mut self) -> u64 {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        self.last_timestamp = now.max(self.last_timestamp);
        self.last_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addresses() -> (FractalAddressing, String, String) {
        let addressing = FractalAddressing::default();
        let a = addressing.encode(1, 0).unwrap();
        let b = addressing.encode(1, 1).unwrap();
        (addressing, a, b)
    }

    #[test]
    fn test_create_transfer() {
        let (addressing, a, b) = addresses();
        let mut factory = TransactionFactory::new(addressing);
        let tx = factory.create(&a, &b, Amount::from_num(5)).unwrap();
        assert_eq!(tx.kind, TransactionKind::Transfer);
        assert_eq!(tx.id, tx.compute_id());
        assert!(!tx.is_signed());
    }

    #[test]
    fn test_negative_amount_rejected() {
        let (addressing, a, b) = addresses();
        let mut factory = TransactionFactory::new(addressing);
        let result = factory.create(&a, &b, Amount::from_num(-1));
        assert!(matches!(result, Err(LedgerError::InvalidAmount(_))));
    }

    #[test]
    fn test_zero_amount_only_for_seeds() {
        let (addressing, a, b) = addresses();
        let mut factory = TransactionFactory::new(addressing);
        assert!(matches!(
            factory.create(&a, &b, Amount::ZERO),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(factory
            .create_seed(TransactionKind::Allocation, &a, &b, Amount::ZERO)
            .is_ok());
    }

    #[test]
    fn test_self_transfer_rejected() {
        let (addressing, a, _) = addresses();
        let mut factory = TransactionFactory::new(addressing);
        assert!(matches!(
            factory.create(&a, &a, Amount::from_num(1)),
            Err(LedgerError::InvalidParty(_))
        ));
        assert!(factory
            .create_seed(TransactionKind::Genesis, &a, &a, Amount::from_num(1))
            .is_ok());
    }

    #[test]
    fn test_genesis_must_be_self_credit() {
        let (addressing, a, b) = addresses();
        let mut factory = TransactionFactory::new(addressing);
        assert!(matches!(
            factory.create_seed(TransactionKind::Genesis, &a, &b, Amount::from_num(1)),
            Err(LedgerError::InvalidParty(_))
        ));
    }

    #[test]
    fn test_malformed_party_rejected() {
        let (addressing, a, _) = addresses();
        let mut factory = TransactionFactory::new(addressing);
        assert!(matches!(
            factory.create(&a, "bob", Amount::from_num(1)),
            Err(LedgerError::MalformedAddress(_))
        ));
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let (addressing, a, b) = addresses();
        let future = chrono::Utc::now().timestamp_millis() as u64 + 60_000;
        let mut factory = TransactionFactory::resume_after(addressing, future);
        let first = factory.create(&a, &b, Amount::from_num(1)).unwrap();
        let second = factory.create(&a, &b, Amount::from_num(2)).unwrap();
        assert_eq!(first.timestamp, future);
        assert!(second.timestamp >= first.timestamp);
    }

    #[test]
    fn test_amount_from_f64() {
        assert_eq!(amount_from_f64(2.5).unwrap(), Amount::from_num(2.5));
        assert!(matches!(amount_from_f64(-1.0), Err(LedgerError::InvalidAmount(_))));
        assert!(matches!(amount_from_f64(f64::NAN), Err(LedgerError::InvalidAmount(_))));
        assert!(matches!(amount_from_f64(1e30), Err(LedgerError::InvalidAmount(_))));
    }
}
