/// Transaction types for the Sierpinski ledger
use fixed::types::I32F32;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Deterministic fixed-point quantity used for amounts and balances.
pub type Amount = I32F32;

/// Domain tag at the start of every canonical encoding.
const CANONICAL_TAG: &[u8] = b"SPK-TX/1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Value moving between two wallets.
    Transfer,
    /// Founder seed: credits the foundational wallet without a matching debit.
    Genesis,
    /// Standard onboarding seed: the founder funds a newly allocated wallet.
    Allocation,
}

impl TransactionKind {
    fn tag(&self) -> u8 {
        match self {
            TransactionKind::Transfer => 0,
            TransactionKind::Genesis => 1,
            TransactionKind::Allocation => 2,
        }
    }

    pub fn is_seed(&self) -> bool {
        !matches!(self, TransactionKind::Transfer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Transfer => "transfer",
            TransactionKind::Genesis => "genesis",
            TransactionKind::Allocation => "allocation",
        }
    }
}

/// An immutable ledger record. `signature` and `public_key` stay `None` until
/// the transaction is signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub kind: TransactionKind,
    pub sender: String,
    pub receiver: String,
    pub amount: Amount,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub signature: Option<String>,
    pub public_key: Option<String>,
}

impl Transaction {
    /// Bytes covered by both the id and the signature.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical_encoding(
            self.kind,
            &self.sender,
            &self.receiver,
            self.amount,
            self.timestamp,
        )
    }

    /// Recomputes the id from the canonical fields.
    pub fn compute_id(&self) -> String {
        hex::encode(Sha256::digest(self.canonical_bytes()))
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some() && self.public_key.is_some()
    }

    pub fn involves(&self, wallet: &str) -> bool {
        self.sender == wallet || self.receiver == wallet
    }

    /// Effect of this transaction on `wallet`'s balance. Genesis seeds mint:
    /// they credit the receiver and never debit the sender.
    pub fn balance_delta(&self, wallet: &str) -> Amount {
        let mut delta = Amount::ZERO;
        if self.receiver == wallet {
            delta += self.amount;
        }
        if self.sender == wallet && self.kind != TransactionKind::Genesis {
            delta -= self.amount;
        }
        delta
    }

    /// Short id for log lines and tables.
    pub fn short_id(&self) -> &str {
        let end = self.id.len().min(12);
        self.id.get(..end).unwrap_or(&self.id)
    }
}

pub(crate) fn canonical_encoding(
    kind: TransactionKind,
    sender: &str,
    receiver: &str,
    amount: Amount,
    timestamp: u64,
) -> Vec<u8> {
    let mut message = Vec::with_capacity(CANONICAL_TAG.len() + sender.len() + receiver.len() + 25);
    message.extend_from_slice(CANONICAL_TAG);
    message.push(kind.tag());
    message.extend_from_slice(&(sender.len() as u32).to_le_bytes());
    message.extend_from_slice(sender.as_bytes());
    message.extend_from_slice(&(receiver.len() as u32).to_le_bytes());
    message.extend_from_slice(receiver.as_bytes());
    message.extend_from_slice(&amount.to_bits().to_le_bytes());
    message.extend_from_slice(&timestamp.to_le_bytes());
    message
}
