//! The ledger: transaction log, derived indexes, snapshots and integrity checks

pub mod shared;
pub mod snapshot;
pub mod store;
pub mod verify;

pub use shared::SharedLedger;
pub use snapshot::{LedgerSnapshot, SNAPSHOT_VERSION};
pub use store::Ledger;
pub use verify::{IntegrityReport, IntegrityVerifier, Violation};
