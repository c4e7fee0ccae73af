//! Transaction module split into types and the factory that builds them

pub mod factory;
pub mod types;

pub use factory::{amount_from_f64, TransactionFactory};
pub use types::*;
