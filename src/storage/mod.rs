mod error;
mod queries;
mod repository;
mod transfer_tx;

pub use error::*;
pub use queries::*;
pub use repository::*;
pub use transfer_tx::*;

/// SQL migration for the initial schema (accounts, entries, transfers)
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");
