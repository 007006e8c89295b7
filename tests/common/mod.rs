// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use microbank::application::BankService;
use microbank::domain::{Account, Cents};
use microbank::storage::{Store, StoreConfig};
use tempfile::TempDir;

/// Helper to create a migrated store on a temporary database
pub async fn test_store() -> Result<(Store, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let config = StoreConfig {
        max_connections: 8,
        ..StoreConfig::for_path(db_path.to_str().unwrap())
    };
    let store = Store::init(&config).await?;
    Ok((store, temp_dir))
}

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(BankService, TempDir)> {
    let (store, temp_dir) = test_store().await?;
    Ok((BankService::new(store), temp_dir))
}

/// Open an EUR account for `owner` holding `balance`
pub async fn open_account(store: &Store, owner: &str, balance: Cents) -> Result<Account> {
    Ok(store.create_account(owner, "EUR", balance).await?)
}

/// Count rows in a table, bypassing the store API
pub async fn count_rows(store: &Store, table: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(store.pool())
        .await?;
    Ok(count)
}

/// Current balance of an account
pub async fn balance(store: &Store, id: i64) -> Result<Cents> {
    Ok(store.get_account(id).await?.balance)
}
