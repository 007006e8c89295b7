use std::str::FromStr;
use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::{debug, error, warn};

use crate::domain::{Account, AccountId, Cents, Entry, EntryId, Transfer, TransferId};

use super::{MIGRATION_001_INITIAL, Page, Queries, StoreError};

/// Connection settings for the ledger database.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// sqlx connection URL, e.g. `sqlite:bank.db`
    pub database_url: String,
    pub max_connections: u32,
    /// How long a writer waits for the database lock before giving up
    pub busy_timeout: Duration,
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:microbank.db".to_string(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
            create_if_missing: false,
        }
    }
}

impl StoreConfig {
    /// Settings for a database file at `path`.
    pub fn for_path(path: &str) -> Self {
        Self {
            database_url: format!("sqlite:{}", path),
            ..Self::default()
        }
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }
}

/// The ledger store: a connection pool plus the row-level primitives.
///
/// Primitives called directly on the store each run in their own implicit
/// transaction. Use [`Store::run_in_transaction`] to group several of them
/// into one atomic unit of work.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Create a new store over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool to the configured database.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(config.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        debug!(url = %config.database_url, "connected to ledger database");
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Initialize a database (connect + migrate), creating the file if needed.
    pub async fn init(config: &StoreConfig) -> Result<Self, StoreError> {
        let config = config.clone().create_if_missing(true);
        let store = Self::connect(&config).await?;
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run `work` inside one database transaction.
    ///
    /// Commits when `work` succeeds. When it fails the transaction is rolled
    /// back and the error returned; if the rollback fails too, the result is
    /// [`StoreError::RollbackFailed`] carrying both causes. A failed commit is
    /// rolled back by the backend and returned as is.
    ///
    /// Dropping the returned future before it completes (a timeout, a client
    /// going away) drops the open transaction, which rolls it back.
    pub async fn run_in_transaction<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut Queries<'_>) -> BoxFuture<'c, Result<T, StoreError>>,
    {
        let mut tx = self.pool.begin().await?;

        let outcome = {
            let mut queries = Queries::new(&mut tx);
            work(&mut queries).await
        };

        match outcome {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "rolling back transaction");
                let err = StoreError::after_rollback(err, tx.rollback().await);
                if let StoreError::RollbackFailed { source, rollback } = &err {
                    error!(error = %source, rollback_error = %rollback, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }

    // ========================
    // Single-statement primitives
    // ========================

    pub async fn create_account(
        &self,
        owner: &str,
        currency: &str,
        balance: Cents,
    ) -> Result<Account, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut conn)
            .create_account(owner, currency, balance)
            .await
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut conn).get_account(id).await
    }

    pub async fn list_accounts(
        &self,
        owner: Option<&str>,
        page: Page,
    ) -> Result<Vec<Account>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut conn).list_accounts(owner, page).await
    }

    pub async fn add_account_balance(
        &self,
        id: AccountId,
        delta: Cents,
    ) -> Result<Account, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut conn).add_account_balance(id, delta).await
    }

    pub async fn update_account_balance(
        &self,
        id: AccountId,
        balance: Cents,
    ) -> Result<Account, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut conn)
            .update_account_balance(id, balance)
            .await
    }

    pub async fn delete_account(&self, id: AccountId) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut conn).delete_account(id).await
    }

    pub async fn create_entry(
        &self,
        account_id: AccountId,
        amount: Cents,
    ) -> Result<Entry, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut conn).create_entry(account_id, amount).await
    }

    pub async fn get_entry(&self, id: EntryId) -> Result<Entry, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut conn).get_entry(id).await
    }

    pub async fn list_entries(
        &self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut conn).list_entries(account_id, page).await
    }

    pub async fn create_transfer(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Cents,
    ) -> Result<Transfer, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut conn)
            .create_transfer(from_account_id, to_account_id, amount)
            .await
    }

    pub async fn get_transfer(&self, id: TransferId) -> Result<Transfer, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut conn).get_transfer(id).await
    }

    pub async fn list_transfers(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Transfer>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Queries::new(&mut conn)
            .list_transfers(from_account_id, to_account_id, page)
            .await
    }
}
