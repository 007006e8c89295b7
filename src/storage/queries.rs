use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::error::DatabaseError;
use sqlx::{Row, SqliteConnection};

use crate::domain::{Account, AccountId, Cents, Entry, EntryId, Transfer, TransferId};

use super::StoreError;

const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";
const ENTRY_COLUMNS: &str = "id, account_id, amount, created_at";
const TRANSFER_COLUMNS: &str = "id, from_account_id, to_account_id, amount, created_at";

/// A window into an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    /// Page `page_id` (1-based) of `page_size` rows, or `None` when the
    /// offset does not fit in an `i64`.
    pub fn numbered(page_id: i64, page_size: i64) -> Option<Self> {
        let offset = page_id.checked_sub(1)?.checked_mul(page_size)?;
        Some(Self::new(page_size, offset))
    }
}

/// Row-level primitives over one connection.
///
/// Built by [`Store::run_in_transaction`] around the open transaction, so
/// every call made through it shares that transaction's isolation scope.
///
///  [`Store::run_in_transaction`]: super::Store::run_in_transaction
pub struct Queries<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> Queries<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    // ========================
    // Accounts
    // ========================

    pub async fn create_account(
        &mut self,
        owner: &str,
        currency: &str,
        balance: Cents,
    ) -> Result<Account, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO accounts (owner, balance, currency, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(owner)
        .bind(balance)
        .bind(currency)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|err| {
            if violates(&err, |db| db.is_unique_violation()) {
                StoreError::AlreadyExists {
                    entity: "account",
                    key: format!("{owner}/{currency}"),
                }
            } else {
                StoreError::Database(err)
            }
        })?;

        row_to_account(&row)
    }

    pub async fn get_account(&mut self, id: AccountId) -> Result<Account, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        match row {
            Some(row) => row_to_account(&row),
            None => Err(StoreError::not_found("account", id)),
        }
    }

    /// List accounts ordered by id, optionally only those of one owner.
    pub async fn list_accounts(
        &mut self,
        owner: Option<&str>,
        page: Page,
    ) -> Result<Vec<Account>, StoreError> {
        let rows = match owner {
            Some(owner) => {
                sqlx::query(&format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner = ? ORDER BY id LIMIT ? OFFSET ?"
                ))
                .bind(owner)
                .bind(page.limit)
                .bind(page.offset)
                .fetch_all(&mut *self.conn)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id LIMIT ? OFFSET ?"
                ))
                .bind(page.limit)
                .bind(page.offset)
                .fetch_all(&mut *self.conn)
                .await?
            }
        };

        rows.iter().map(row_to_account).collect()
    }

    /// Add `delta` (possibly negative) to the stored balance and return the
    /// updated row. The arithmetic runs inside the single UPDATE statement, so
    /// concurrent increments of the same account never lose an update.
    pub async fn add_account_balance(
        &mut self,
        id: AccountId,
        delta: Cents,
    ) -> Result<Account, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE accounts
            SET balance = balance + ?
            WHERE id = ?
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(delta)
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        match row {
            Some(row) => row_to_account(&row),
            None => Err(StoreError::not_found("account", id)),
        }
    }

    /// Overwrite the stored balance.
    pub async fn update_account_balance(
        &mut self,
        id: AccountId,
        balance: Cents,
    ) -> Result<Account, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE accounts SET balance = ? WHERE id = ? RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(balance)
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        match row {
            Some(row) => row_to_account(&row),
            None => Err(StoreError::not_found("account", id)),
        }
    }

    /// Delete an account. Fails on the foreign keys if any entry or transfer
    /// still references it.
    pub async fn delete_account(&mut self, id: AccountId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("account", id));
        }
        Ok(())
    }

    // ========================
    // Entries
    // ========================

    pub async fn create_entry(
        &mut self,
        account_id: AccountId,
        amount: Cents,
    ) -> Result<Entry, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO entries (account_id, amount, created_at)
            VALUES (?, ?, ?)
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(account_id)
        .bind(amount)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|err| missing_account(err, account_id.to_string()))?;

        row_to_entry(&row)
    }

    pub async fn get_entry(&mut self, id: EntryId) -> Result<Entry, StoreError> {
        let row = sqlx::query(&format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        match row {
            Some(row) => row_to_entry(&row),
            None => Err(StoreError::not_found("entry", id)),
        }
    }

    pub async fn list_entries(
        &mut self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE account_id = ? ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(account_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&mut *self.conn)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    // ========================
    // Transfers
    // ========================

    pub async fn create_transfer(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Cents,
    ) -> Result<Transfer, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING {TRANSFER_COLUMNS}
            "#
        ))
        .bind(from_account_id)
        .bind(to_account_id)
        .bind(amount)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|err| missing_account(err, format!("{from_account_id} or {to_account_id}")))?;

        row_to_transfer(&row)
    }

    pub async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        match row {
            Some(row) => row_to_transfer(&row),
            None => Err(StoreError::not_found("transfer", id)),
        }
    }

    /// List transfers leaving `from_account_id` or arriving at `to_account_id`.
    /// Pass the same id twice for the full history of one account.
    pub async fn list_transfers(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Transfer>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {TRANSFER_COLUMNS}
            FROM transfers
            WHERE from_account_id = ? OR to_account_id = ?
            ORDER BY id
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(from_account_id)
        .bind(to_account_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&mut *self.conn)
        .await?;

        rows.iter().map(row_to_transfer).collect()
    }
}

/// Foreign key violations on insert mean a referenced account is missing.
fn missing_account(err: sqlx::Error, key: String) -> StoreError {
    if violates(&err, |db| db.is_foreign_key_violation()) {
        StoreError::NotFound {
            entity: "account",
            key,
        }
    } else {
        StoreError::Database(err)
    }
}

fn violates(err: &sqlx::Error, check: impl Fn(&dyn DatabaseError) -> bool) -> bool {
    err.as_database_error().is_some_and(|db| check(db))
}

fn parse_timestamp(entity: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| StoreError::CorruptRow {
            entity,
            reason: format!("invalid created_at {value:?}: {err}"),
        })
}

fn row_to_account(row: &SqliteRow) -> Result<Account, StoreError> {
    let created_at: String = row.try_get("created_at")?;

    Ok(Account {
        id: row.try_get("id")?,
        owner: row.try_get("owner")?,
        balance: row.try_get("balance")?,
        currency: row.try_get("currency")?,
        created_at: parse_timestamp("account", &created_at)?,
    })
}

fn row_to_entry(row: &SqliteRow) -> Result<Entry, StoreError> {
    let created_at: String = row.try_get("created_at")?;

    Ok(Entry {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        amount: row.try_get("amount")?,
        created_at: parse_timestamp("entry", &created_at)?,
    })
}

fn row_to_transfer(row: &SqliteRow) -> Result<Transfer, StoreError> {
    let created_at: String = row.try_get("created_at")?;

    Ok(Transfer {
        id: row.try_get("id")?,
        from_account_id: row.try_get("from_account_id")?,
        to_account_id: row.try_get("to_account_id")?,
        amount: row.try_get("amount")?,
        created_at: parse_timestamp("transfer", &created_at)?,
    })
}
