use thiserror::Error;

/// Errors raised by the ledger store and the transfer engine.
///
/// Three outcomes matter to callers:
/// - [`NotFound`]: a referenced row does not exist, nothing was written.
/// - [`Database`]: the backend failed, the transaction was rolled back.
/// - [`RollbackFailed`]: the unit of work failed and so did its rollback,
///   the stored state may not be what the caller expects.
///
///  [`NotFound`]: StoreError::NotFound
///  [`Database`]: StoreError::Database
///  [`RollbackFailed`]: StoreError::RollbackFailed
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("invalid {entity} row: {reason}")]
    CorruptRow { entity: &'static str, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("transaction failed: {source}; rollback also failed: {rollback}")]
    RollbackFailed {
        source: Box<StoreError>,
        rollback: sqlx::Error,
    },
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Combine the failure of a unit of work with the outcome of rolling it back.
    pub fn after_rollback(original: StoreError, rollback: Result<(), sqlx::Error>) -> Self {
        match rollback {
            Ok(()) => original,
            Err(rollback) => StoreError::RollbackFailed {
                source: Box::new(original),
                rollback,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// True when the state of the store is unknown after this failure.
    pub fn is_rollback_failure(&self) -> bool {
        matches!(self, StoreError::RollbackFailed { .. })
    }

    /// True for transient failures a caller may retry with backoff:
    /// lock contention, pool exhaustion and I/O errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Database(err) => is_transient(err),
            _ => false,
        }
    }

    /// True when the backend rejected a write because of a CHECK constraint,
    /// e.g. a balance update that would go below zero.
    pub fn is_check_violation(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => db.is_check_violation(),
            _ => false,
        }
    }
}

fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            // SQLITE_BUSY and SQLITE_LOCKED, including their extended codes
            .is_some_and(|code| matches!(code & 0xff, 5 | 6)),
        _ => false,
    }
}
