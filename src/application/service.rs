use tracing::info;

use crate::domain::{
    Account, AccountId, Cents, Currency, Entry, Transfer, TransferTxParams, TransferTxResult,
};
use crate::storage::{Page, Store, StoreConfig};

use super::AppError;

/// Smallest and largest page sizes accepted by listing operations.
pub const MIN_PAGE_SIZE: i64 = 5;
pub const MAX_PAGE_SIZE: i64 = 10;

/// Application service providing account management and money movement.
/// This is the primary interface for any client (CLI, API, etc.).
pub struct BankService {
    store: Store,
}

/// A request to move money between two accounts.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Cents,
    /// Currency both accounts must be held in
    pub currency: String,
    /// When set, the source account must belong to this owner
    pub requested_by: Option<String>,
}

impl BankService {
    /// Create a new bank service over the given store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Initialize a database (creating it if needed) and open it.
    pub async fn init(config: &StoreConfig) -> Result<Self, AppError> {
        Ok(Self::new(Store::init(config).await?))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &StoreConfig) -> Result<Self, AppError> {
        Ok(Self::new(Store::connect(config).await?))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    // ========================
    // Account operations
    // ========================

    /// Open a new account with a zero balance.
    pub async fn create_account(&self, owner: &str, currency: &str) -> Result<Account, AppError> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(AppError::InvalidRequest("owner must not be empty".into()));
        }
        let currency = parse_currency(currency)?;

        let account = self
            .store
            .create_account(owner, currency.code(), 0)
            .await?;
        info!(account_id = account.id, owner, currency = %currency, "account created");
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, AppError> {
        validate_id(id)?;
        Ok(self.store.get_account(id).await?)
    }

    /// List accounts, optionally restricted to one owner.
    pub async fn list_accounts(
        &self,
        owner: Option<&str>,
        page_id: i64,
        page_size: i64,
    ) -> Result<Vec<Account>, AppError> {
        let page = validate_page(page_id, page_size)?;
        Ok(self.store.list_accounts(owner, page).await?)
    }

    /// Overwrite an account balance (administrative correction).
    pub async fn set_balance(&self, id: AccountId, balance: Cents) -> Result<Account, AppError> {
        validate_id(id)?;
        if balance < 0 {
            return Err(AppError::InvalidRequest(format!(
                "balance must not be negative: {}",
                balance
            )));
        }

        let account = self.store.update_account_balance(id, balance).await?;
        info!(account_id = id, balance, "account balance set");
        Ok(account)
    }

    /// Delete an account. Callers must not run this concurrently with a
    /// transfer that references the same account.
    pub async fn delete_account(&self, id: AccountId) -> Result<(), AppError> {
        validate_id(id)?;
        self.store.delete_account(id).await?;
        info!(account_id = id, "account deleted");
        Ok(())
    }

    // ========================
    // Transfer operations
    // ========================

    /// Validate a transfer request and execute it through the transfer engine.
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferTxResult, AppError> {
        validate_id(request.from_account_id)?;
        validate_id(request.to_account_id)?;
        if request.amount <= 0 {
            return Err(AppError::InvalidRequest(
                "amount must be positive".to_string(),
            ));
        }
        if request.from_account_id == request.to_account_id {
            return Err(AppError::InvalidRequest(
                "cannot transfer to the same account".to_string(),
            ));
        }
        let currency = parse_currency(&request.currency)?;

        let from_account = self
            .valid_account(request.from_account_id, currency)
            .await?;
        if let Some(owner) = &request.requested_by {
            if !from_account.is_owned_by(owner) {
                return Err(AppError::Unauthorized(format!(
                    "account {} doesn't belong to {}",
                    from_account.id, owner
                )));
            }
        }
        self.valid_account(request.to_account_id, currency).await?;

        if !from_account.can_cover(request.amount) {
            return Err(AppError::InsufficientFunds {
                account_id: from_account.id,
                balance: from_account.balance,
                required: request.amount,
            });
        }

        let params = TransferTxParams::new(
            request.from_account_id,
            request.to_account_id,
            request.amount,
        );
        let result = self.store.transfer_tx(params).await?;

        info!(
            transfer_id = result.transfer.id,
            from = params.from_account_id,
            to = params.to_account_id,
            amount = params.amount,
            "transfer recorded"
        );
        Ok(result)
    }

    /// Entries recorded against an account, oldest first.
    pub async fn account_entries(
        &self,
        account_id: AccountId,
        page_id: i64,
        page_size: i64,
    ) -> Result<Vec<Entry>, AppError> {
        let page = validate_page(page_id, page_size)?;
        self.get_account(account_id).await?;
        Ok(self.store.list_entries(account_id, page).await?)
    }

    /// Transfers in or out of an account, oldest first.
    pub async fn account_transfers(
        &self,
        account_id: AccountId,
        page_id: i64,
        page_size: i64,
    ) -> Result<Vec<Transfer>, AppError> {
        let page = validate_page(page_id, page_size)?;
        self.get_account(account_id).await?;
        Ok(self
            .store
            .list_transfers(account_id, account_id, page)
            .await?)
    }

    async fn valid_account(
        &self,
        id: AccountId,
        currency: Currency,
    ) -> Result<Account, AppError> {
        let account = self.store.get_account(id).await?;
        if account.currency != currency.code() {
            return Err(AppError::CurrencyMismatch {
                account_id: account.id,
                expected: currency.code().to_string(),
                actual: account.currency,
            });
        }
        Ok(account)
    }
}

fn parse_currency(code: &str) -> Result<Currency, AppError> {
    code.parse::<Currency>()
        .map_err(|err| AppError::InvalidRequest(err.to_string()))
}

fn validate_id(id: AccountId) -> Result<(), AppError> {
    if id < 1 {
        return Err(AppError::InvalidRequest(format!("invalid account id: {}", id)));
    }
    Ok(())
}

fn validate_page(page_id: i64, page_size: i64) -> Result<Page, AppError> {
    if page_id < 1 {
        return Err(AppError::InvalidRequest(format!(
            "page id must be at least 1, got {}",
            page_id
        )));
    }
    if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(AppError::InvalidRequest(format!(
            "page size must be between {} and {}, got {}",
            MIN_PAGE_SIZE, MAX_PAGE_SIZE, page_size
        )));
    }
    Page::numbered(page_id, page_size).ok_or_else(|| {
        AppError::InvalidRequest(format!("page id {} is out of range", page_id))
    })
}
