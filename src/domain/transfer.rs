use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Account, AccountId, BalanceUpdate, Cents, Entry};

pub type TransferId = i64;

/// A record of money moved from one account to another.
/// Transfers are immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    /// Source account (balance decreases)
    pub from_account_id: AccountId,
    /// Destination account (balance increases)
    pub to_account_id: AccountId,
    /// Amount in minor units (always positive)
    pub amount: Cents,
    pub created_at: DateTime<Utc>,
}

/// Input of the transfer engine. Callers validate it before submitting:
/// `amount` must be positive and the two accounts distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Cents,
}

impl TransferTxParams {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: Cents) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    /// The debit applied to the source account. Saturates for an amount of
    /// `i64::MIN`, which storage rejects anyway.
    pub fn debit(&self) -> BalanceUpdate {
        BalanceUpdate::new(self.from_account_id, self.amount.saturating_neg())
    }

    /// The credit applied to the destination account.
    pub fn credit(&self) -> BalanceUpdate {
        BalanceUpdate::new(self.to_account_id, self.amount)
    }
}

/// Everything one committed transfer wrote: the transfer row, both entries
/// and both accounts as they were right after their balance update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}
