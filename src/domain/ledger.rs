use serde::{Deserialize, Serialize};

use super::{AccountId, Cents, Entry};

/// A signed change to one account balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub account_id: AccountId,
    pub delta: Cents,
}

impl BalanceUpdate {
    pub fn new(account_id: AccountId, delta: Cents) -> Self {
        Self { account_id, delta }
    }
}

/// Sort balance updates into the order their rows must be locked in.
///
/// Every unit of work that touches several accounts acquires the rows in
/// ascending account id order, so concurrent transfers can never wait on each
/// other in a cycle. The sort is stable: updates to the same account keep
/// their relative order.
pub fn lock_order<const N: usize>(mut updates: [BalanceUpdate; N]) -> [BalanceUpdate; N] {
    updates.sort_by_key(|update| update.account_id);
    updates
}

/// Sum of the entry amounts. Zero for the entries of any complete transfer.
pub fn net_amount(entries: &[Entry]) -> Cents {
    entries.iter().map(|entry| entry.amount).sum()
}

/// Sum of the entry amounts recorded against a single account.
pub fn account_delta(account_id: AccountId, entries: &[Entry]) -> Cents {
    entries
        .iter()
        .filter(|entry| entry.account_id == account_id)
        .map(|entry| entry.amount)
        .sum()
}
