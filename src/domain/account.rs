use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Cents;

pub type AccountId = i64;

/// A customer account holding a balance in a single currency.
///
/// The balance is the only mutable field; it is changed in place by the
/// transfer engine and must never be negative once a transfer has committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Identifier of the owning user
    pub owner: String,
    /// Balance in minor currency units
    pub balance: Cents,
    /// ISO currency code, e.g. "EUR"
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner == owner
    }

    pub fn can_cover(&self, amount: Cents) -> bool {
        self.balance >= amount
    }
}
