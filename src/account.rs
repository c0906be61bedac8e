//! Account record and its persisted JSON form.
//!
//! The sum `checking_balance + savings_balance` across all accounts only
//! changes on account creation.

use serde::{Deserialize, Serialize};

/// A customer account holding a checking and a savings balance.
///
/// Both balances are signed and may go negative: no overdraft check exists
/// anywhere in the ledger.
///
/// # Record format
///
/// Serializes to a JSON object with exactly the fields `id`, `name`,
/// `checkingBalance` and `savingsBalance`. Decoding also accepts the legacy
/// field names `CustomId`, `CustomName`, `CheckingBalance` and
/// `SavingsBalance` written by earlier deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Caller-chosen identifier, immutable after creation.
    #[serde(alias = "CustomId")]
    pub id: String,

    /// Descriptive label, never checked for uniqueness.
    #[serde(alias = "CustomName")]
    pub name: String,

    #[serde(alias = "CheckingBalance")]
    pub checking_balance: i64,

    #[serde(alias = "SavingsBalance")]
    pub savings_balance: i64,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>, checking: i64, savings: i64) -> Self {
        Account {
            id: id.into(),
            name: name.into(),
            checking_balance: checking,
            savings_balance: savings,
        }
    }

    /// Money held by this account across both balances.
    ///
    /// Widened to `i128` so summing many accounts cannot overflow.
    pub fn total(&self) -> i128 {
        i128::from(self.checking_balance) + i128::from(self.savings_balance)
    }

    /// Serializes the record to its stored bytes.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parses stored bytes back into a record.
    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
