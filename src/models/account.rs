//! Account data model.

use chrono::{DateTime, Utc};

use super::money::Money;

/// Represents an account record from the database.
///
/// Accounts are provisioned outside this service; the server only reads them and
/// adjusts their balance through deposits and withdrawals.
///
/// # Balance Storage
///
/// Balances are stored as `i64` cents (see [`Money`]) and must be >= 0
/// (enforced by database CHECK constraint and by the withdrawal check).
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Account {
    /// Opaque account number chosen by the bank
    pub account_id: String,

    #[sqlx(rename = "balance_cents")]
    pub balance: Money,

    /// Timestamp of last balance update
    pub updated_at: DateTime<Utc>,
}
