//! Transaction log records.
//!
//! This module defines:
//! - `TransactionKind`: Deposit or Withdrawal
//! - `TransactionRecord`: an immutable entry in the append-only transaction log
//! - `NewTransaction`: what the handler asks the store to append

use std::fmt;

use chrono::{DateTime, Utc};

use super::money::Money;

/// Kind of balance mutation recorded in the log.
///
/// Maps to the PostgreSQL enum `transaction_kind`; variant names are stored verbatim
/// and are also what history reports display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "transaction_kind")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Deposit => f.write_str("Deposit"),
            TransactionKind::Withdrawal => f.write_str("Withdrawal"),
        }
    }
}

/// Represents a row of the `transactions` table.
///
/// Records are written exactly once per successful deposit or withdrawal and are
/// never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TransactionRecord {
    /// Store-assigned, increasing with insertion order
    pub id: i64,

    pub account_id: String,

    pub kind: TransactionKind,

    /// Always positive (enforced by CHECK constraint)
    #[sqlx(rename = "amount_cents")]
    pub amount: Money,

    /// Caller-supplied deduplication key, unique across the log
    pub idempotency_key: Option<String>,

    /// Assigned by the store at write time
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Whether this record is the already-applied result of the given request.
    pub fn matches(&self, account_id: &str, kind: TransactionKind) -> bool {
        self.account_id == account_id && self.kind == kind
    }
}

/// A record the handler wants appended inside its atomic unit.
#[derive(Debug, Clone, Copy)]
pub struct NewTransaction<'a> {
    pub account_id: &'a str,
    pub kind: TransactionKind,
    pub amount: Money,
    pub idempotency_key: Option<&'a str>,
}
