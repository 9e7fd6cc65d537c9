//! Transaction history reports.
//!
//! History is a reporting path: it reads the balance and the log without taking any
//! lock and never joins a mutating unit. The balance and the records are two separate
//! reads, so the report is a best-effort snapshot under concurrent writes.

use std::fmt::Write;
use std::time::Duration;

use tokio::time::timeout;

use crate::error::StoreError;
use crate::models::account::Account;
use crate::models::money::Money;
use crate::models::response::Response;
use crate::models::transaction::TransactionRecord;
use crate::store::Ledger;

/// Timestamp layout used in report lines (UTC).
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Build the history report for one account.
///
/// Both reads together are bounded by `limit`.
///
/// # Returns
///
/// - `History(report)`: header with the current balance, then one line per record,
///   newest first
/// - `InvalidAccount`: empty account number
/// - `NoTransactionsFound`: unknown account, no records, or the store could not be read
///   in time
pub async fn transaction_history<L: Ledger>(
    ledger: &L,
    account_id: &str,
    currency_symbol: &str,
    limit: Duration,
) -> Response {
    if account_id.trim().is_empty() {
        return Response::InvalidAccount;
    }

    let (account, records) = match timeout(limit, read_snapshot(ledger, account_id)).await {
        Ok(Ok(Some(snapshot))) => snapshot,
        Ok(Ok(None)) => return Response::NoTransactionsFound,
        Ok(Err(err)) => {
            tracing::error!(account = account_id, error = %err, "History read failed");
            return Response::NoTransactionsFound;
        }
        Err(_) => {
            tracing::error!(account = account_id, ?limit, "History read timed out");
            return Response::NoTransactionsFound;
        }
    };

    if records.is_empty() {
        return Response::NoTransactionsFound;
    }

    Response::History(render_report(account.balance, &records, currency_symbol))
}

async fn read_snapshot<L: Ledger>(
    ledger: &L,
    account_id: &str,
) -> Result<Option<(Account, Vec<TransactionRecord>)>, StoreError> {
    let Some(account) = ledger.find_account(account_id).await? else {
        return Ok(None);
    };
    let records = ledger.list_transactions(account_id).await?;
    Ok(Some((account, records)))
}

/// Render the report text.
///
/// ```text
/// Current Balance: ₹0.00
///
/// 2026-10-18 09:15:02 - Withdrawal: ₹1500.00
/// 2026-10-18 09:14:40 - Deposit: ₹500.00
/// ```
pub fn render_report(balance: Money, records: &[TransactionRecord], currency_symbol: &str) -> String {
    let mut report = format!("Current Balance: {currency_symbol}{balance}\n\n");
    for record in records {
        // Writing to a String cannot fail
        let _ = writeln!(
            report,
            "{} - {}: {currency_symbol}{}",
            record.created_at.format(TIMESTAMP_FORMAT),
            record.kind,
            record.amount,
        );
    }
    report
}
