//! Transaction service - deposits and withdrawals.
//!
//! This service handles:
//! - Amount and account validation
//! - Atomic balance updates paired with a transaction log entry
//! - Row locking for the withdrawal balance check
//! - Idempotency key replay detection
//!
//! # Atomicity Guarantees
//!
//! Each operation runs as one [`LedgerTx`]. The balance change and the log entry commit
//! together or not at all. Every early return before `commit` drops the unit, which
//! rolls it back.
//!
//! # Timeouts
//!
//! Everything up to the commit is bounded by the store timeout. A unit that runs out
//! of time is dropped, so nothing is applied and the operation reports its generic
//! failure status. The commit itself is awaited to completion: once it has been sent
//! the reply must reflect what the store did.
//!
//! # Error Reporting
//!
//! Store errors never reach the caller: they are logged here and turned into the
//! operation's generic failure status.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::error::StoreError;
use crate::models::money::Money;
use crate::models::response::Response;
use crate::models::transaction::{NewTransaction, TransactionKind, TransactionRecord};
use crate::store::{Ledger, LedgerTx};

/// Where a unit stands once every statement before the commit has run.
enum Staged<T> {
    /// Nothing to commit; the unit is already rolled back and this is the reply.
    Settled(Response),
    /// Balance and record written, waiting for commit.
    Ready(T, TransactionRecord),
}

/// Execute a deposit (add money to an account).
///
/// # Process
///
/// 1. Reject empty account or non-positive amount
/// 2. Check the account exists
/// 3. Start an atomic unit
/// 4. Replay check if an idempotency key was sent
/// 5. Increase the balance and record the deposit
/// 6. Commit (or roll back on any error or once `limit` has passed)
///
/// # Returns
///
/// - `DepositSuccessful`: applied, or already applied under the same idempotency key
/// - `InvalidDeposit`: empty account or amount <= 0
/// - `DepositAccountNotFound`: no such account
/// - `DepositFailed`: store error or timeout, nothing applied
pub async fn execute_deposit<L: Ledger>(
    ledger: &L,
    account_id: &str,
    amount: Money,
    idempotency_key: Option<&str>,
    limit: Duration,
) -> Response {
    if account_id.trim().is_empty() || !amount.is_positive() {
        return Response::InvalidDeposit;
    }

    run_unit(
        TransactionKind::Deposit,
        account_id,
        amount,
        limit,
        stage_deposit(ledger, account_id, amount, idempotency_key),
    )
    .await
}

async fn stage_deposit<L: Ledger>(
    ledger: &L,
    account_id: &str,
    amount: Money,
    idempotency_key: Option<&str>,
) -> Result<Staged<L::Tx>, StoreError> {
    if !ledger.account_exists(account_id).await? {
        return Ok(Staged::Settled(Response::DepositAccountNotFound));
    }

    let mut tx = ledger.begin().await?;

    if let Some(key) = idempotency_key {
        // Lock first so a concurrent request with the same key waits for our outcome
        tx.lock_balance(account_id).await?;
        if let Some(existing) = tx.find_by_idempotency_key(key).await? {
            tx.rollback().await?;
            return Ok(Staged::Settled(replay(
                &existing,
                account_id,
                TransactionKind::Deposit,
            )));
        }
    }

    let updated = tx.adjust_balance(account_id, amount).await?;
    if updated == 0 {
        tx.rollback().await?;
        tracing::warn!(account = account_id, "Deposit updated no rows");
        return Ok(Staged::Settled(Response::DepositFailed));
    }

    let record = tx
        .append_transaction(NewTransaction {
            account_id,
            kind: TransactionKind::Deposit,
            amount,
            idempotency_key,
        })
        .await?;

    Ok(Staged::Ready(tx, record))
}

/// Execute a withdrawal (remove money from an account).
///
/// The balance row is locked for the whole check-and-update, so two concurrent
/// withdrawals on the same account can never both pass the balance check against
/// the same starting balance.
///
/// # Returns
///
/// - `WithdrawalSuccessful`: applied, or already applied under the same idempotency key
/// - `InvalidWithdrawal`: empty account or amount <= 0
/// - `WithdrawalAccountNotFound`: no such account
/// - `InsufficientBalance`: balance < amount, nothing applied
/// - `WithdrawalFailed`: store error or timeout, nothing applied
pub async fn execute_withdrawal<L: Ledger>(
    ledger: &L,
    account_id: &str,
    amount: Money,
    idempotency_key: Option<&str>,
    limit: Duration,
) -> Response {
    if account_id.trim().is_empty() || !amount.is_positive() {
        return Response::InvalidWithdrawal;
    }

    run_unit(
        TransactionKind::Withdrawal,
        account_id,
        amount,
        limit,
        stage_withdrawal(ledger, account_id, amount, idempotency_key),
    )
    .await
}

async fn stage_withdrawal<L: Ledger>(
    ledger: &L,
    account_id: &str,
    amount: Money,
    idempotency_key: Option<&str>,
) -> Result<Staged<L::Tx>, StoreError> {
    if !ledger.account_exists(account_id).await? {
        return Ok(Staged::Settled(Response::WithdrawalAccountNotFound));
    }

    let mut tx = ledger.begin().await?;

    let Some(balance) = tx.lock_balance(account_id).await? else {
        // Removed between the existence check and the lock
        tx.rollback().await?;
        return Ok(Staged::Settled(Response::WithdrawalAccountNotFound));
    };

    if let Some(key) = idempotency_key {
        if let Some(existing) = tx.find_by_idempotency_key(key).await? {
            tx.rollback().await?;
            return Ok(Staged::Settled(replay(
                &existing,
                account_id,
                TransactionKind::Withdrawal,
            )));
        }
    }

    if balance < amount {
        tx.rollback().await?;
        tracing::info!(account = account_id, %amount, %balance, "Insufficient balance");
        return Ok(Staged::Settled(Response::InsufficientBalance));
    }

    let updated = tx.adjust_balance(account_id, amount.negated()).await?;
    if updated == 0 {
        tx.rollback().await?;
        tracing::warn!(account = account_id, "Withdrawal updated no rows");
        return Ok(Staged::Settled(Response::WithdrawalFailed));
    }

    let record = tx
        .append_transaction(NewTransaction {
            account_id,
            kind: TransactionKind::Withdrawal,
            amount,
            idempotency_key,
        })
        .await?;

    Ok(Staged::Ready(tx, record))
}

/// Run `stage` under `limit`, then commit whatever it left ready.
async fn run_unit<T, F>(
    kind: TransactionKind,
    account_id: &str,
    amount: Money,
    limit: Duration,
    stage: F,
) -> Response
where
    T: LedgerTx,
    F: Future<Output = Result<Staged<T>, StoreError>>,
{
    let staged = match timeout(limit, stage).await {
        Ok(Ok(staged)) => staged,
        Ok(Err(err)) => {
            tracing::error!(account = account_id, %kind, %amount, error = %err, "Rolled back");
            return failed(kind);
        }
        Err(_) => {
            tracing::error!(account = account_id, %kind, %amount, ?limit, "Timed out before commit, rolled back");
            return failed(kind);
        }
    };

    let (tx, record) = match staged {
        Staged::Settled(response) => return response,
        Staged::Ready(tx, record) => (tx, record),
    };

    match tx.commit().await {
        Ok(()) => {
            tracing::info!(account = account_id, %kind, %amount, record_id = record.id, "Committed");
            applied(kind)
        }
        Err(err) => {
            // The commit may or may not have reached the store
            tracing::error!(
                account = account_id,
                %kind,
                %amount,
                record_id = record.id,
                error = %err,
                "Commit failed, outcome unknown"
            );
            failed(kind)
        }
    }
}

fn applied(kind: TransactionKind) -> Response {
    match kind {
        TransactionKind::Deposit => Response::DepositSuccessful,
        TransactionKind::Withdrawal => Response::WithdrawalSuccessful,
    }
}

fn failed(kind: TransactionKind) -> Response {
    match kind {
        TransactionKind::Deposit => Response::DepositFailed,
        TransactionKind::Withdrawal => Response::WithdrawalFailed,
    }
}

/// Outcome for a request whose idempotency key is already in the log.
fn replay(existing: &TransactionRecord, account_id: &str, kind: TransactionKind) -> Response {
    if existing.matches(account_id, kind) {
        tracing::info!(
            account = account_id,
            record_id = existing.id,
            "Duplicate request, returning original outcome"
        );
        applied(kind)
    } else {
        tracing::warn!(
            account = account_id,
            record_id = existing.id,
            "Idempotency key reused for a different request"
        );
        failed(kind)
    }
}
