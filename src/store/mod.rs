//! Ledger store abstraction.
//!
//! The transaction handler talks to the store through two traits:
//!
//! - [`Ledger`]: unlocked reads and the entry point to an atomic unit
//! - [`LedgerTx`]: statements issued inside one atomic unit
//!
//! A unit commits all of its effects together or none of them. Dropping a
//! [`LedgerTx`] without calling [`LedgerTx::commit`] rolls it back, so an early
//! return with `?` or a cancelled future never leaves partial state behind.
//!
//! Two implementations exist: [`postgres::PgLedger`] for production and
//! [`memory::MemoryLedger`] for tests and local runs.

use std::future::Future;

use crate::error::StoreError;
use crate::models::account::Account;
use crate::models::money::Money;
use crate::models::transaction::{NewTransaction, TransactionRecord};

pub mod memory;
pub mod postgres;

/// Shared handle to the ledger. Cloned into every connection task.
pub trait Ledger: Clone + Send + Sync + 'static {
    type Tx: LedgerTx;

    /// Start an atomic unit.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;

    fn account_exists(
        &self,
        account_id: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Point-in-time read without locking.
    fn find_account(
        &self,
        account_id: &str,
    ) -> impl Future<Output = Result<Option<Account>, StoreError>> + Send;

    /// All records for the account, newest first (ties broken by id, descending).
    fn list_transactions(
        &self,
        account_id: &str,
    ) -> impl Future<Output = Result<Vec<TransactionRecord>, StoreError>> + Send;
}

/// One atomic unit of work.
pub trait LedgerTx: Send + Sized {
    /// Read the balance and hold an exclusive lock on the account row until the unit
    /// ends. Returns `None` if the account does not exist.
    fn lock_balance(
        &mut self,
        account_id: &str,
    ) -> impl Future<Output = Result<Option<Money>, StoreError>> + Send;

    /// Add `delta` (possibly negative) to the balance. Returns rows affected.
    fn adjust_balance(
        &mut self,
        account_id: &str,
        delta: Money,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Append a record; the store assigns its id and timestamp.
    fn append_transaction(
        &mut self,
        entry: NewTransaction<'_>,
    ) -> impl Future<Output = Result<TransactionRecord, StoreError>> + Send;

    fn find_by_idempotency_key(
        &mut self,
        key: &str,
    ) -> impl Future<Output = Result<Option<TransactionRecord>, StoreError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
