//! In-memory ledger for tests and local runs.
//!
//! The whole ledger sits behind one async mutex. An atomic unit holds the lock from
//! `begin` until it commits or is dropped, which is a coarser version of the row lock
//! PostgreSQL takes: every unit is serialized, not just units on the same account.
//! Writes are staged inside the unit and only applied on commit.
//!
//! The same rules the database schema enforces are checked here: balances never go
//! negative, amounts are positive, idempotency keys are unique.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::StoreError;
use crate::models::account::Account;
use crate::models::money::Money;
use crate::models::transaction::{NewTransaction, TransactionRecord};

use super::{Ledger, LedgerTx};

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<String, Account>,
    /// Committed records in insertion order
    records: Vec<TransactionRecord>,
    last_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    fail_appends: Arc<AtomicBool>,
    /// Delay before each append, in milliseconds
    stall_appends_ms: Arc<AtomicU64>,
    /// Delay before each commit, in milliseconds
    stall_commits_ms: Arc<AtomicU64>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger pre-populated with `(account_id, balance)` pairs.
    pub fn with_accounts<I, S>(accounts: I) -> Self
    where
        I: IntoIterator<Item = (S, Money)>,
        S: Into<String>,
    {
        let now = Utc::now();
        let accounts = accounts
            .into_iter()
            .map(|(id, balance)| {
                let account_id = id.into();
                let account = Account {
                    account_id: account_id.clone(),
                    balance,
                    updated_at: now,
                };
                (account_id, account)
            })
            .collect();

        Self {
            state: Arc::new(Mutex::new(LedgerState {
                accounts,
                ..LedgerState::default()
            })),
            fail_appends: Arc::default(),
            stall_appends_ms: Arc::default(),
            stall_commits_ms: Arc::default(),
        }
    }

    /// Make every subsequent `append_transaction` fail until switched off.
    pub fn fail_appends(&self, enabled: bool) {
        self.fail_appends.store(enabled, Ordering::SeqCst);
    }

    /// Make every subsequent `append_transaction` sleep for `delay` while holding the
    /// unit open. `Duration::ZERO` switches it off.
    pub fn stall_appends(&self, delay: Duration) {
        self.stall_appends_ms.store(millis(delay), Ordering::SeqCst);
    }

    /// Make every subsequent `commit` sleep for `delay` before applying the unit.
    pub fn stall_commits(&self, delay: Duration) {
        self.stall_commits_ms.store(millis(delay), Ordering::SeqCst);
    }

    /// Every committed record, oldest first.
    pub async fn records(&self) -> Vec<TransactionRecord> {
        self.state.lock().await.records.clone()
    }
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

/// An atomic unit holding the ledger lock.
pub struct MemoryTx {
    state: OwnedMutexGuard<LedgerState>,
    balances: HashMap<String, Money>,
    pending: Vec<TransactionRecord>,
    last_timestamp: Option<DateTime<Utc>>,
    fail_appends: bool,
    stall: Duration,
    commit_stall: Duration,
}

impl MemoryTx {
    fn current_balance(&self, account_id: &str) -> Option<Money> {
        self.balances
            .get(account_id)
            .copied()
            .or_else(|| self.state.accounts.get(account_id).map(|a| a.balance))
    }

    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let timestamp = match self.last_timestamp {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }

    fn find_key(&self, key: &str) -> Option<&TransactionRecord> {
        self.pending
            .iter()
            .chain(self.state.records.iter())
            .find(|record| record.idempotency_key.as_deref() == Some(key))
    }
}

impl Ledger for MemoryLedger {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        let state = self.state.clone().lock_owned().await;
        let last_timestamp = state.last_timestamp;

        Ok(MemoryTx {
            state,
            balances: HashMap::new(),
            pending: Vec::new(),
            last_timestamp,
            fail_appends: self.fail_appends.load(Ordering::SeqCst),
            stall: Duration::from_millis(self.stall_appends_ms.load(Ordering::SeqCst)),
            commit_stall: Duration::from_millis(self.stall_commits_ms.load(Ordering::SeqCst)),
        })
    }

    async fn account_exists(&self, account_id: &str) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.accounts.contains_key(account_id))
    }

    async fn find_account(&self, account_id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.state.lock().await.accounts.get(account_id).cloned())
    }

    async fn list_transactions(
        &self,
        account_id: &str,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let state = self.state.lock().await;
        let mut records: Vec<TransactionRecord> = state
            .records
            .iter()
            .filter(|record| record.account_id == account_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(records)
    }
}

impl LedgerTx for MemoryTx {
    async fn lock_balance(&mut self, account_id: &str) -> Result<Option<Money>, StoreError> {
        Ok(self.current_balance(account_id))
    }

    async fn adjust_balance(&mut self, account_id: &str, delta: Money) -> Result<u64, StoreError> {
        let Some(balance) = self.current_balance(account_id) else {
            return Ok(0);
        };

        let updated = balance
            .checked_add(delta)
            .ok_or_else(|| StoreError::BalanceOverflow(account_id.to_string()))?;
        if updated < Money::ZERO {
            return Err(StoreError::Constraint(format!(
                "balance of {account_id} would become negative"
            )));
        }

        self.balances.insert(account_id.to_string(), updated);
        Ok(1)
    }

    async fn append_transaction(
        &mut self,
        entry: NewTransaction<'_>,
    ) -> Result<TransactionRecord, StoreError> {
        if !self.stall.is_zero() {
            tokio::time::sleep(self.stall).await;
        }
        if self.fail_appends {
            return Err(StoreError::Injected("append_transaction"));
        }
        if !entry.amount.is_positive() {
            return Err(StoreError::Constraint("amount must be positive".into()));
        }
        if !self.state.accounts.contains_key(entry.account_id) {
            return Err(StoreError::Constraint(format!(
                "unknown account {}",
                entry.account_id
            )));
        }
        if let Some(key) = entry.idempotency_key {
            if self.find_key(key).is_some() {
                return Err(StoreError::Constraint(format!(
                    "duplicate idempotency key {key}"
                )));
            }
        }

        let record = TransactionRecord {
            id: (self.state.records.len() + self.pending.len() + 1) as i64,
            account_id: entry.account_id.to_string(),
            kind: entry.kind,
            amount: entry.amount,
            idempotency_key: entry.idempotency_key.map(str::to_string),
            created_at: self.next_timestamp(),
        };
        self.pending.push(record.clone());
        Ok(record)
    }

    async fn find_by_idempotency_key(
        &mut self,
        key: &str,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        Ok(self.find_key(key).cloned())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        if !self.commit_stall.is_zero() {
            tokio::time::sleep(self.commit_stall).await;
        }
        let now = Utc::now();
        for (account_id, balance) in self.balances.drain() {
            if let Some(account) = self.state.accounts.get_mut(&account_id) {
                account.balance = balance;
                account.updated_at = now;
            }
        }
        let pending = std::mem::take(&mut self.pending);
        self.state.records.extend(pending);
        self.state.last_timestamp = self.last_timestamp;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
