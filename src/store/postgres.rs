//! PostgreSQL ledger.
//!
//! Each atomic unit is a PostgreSQL transaction on a connection borrowed from the pool
//! for the lifetime of the unit, so concurrent units never share a backend session.
//! Row locks come from `SELECT ... FOR UPDATE` and are released on commit or rollback.

use sqlx::{Postgres, Transaction};

use crate::db::DbPool;
use crate::error::StoreError;
use crate::models::account::Account;
use crate::models::money::Money;
use crate::models::transaction::{NewTransaction, TransactionRecord};

use super::{Ledger, LedgerTx};

#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: DbPool,
}

impl PgLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// A PostgreSQL transaction. sqlx rolls it back when dropped uncommitted.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

impl Ledger for PgLedger {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> Result<PgLedgerTx, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgLedgerTx { tx })
    }

    async fn account_exists(&self, account_id: &str) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE account_id = $1)")
                .bind(account_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn find_account(&self, account_id: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT account_id, balance_cents, updated_at FROM accounts WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn list_transactions(
        &self,
        account_id: &str,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let records = sqlx::query_as::<_, TransactionRecord>(
            r#"
            SELECT id, account_id, kind, amount_cents, idempotency_key, created_at
            FROM transactions
            WHERE account_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

impl LedgerTx for PgLedgerTx {
    async fn lock_balance(&mut self, account_id: &str) -> Result<Option<Money>, StoreError> {
        // FOR UPDATE blocks other units touching this row until we commit or roll back
        let balance: Option<Money> = sqlx::query_scalar(
            "SELECT balance_cents FROM accounts WHERE account_id = $1 FOR UPDATE",
        )
        .bind(account_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(balance)
    }

    async fn adjust_balance(&mut self, account_id: &str, delta: Money) -> Result<u64, StoreError> {
        let rows = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents + $1,
                updated_at = NOW()
            WHERE account_id = $2
            "#,
        )
        .bind(delta)
        .bind(account_id)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        Ok(rows)
    }

    async fn append_transaction(
        &mut self,
        entry: NewTransaction<'_>,
    ) -> Result<TransactionRecord, StoreError> {
        let record = sqlx::query_as::<_, TransactionRecord>(
            r#"
            INSERT INTO transactions (account_id, kind, amount_cents, idempotency_key)
            VALUES ($1, $2, $3, $4)
            RETURNING id, account_id, kind, amount_cents, idempotency_key, created_at
            "#,
        )
        .bind(entry.account_id)
        .bind(entry.kind)
        .bind(entry.amount)
        .bind(entry.idempotency_key)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn find_by_idempotency_key(
        &mut self,
        key: &str,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        let record = sqlx::query_as::<_, TransactionRecord>(
            r#"
            SELECT id, account_id, kind, amount_cents, idempotency_key, created_at
            FROM transactions
            WHERE idempotency_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
