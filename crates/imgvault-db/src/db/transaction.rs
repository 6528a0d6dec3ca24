//! Transaction guard for multi-row writes.

use std::ops::{Deref, DerefMut};

use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};

use super::error::{StoreError, StoreResult};

/// Owns a transaction until it is committed or rolled back.
///
/// Dropping an unfinished guard drops the inner transaction, which sqlx rolls
/// back when the connection returns to the pool; the guard only logs it.
///
/// ```ignore
/// let mut tx = TransactionGuard::begin(&pool, "assets.insert_many").await?;
/// sqlx::query("INSERT INTO ...").execute(&mut **tx).await?;
/// tx.commit().await?;
/// ```
pub struct TransactionGuard<'a> {
    transaction: Option<Transaction<'a, Postgres>>,
    operation: &'static str,
}

impl<'a> TransactionGuard<'a> {
    pub async fn begin(pool: &'a PgPool, operation: &'static str) -> StoreResult<Self> {
        let transaction = pool
            .begin()
            .await
            .with_context(|| format!("Failed to begin transaction for {}", operation))
            .map_err(StoreError::Transaction)?;

        Ok(Self {
            transaction: Some(transaction),
            operation,
        })
    }

    pub async fn commit(mut self) -> StoreResult<()> {
        if let Some(tx) = self.transaction.take() {
            tx.commit()
                .await
                .with_context(|| format!("Failed to commit transaction for {}", self.operation))
                .map_err(StoreError::Transaction)?;
        }
        Ok(())
    }

    pub async fn rollback(mut self) -> StoreResult<()> {
        if let Some(tx) = self.transaction.take() {
            tx.rollback()
                .await
                .with_context(|| format!("Failed to roll back transaction for {}", self.operation))
                .map_err(StoreError::Transaction)?;
        }
        Ok(())
    }
}

impl<'a> Deref for TransactionGuard<'a> {
    type Target = Transaction<'a, Postgres>;

    fn deref(&self) -> &Self::Target {
        self.transaction
            .as_ref()
            .expect("Transaction was already committed or rolled back")
    }
}

impl<'a> DerefMut for TransactionGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.transaction
            .as_mut()
            .expect("Transaction was already committed or rolled back")
    }
}

impl<'a> Drop for TransactionGuard<'a> {
    fn drop(&mut self) {
        if self.transaction.is_some() {
            tracing::warn!(
                operation = self.operation,
                "Transaction dropped without commit or rollback - it will be rolled back"
            );
        }
    }
}
