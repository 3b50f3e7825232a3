pub mod ledger;
pub mod memory;
pub mod pg;

use futures_util::future::BoxFuture;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::errors::AppResult;
use ledger::{Ledger, LedgerTx};

pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    // Verify connectivity
    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(pool)
}

/// Transaction isolation levels the ledger can run under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl Isolation {
    pub fn as_sql(self) -> &'static str {
        match self {
            Isolation::ReadCommitted => "READ COMMITTED",
            Isolation::RepeatableRead => "REPEATABLE READ",
            Isolation::Serializable => "SERIALIZABLE",
        }
    }
}

/// Run `op` inside a single ledger transaction.
///
/// The business result always wins: a commit or rollback failure is logged
/// and never overrides the outcome `op` produced.
pub async fn with_tx<L, T, F>(ledger: &L, isolation: Isolation, op: F) -> AppResult<T>
where
    L: Ledger,
    F: for<'t> FnOnce(&'t mut L::Tx) -> BoxFuture<'t, AppResult<T>>,
{
    let mut tx = ledger
        .begin(isolation)
        .await
        .map_err(|e| e.wrap("failed to begin transaction"))?;

    match op(&mut tx).await {
        Ok(value) => {
            if let Err(err) = tx.commit().await {
                tracing::error!(error = %err.chain(), "transaction commit failed");
            }
            Ok(value)
        }
        Err(err) => {
            if let Err(rb_err) = tx.rollback().await {
                tracing::error!(error = %rb_err.chain(), "transaction rollback failed");
            }
            Err(err)
        }
    }
}
