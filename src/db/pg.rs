use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::db::ledger::{Ledger, LedgerTx};
use crate::db::Isolation;
use crate::errors::AppResult;
use crate::models::{item_status, Bid, Item, User};

/// Postgres-backed ledger.
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Ledger for PgLedger {
    type Tx = PgLedgerTx;

    async fn begin(&self, isolation: Isolation) -> AppResult<PgLedgerTx> {
        let mut tx = self.pool.begin().await?;

        // Must run before the transaction's first query.
        sqlx::query(&format!(
            "SET TRANSACTION ISOLATION LEVEL {}",
            isolation.as_sql()
        ))
        .execute(&mut *tx)
        .await?;

        Ok(PgLedgerTx { tx })
    }
}

pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn create_user(&mut self, username: &str) -> AppResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username) VALUES ($1) RETURNING id",
        )
        .bind(username)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(id)
    }

    async fn get_user(&mut self, user_id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(user)
    }

    async fn adjust_balance(&mut self, user_id: i64, delta: i64) -> AppResult<()> {
        sqlx::query("UPDATE users SET balance = balance + $2 WHERE id = $1")
            .bind(user_id)
            .bind(delta)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn create_item(
        &mut self,
        name: &str,
        start_price: i64,
        time_window: i64,
        created_by: i64,
    ) -> AppResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO items (name, start_price, time_window, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(start_price)
        .bind(time_window)
        .bind(created_by)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(id)
    }

    async fn get_item(&mut self, item_id: i64) -> AppResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
            .bind(item_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(item)
    }

    async fn publish_item(&mut self, item_id: i64) -> AppResult<()> {
        sqlx::query("UPDATE items SET status = $2, started_at = now() WHERE id = $1")
            .bind(item_id)
            .bind(item_status::ONGOING)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn get_bid(&mut self, bid_id: i64) -> AppResult<Option<Bid>> {
        let bid = sqlx::query_as::<_, Bid>("SELECT * FROM bids WHERE id = $1")
            .bind(bid_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(bid)
    }

    async fn bids_for_item(&mut self, item_id: i64) -> AppResult<Vec<Bid>> {
        let bids = sqlx::query_as::<_, Bid>(
            "SELECT * FROM bids WHERE item_id = $1 ORDER BY id ASC",
        )
        .bind(item_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(bids)
    }

    async fn highest_bid(&mut self, item_id: i64) -> AppResult<Option<Bid>> {
        let bid = sqlx::query_as::<_, Bid>(
            "SELECT * FROM bids WHERE item_id = $1 ORDER BY amount DESC LIMIT 1",
        )
        .bind(item_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(bid)
    }

    async fn deactivate_prev_bid(&mut self, item_id: i64, user_id: i64) -> AppResult<i64> {
        let amount = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE bids SET is_active = false, is_returned = true
            FROM (
                SELECT id, amount FROM bids
                WHERE item_id = $1 AND user_id = $2 AND is_active
                ORDER BY amount DESC
                LIMIT 1
            ) prev
            WHERE bids.id = prev.id
            RETURNING prev.amount
            "#,
        )
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(amount.unwrap_or(0))
    }

    async fn insert_bid(&mut self, item_id: i64, user_id: i64, amount: i64) -> AppResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO bids (item_id, user_id, amount) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(item_id)
        .bind(user_id)
        .bind(amount)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(id)
    }

    async fn finishable_items(&mut self, cursor: i64, limit: i64) -> AppResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM items
            WHERE status = $3
              AND now() >= started_at + time_window * INTERVAL '1 second'
              AND id >= $1
            ORDER BY id ASC
            LIMIT $2
            "#,
        )
        .bind(cursor)
        .bind(limit)
        .bind(item_status::ONGOING)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(ids)
    }

    async fn mark_items_finished(&mut self, item_ids: &[i64]) -> AppResult<u64> {
        let res = sqlx::query("UPDATE items SET status = $2 WHERE id = ANY($1) AND status = $3")
            .bind(item_ids)
            .bind(item_status::FINISHED)
            .bind(item_status::ONGOING)
            .execute(&mut *self.tx)
            .await?;

        Ok(res.rows_affected())
    }

    async fn winnerless_items(&mut self, cursor: i64, limit: i64) -> AppResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM items
            WHERE status = $3 AND winner_bid_id IS NULL AND id >= $1
            ORDER BY id ASC
            LIMIT $2
            "#,
        )
        .bind(cursor)
        .bind(limit)
        .bind(item_status::FINISHED)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(ids)
    }

    async fn assign_winning_bids(&mut self, item_ids: &[i64]) -> AppResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE items i SET winner_bid_id = w.bid_id
            FROM (
                SELECT DISTINCT ON (item_id) item_id, id AS bid_id
                FROM bids
                WHERE item_id = ANY($1) AND is_active
                ORDER BY item_id ASC, amount DESC
            ) w
            WHERE i.id = w.item_id AND i.winner_bid_id IS NULL
            "#,
        )
        .bind(item_ids)
        .execute(&mut *self.tx)
        .await?;

        Ok(res.rows_affected())
    }

    async fn refundable_bids(&mut self, cursor: i64, limit: i64) -> AppResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT b.id FROM bids b
            JOIN items i ON i.id = b.item_id
            WHERE b.is_active AND NOT b.is_returned
              AND b.id <> i.winner_bid_id
              AND b.id >= $1
            ORDER BY b.id ASC
            LIMIT $2
            "#,
        )
        .bind(cursor)
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(ids)
    }

    async fn mark_bids_returned(&mut self, bid_ids: &[i64]) -> AppResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "UPDATE bids SET is_returned = true WHERE id = ANY($1) AND NOT is_returned RETURNING id",
        )
        .bind(bid_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(ids)
    }

    async fn credit_returned_bids(&mut self, bid_ids: &[i64]) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users u SET balance = u.balance + r.total
            FROM (
                SELECT user_id, SUM(amount) AS total
                FROM bids
                WHERE id = ANY($1)
                GROUP BY user_id
            ) r
            WHERE u.id = r.user_id
            "#,
        )
        .bind(bid_ids)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn payable_bids(&mut self, cursor: i64, limit: i64) -> AppResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT b.id FROM bids b
            JOIN items i ON i.id = b.item_id
            WHERE b.is_active AND NOT b.is_paid
              AND b.id = i.winner_bid_id
              AND b.id >= $1
            ORDER BY b.id ASC
            LIMIT $2
            "#,
        )
        .bind(cursor)
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(ids)
    }

    async fn mark_bids_paid(&mut self, bid_ids: &[i64]) -> AppResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "UPDATE bids SET is_paid = true WHERE id = ANY($1) AND NOT is_paid RETURNING id",
        )
        .bind(bid_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(ids)
    }

    async fn credit_item_creators(&mut self, bid_ids: &[i64]) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users u SET balance = u.balance + p.total
            FROM (
                SELECT i.created_by AS user_id, SUM(b.amount) AS total
                FROM bids b
                JOIN items i ON i.winner_bid_id = b.id
                WHERE b.id = ANY($1)
                GROUP BY i.created_by
            ) p
            WHERE u.id = p.user_id
            "#,
        )
        .bind(bid_ids)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
