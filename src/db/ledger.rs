use async_trait::async_trait;

use crate::db::Isolation;
use crate::errors::AppResult;
use crate::models::{Bid, Item, User};

/// Storage seam for the bidding protocol and the settlement pipeline.
///
/// Implementations: [`crate::db::pg::PgLedger`] (Postgres) and
/// [`crate::db::memory::MemLedger`] (in-memory double used by the tests).
#[async_trait]
pub trait Ledger: Send + Sync {
    type Tx: LedgerTx;

    async fn begin(&self, isolation: Isolation) -> AppResult<Self::Tx>;
}

/// Item, bid and user persistence operations scoped to one open transaction.
///
/// The settlement scans share one pagination contract: rows whose id is
/// `>= cursor`, ordered ascending, at most `limit` of them. Callers pass
/// `batch_size + 1` as the limit; the extra row is a probe that only yields
/// the next cursor and must not be handed to the mark/credit operations.
#[async_trait]
pub trait LedgerTx: Send {
    // --- users ---
    async fn create_user(&mut self, username: &str) -> AppResult<i64>;
    async fn get_user(&mut self, user_id: i64) -> AppResult<Option<User>>;
    async fn adjust_balance(&mut self, user_id: i64, delta: i64) -> AppResult<()>;

    // --- items ---
    async fn create_item(
        &mut self,
        name: &str,
        start_price: i64,
        time_window: i64,
        created_by: i64,
    ) -> AppResult<i64>;
    async fn get_item(&mut self, item_id: i64) -> AppResult<Option<Item>>;
    /// Moves the item to ONGOING and stamps `started_at`.
    async fn publish_item(&mut self, item_id: i64) -> AppResult<()>;

    // --- bids ---
    async fn get_bid(&mut self, bid_id: i64) -> AppResult<Option<Bid>>;
    async fn bids_for_item(&mut self, item_id: i64) -> AppResult<Vec<Bid>>;
    /// Highest-amount bid on the item across all users, active or not.
    async fn highest_bid(&mut self, item_id: i64) -> AppResult<Option<Bid>>;
    /// Deactivates the user's current active bid on the item, marking it
    /// returned, and reports the amount it had escrowed (0 when there was
    /// no active bid).
    async fn deactivate_prev_bid(&mut self, item_id: i64, user_id: i64) -> AppResult<i64>;
    async fn insert_bid(&mut self, item_id: i64, user_id: i64, amount: i64) -> AppResult<i64>;

    // --- settlement scans (id >= cursor, ascending, up to limit rows) ---
    /// ONGOING items whose time window has elapsed.
    async fn finishable_items(&mut self, cursor: i64, limit: i64) -> AppResult<Vec<i64>>;
    async fn mark_items_finished(&mut self, item_ids: &[i64]) -> AppResult<u64>;

    /// FINISHED items that have no winner bid recorded yet.
    async fn winnerless_items(&mut self, cursor: i64, limit: i64) -> AppResult<Vec<i64>>;
    /// Records each item's highest active bid as its winner. Items without
    /// any active bid are left untouched.
    async fn assign_winning_bids(&mut self, item_ids: &[i64]) -> AppResult<u64>;

    /// Active, unreturned bids that lost an item whose winner is known.
    async fn refundable_bids(&mut self, cursor: i64, limit: i64) -> AppResult<Vec<i64>>;
    /// Marks the bids returned; reports the ids actually flipped.
    async fn mark_bids_returned(&mut self, bid_ids: &[i64]) -> AppResult<Vec<i64>>;
    /// Credits each bidder with the summed amount of their bids in the set.
    async fn credit_returned_bids(&mut self, bid_ids: &[i64]) -> AppResult<()>;

    /// Active, unpaid winner bids.
    async fn payable_bids(&mut self, cursor: i64, limit: i64) -> AppResult<Vec<i64>>;
    /// Marks the bids paid; reports the ids actually flipped.
    async fn mark_bids_paid(&mut self, bid_ids: &[i64]) -> AppResult<Vec<i64>>;
    /// Credits each item creator with the summed winning amounts.
    async fn credit_item_creators(&mut self, bid_ids: &[i64]) -> AppResult<()>;

    async fn commit(self) -> AppResult<()>;
    async fn rollback(self) -> AppResult<()>;
}
