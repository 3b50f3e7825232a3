use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::ledger::{Ledger, LedgerTx};
use crate::db::Isolation;
use crate::errors::AppResult;
use crate::models::{item_status, Bid, Item, User};

/// In-memory ledger implementing the same contract as the Postgres one.
///
/// State lives in id-ordered tables behind a single mutex; `begin` takes the
/// lock and snapshots the tables, so transactions are fully serialized and
/// `rollback` restores the snapshot. The clock is a stored value advanced
/// explicitly, which keeps time-window expiry deterministic in tests.
#[derive(Clone)]
pub struct MemLedger {
    state: Arc<Mutex<MemState>>,
}

#[derive(Clone)]
struct MemState {
    users: BTreeMap<i64, User>,
    items: BTreeMap<i64, Item>,
    bids: BTreeMap<i64, Bid>,
    next_user_id: i64,
    next_item_id: i64,
    next_bid_id: i64,
    now: DateTime<Utc>,
}

impl MemLedger {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemState {
                users: BTreeMap::new(),
                items: BTreeMap::new(),
                bids: BTreeMap::new(),
                next_user_id: 1,
                next_item_id: 1,
                next_bid_id: 1,
                now: Utc::now(),
            })),
        }
    }

    /// Move the ledger clock forward.
    pub async fn advance_clock(&self, secs: i64) {
        self.state.lock().await.now += Duration::seconds(secs);
    }
}

impl Default for MemLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemLedger {
    type Tx = MemLedgerTx;

    // The global lock is stricter than any of the isolation levels.
    async fn begin(&self, _isolation: Isolation) -> AppResult<MemLedgerTx> {
        let state = Arc::clone(&self.state).lock_owned().await;
        let snapshot = state.clone();
        Ok(MemLedgerTx { state, snapshot })
    }
}

pub struct MemLedgerTx {
    state: OwnedMutexGuard<MemState>,
    snapshot: MemState,
}

#[async_trait]
impl LedgerTx for MemLedgerTx {
    async fn create_user(&mut self, username: &str) -> AppResult<i64> {
        let id = self.state.next_user_id;
        self.state.next_user_id += 1;
        let now = self.state.now;
        self.state.users.insert(
            id,
            User {
                id,
                username: username.to_owned(),
                balance: 0,
                created_at: now,
            },
        );
        Ok(id)
    }

    async fn get_user(&mut self, user_id: i64) -> AppResult<Option<User>> {
        Ok(self.state.users.get(&user_id).cloned())
    }

    async fn adjust_balance(&mut self, user_id: i64, delta: i64) -> AppResult<()> {
        if let Some(user) = self.state.users.get_mut(&user_id) {
            user.balance += delta;
        }
        Ok(())
    }

    async fn create_item(
        &mut self,
        name: &str,
        start_price: i64,
        time_window: i64,
        created_by: i64,
    ) -> AppResult<i64> {
        let id = self.state.next_item_id;
        self.state.next_item_id += 1;
        let now = self.state.now;
        self.state.items.insert(
            id,
            Item {
                id,
                name: name.to_owned(),
                start_price,
                time_window,
                started_at: None,
                status: item_status::DRAFT.to_owned(),
                winner_bid_id: None,
                created_by,
                created_at: now,
            },
        );
        Ok(id)
    }

    async fn get_item(&mut self, item_id: i64) -> AppResult<Option<Item>> {
        Ok(self.state.items.get(&item_id).cloned())
    }

    async fn publish_item(&mut self, item_id: i64) -> AppResult<()> {
        let now = self.state.now;
        if let Some(item) = self.state.items.get_mut(&item_id) {
            item.status = item_status::ONGOING.to_owned();
            item.started_at = Some(now);
        }
        Ok(())
    }

    async fn get_bid(&mut self, bid_id: i64) -> AppResult<Option<Bid>> {
        Ok(self.state.bids.get(&bid_id).cloned())
    }

    async fn bids_for_item(&mut self, item_id: i64) -> AppResult<Vec<Bid>> {
        Ok(self
            .state
            .bids
            .values()
            .filter(|b| b.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn highest_bid(&mut self, item_id: i64) -> AppResult<Option<Bid>> {
        Ok(self
            .state
            .bids
            .values()
            .filter(|b| b.item_id == item_id)
            .max_by_key(|b| b.amount)
            .cloned())
    }

    async fn deactivate_prev_bid(&mut self, item_id: i64, user_id: i64) -> AppResult<i64> {
        let prev_id = self
            .state
            .bids
            .values()
            .filter(|b| b.item_id == item_id && b.user_id == user_id && b.is_active)
            .max_by_key(|b| b.amount)
            .map(|b| b.id);

        if let Some(id) = prev_id {
            if let Some(bid) = self.state.bids.get_mut(&id) {
                bid.is_active = false;
                bid.is_returned = true;
                return Ok(bid.amount);
            }
        }
        Ok(0)
    }

    async fn insert_bid(&mut self, item_id: i64, user_id: i64, amount: i64) -> AppResult<i64> {
        let id = self.state.next_bid_id;
        self.state.next_bid_id += 1;
        let now = self.state.now;
        self.state.bids.insert(
            id,
            Bid {
                id,
                item_id,
                user_id,
                amount,
                is_active: true,
                is_returned: false,
                is_paid: false,
                created_at: now,
            },
        );
        Ok(id)
    }

    async fn finishable_items(&mut self, cursor: i64, limit: i64) -> AppResult<Vec<i64>> {
        let now = self.state.now;
        Ok(self
            .state
            .items
            .values()
            .filter(|i| i.id >= cursor && i.status == item_status::ONGOING && i.expired_at(now))
            .map(|i| i.id)
            .take(limit as usize)
            .collect())
    }

    async fn mark_items_finished(&mut self, item_ids: &[i64]) -> AppResult<u64> {
        let mut finished = 0;
        for id in item_ids {
            if let Some(item) = self.state.items.get_mut(id) {
                if item.status == item_status::ONGOING {
                    item.status = item_status::FINISHED.to_owned();
                    finished += 1;
                }
            }
        }
        Ok(finished)
    }

    async fn winnerless_items(&mut self, cursor: i64, limit: i64) -> AppResult<Vec<i64>> {
        Ok(self
            .state
            .items
            .values()
            .filter(|i| {
                i.id >= cursor && i.status == item_status::FINISHED && i.winner_bid_id.is_none()
            })
            .map(|i| i.id)
            .take(limit as usize)
            .collect())
    }

    async fn assign_winning_bids(&mut self, item_ids: &[i64]) -> AppResult<u64> {
        let mut assigned = 0;
        for item_id in item_ids {
            let winner = self
                .state
                .bids
                .values()
                .filter(|b| b.item_id == *item_id && b.is_active)
                .max_by_key(|b| b.amount)
                .map(|b| b.id);

            if let Some(bid_id) = winner {
                if let Some(item) = self.state.items.get_mut(item_id) {
                    if item.winner_bid_id.is_none() {
                        item.winner_bid_id = Some(bid_id);
                        assigned += 1;
                    }
                }
            }
        }
        Ok(assigned)
    }

    async fn refundable_bids(&mut self, cursor: i64, limit: i64) -> AppResult<Vec<i64>> {
        let items = &self.state.items;
        Ok(self
            .state
            .bids
            .values()
            .filter(|b| {
                b.id >= cursor
                    && b.is_active
                    && !b.is_returned
                    && items
                        .get(&b.item_id)
                        .and_then(|i| i.winner_bid_id)
                        .is_some_and(|winner| winner != b.id)
            })
            .map(|b| b.id)
            .take(limit as usize)
            .collect())
    }

    async fn mark_bids_returned(&mut self, bid_ids: &[i64]) -> AppResult<Vec<i64>> {
        let mut flipped = Vec::new();
        for id in bid_ids {
            if let Some(bid) = self.state.bids.get_mut(id) {
                if !bid.is_returned {
                    bid.is_returned = true;
                    flipped.push(*id);
                }
            }
        }
        Ok(flipped)
    }

    async fn credit_returned_bids(&mut self, bid_ids: &[i64]) -> AppResult<()> {
        let mut totals: BTreeMap<i64, i64> = BTreeMap::new();
        for id in bid_ids {
            if let Some(bid) = self.state.bids.get(id) {
                *totals.entry(bid.user_id).or_default() += bid.amount;
            }
        }
        for (user_id, total) in totals {
            if let Some(user) = self.state.users.get_mut(&user_id) {
                user.balance += total;
            }
        }
        Ok(())
    }

    async fn payable_bids(&mut self, cursor: i64, limit: i64) -> AppResult<Vec<i64>> {
        let items = &self.state.items;
        Ok(self
            .state
            .bids
            .values()
            .filter(|b| {
                b.id >= cursor
                    && b.is_active
                    && !b.is_paid
                    && items.get(&b.item_id).map(|i| i.winner_bid_id) == Some(Some(b.id))
            })
            .map(|b| b.id)
            .take(limit as usize)
            .collect())
    }

    async fn mark_bids_paid(&mut self, bid_ids: &[i64]) -> AppResult<Vec<i64>> {
        let mut flipped = Vec::new();
        for id in bid_ids {
            if let Some(bid) = self.state.bids.get_mut(id) {
                if !bid.is_paid {
                    bid.is_paid = true;
                    flipped.push(*id);
                }
            }
        }
        Ok(flipped)
    }

    async fn credit_item_creators(&mut self, bid_ids: &[i64]) -> AppResult<()> {
        let mut totals: BTreeMap<i64, i64> = BTreeMap::new();
        for id in bid_ids {
            if let Some(bid) = self.state.bids.get(id) {
                if let Some(item) = self.state.items.get(&bid.item_id) {
                    if item.winner_bid_id == Some(bid.id) {
                        *totals.entry(item.created_by).or_default() += bid.amount;
                    }
                }
            }
        }
        for (user_id, total) in totals {
            if let Some(user) = self.state.users.get_mut(&user_id) {
                user.balance += total;
            }
        }
        Ok(())
    }

    async fn commit(self) -> AppResult<()> {
        // Mutations were applied in place; dropping the guard publishes them.
        Ok(())
    }

    async fn rollback(self) -> AppResult<()> {
        let MemLedgerTx {
            mut state,
            snapshot,
        } = self;
        *state = snapshot;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rollback_restores_the_snapshot() {
        let ledger = MemLedger::new();

        let mut tx = ledger.begin(Isolation::ReadCommitted).await.unwrap();
        tx.create_user("ghost").await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = ledger.begin(Isolation::ReadCommitted).await.unwrap();
        assert!(tx.get_user(1).await.unwrap().is_none());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn deactivating_a_prev_bid_reports_its_escrowed_amount() {
        let ledger = MemLedger::new();

        let mut tx = ledger.begin(Isolation::ReadCommitted).await.unwrap();
        let user = tx.create_user("alice").await.unwrap();
        let item = tx.create_item("lamp", 10, 60, user).await.unwrap();
        let bid = tx.insert_bid(item, user, 50).await.unwrap();

        assert_eq!(tx.deactivate_prev_bid(item, user).await.unwrap(), 50);
        let bid = tx.get_bid(bid).await.unwrap().unwrap();
        assert!(!bid.is_active);
        assert!(bid.is_returned);

        // No active bid left to deactivate.
        assert_eq!(tx.deactivate_prev_bid(item, user).await.unwrap(), 0);
        tx.commit().await.unwrap();
    }
}
