use metrics::counter;

use crate::cache::Cache;
use crate::db::ledger::{Ledger, LedgerTx};
use crate::db::{with_tx, Isolation};
use crate::errors::{AppError, AppResult};
use crate::models::{item_status, Bid};
use crate::services::cooldown::CooldownGate;

/// Bid placement protocol.
///
/// Each bid is validated and committed as one SERIALIZABLE transaction; a
/// serialization conflict surfaces as a failed bid, never a silent retry.
pub struct BidService<L, C> {
    ledger: L,
    cooldown: CooldownGate<C>,
}

impl<L: Ledger, C: Cache> BidService<L, C> {
    pub fn new(ledger: L, cooldown: CooldownGate<C>) -> Self {
        Self { ledger, cooldown }
    }

    pub async fn place_bid(&self, user_id: i64, item_id: i64, amount: i64) -> AppResult<()> {
        let on_cooldown = self
            .cooldown
            .is_on_cooldown(user_id)
            .await
            .map_err(|e| e.wrap("failed to check bid cooldown"))?;
        if on_cooldown {
            counter!("bids_rejected_total").increment(1);
            return Err(AppError::CooldownActive(self.cooldown.ttl_secs()));
        }

        let res = with_tx(&self.ledger, Isolation::Serializable, move |tx| {
            Box::pin(async move {
                let item = tx
                    .get_item(item_id)
                    .await
                    .map_err(|e| e.wrap("failed to load item"))?
                    .ok_or(AppError::ItemNotFound)?;

                match item.status.as_str() {
                    item_status::ONGOING => {}
                    item_status::FINISHED => return Err(AppError::ItemFinished),
                    // Drafts are not visible to bidders.
                    _ => return Err(AppError::ItemNotFound),
                }

                if item.created_by == user_id {
                    return Err(AppError::OwnItem);
                }
                if amount <= item.start_price {
                    return Err(AppError::BidNotAboveStart);
                }

                let user = tx
                    .get_user(user_id)
                    .await
                    .map_err(|e| e.wrap("failed to load bidding user"))?
                    .ok_or(AppError::UserNotFound)?;

                // No bids yet counts as a zero-amount baseline; equal bids
                // never win.
                let highest = tx
                    .highest_bid(item_id)
                    .await
                    .map_err(|e| e.wrap("failed to load current highest bid"))?
                    .map(|b| b.amount)
                    .unwrap_or(0);
                if amount <= highest {
                    return Err(AppError::BidNotAboveHighest);
                }

                // The user's previous active bid already escrows part of the
                // new amount; only the difference is charged.
                let prev_amount = tx
                    .deactivate_prev_bid(item_id, user_id)
                    .await
                    .map_err(|e| e.wrap("failed to deactivate previous bid"))?;

                let delta = amount - prev_amount;
                if delta > user.balance {
                    return Err(AppError::InsufficientBalance);
                }

                tx.adjust_balance(user_id, -delta)
                    .await
                    .map_err(|e| e.wrap("failed to debit balance"))?;
                tx.insert_bid(item_id, user_id, amount)
                    .await
                    .map_err(|e| e.wrap("failed to insert bid"))?;

                Ok(())
            })
        })
        .await;

        match res {
            Ok(()) => {
                counter!("bids_placed_total").increment(1);
                tracing::info!(user_id, item_id, amount, "bid placed");

                // The bid is already durable; the gate is advisory.
                if let Err(err) = self.cooldown.set_cooldown(user_id).await {
                    tracing::warn!(user_id, error = %err.chain(), "failed to set bid cooldown");
                }
                Ok(())
            }
            Err(err) => {
                counter!("bids_rejected_total").increment(1);
                Err(err)
            }
        }
    }

    /// All bids on an item, oldest first.
    pub async fn bids_for_item(&self, item_id: i64) -> AppResult<Vec<Bid>> {
        with_tx(&self.ledger, Isolation::ReadCommitted, move |tx| {
            Box::pin(async move {
                tx.bids_for_item(item_id)
                    .await
                    .map_err(|e| e.wrap("failed to list bids for item"))
            })
        })
        .await
    }
}
