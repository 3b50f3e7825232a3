use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::Item;

/// Database row for the bids table.
///
/// A user holds at most one active bid per item; the active bid's amount is
/// the user's escrow hold on that item. Losing bids stay active until the
/// refund job returns them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bid {
    pub id: i64,
    pub item_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub is_active: bool,
    pub is_returned: bool,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
}

impl Bid {
    /// Winner status is derived from the item, never stored on the bid.
    pub fn is_winner(&self, item: &Item) -> bool {
        item.winner_bid_id == Some(self.id)
    }
}
