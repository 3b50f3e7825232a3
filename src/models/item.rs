use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database row for the items table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub start_price: i64,
    /// Auction duration in seconds, counted from `started_at`.
    pub time_window: i64,
    /// Set once when the item is published.
    pub started_at: Option<DateTime<Utc>>,
    pub status: String,
    /// Set exactly once by the pick-winner job, after the item finished.
    pub winner_bid_id: Option<i64>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

/// Item lifecycle status constants.
pub mod item_status {
    pub const DRAFT: &str = "DRAFT";
    pub const ONGOING: &str = "ONGOING";
    pub const FINISHED: &str = "FINISHED";
}

impl Item {
    /// True once the auction window has elapsed relative to `now`.
    pub fn expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.started_at {
            Some(started) => now >= started + chrono::Duration::seconds(self.time_window),
            None => false,
        }
    }
}
