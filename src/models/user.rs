use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database row for the users table.
///
/// `balance` is kept non-negative by the bid placement preconditions; there is
/// deliberately no DB constraint backing that invariant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}
