use crate::db::ledger::{Ledger, LedgerTx};
use crate::db::{with_tx, Isolation};
use crate::errors::{AppError, AppResult};
use crate::models::User;

/// User account and balance operations outside the bidding protocol.
pub struct UserService<L> {
    ledger: L,
}

impl<L: Ledger> UserService<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub async fn register(&self, username: &str) -> AppResult<i64> {
        let username = username.to_owned();
        let user_id = with_tx(&self.ledger, Isolation::ReadCommitted, move |tx| {
            Box::pin(async move {
                tx.create_user(&username)
                    .await
                    .map_err(|e| e.wrap("failed to create user"))
            })
        })
        .await?;

        tracing::info!(user_id, "user registered");
        Ok(user_id)
    }

    pub async fn deposit(&self, user_id: i64, amount: i64) -> AppResult<()> {
        if amount <= 0 {
            return Err(AppError::NonPositiveAmount);
        }

        with_tx(&self.ledger, Isolation::ReadCommitted, move |tx| {
            Box::pin(async move {
                tx.get_user(user_id)
                    .await
                    .map_err(|e| e.wrap("failed to load user"))?
                    .ok_or(AppError::UserNotFound)?;

                tx.adjust_balance(user_id, amount)
                    .await
                    .map_err(|e| e.wrap("failed to credit balance"))
            })
        })
        .await?;

        tracing::info!(user_id, amount, "balance deposited");
        Ok(())
    }

    pub async fn get(&self, user_id: i64) -> AppResult<User> {
        with_tx(&self.ledger, Isolation::ReadCommitted, move |tx| {
            Box::pin(async move {
                tx.get_user(user_id)
                    .await
                    .map_err(|e| e.wrap("failed to load user"))?
                    .ok_or(AppError::UserNotFound)
            })
        })
        .await
    }
}
