use crate::db::ledger::{Ledger, LedgerTx};
use crate::db::{with_tx, Isolation};
use crate::errors::{AppError, AppResult};
use crate::models::{item_status, Item};

/// Item lifecycle: created as a draft by its owner, opened for bids on
/// publish. Finishing is the settlement pipeline's job only.
pub struct ItemService<L> {
    ledger: L,
}

impl<L: Ledger> ItemService<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub async fn create(
        &self,
        name: &str,
        start_price: i64,
        time_window: i64,
        created_by: i64,
    ) -> AppResult<i64> {
        let name = name.to_owned();
        let item_id = with_tx(&self.ledger, Isolation::ReadCommitted, move |tx| {
            Box::pin(async move {
                tx.create_item(&name, start_price, time_window, created_by)
                    .await
                    .map_err(|e| e.wrap("failed to create item"))
            })
        })
        .await?;

        tracing::info!(item_id, created_by, "item created");
        Ok(item_id)
    }

    pub async fn publish(&self, user_id: i64, item_id: i64) -> AppResult<()> {
        with_tx(&self.ledger, Isolation::ReadCommitted, move |tx| {
            Box::pin(async move {
                let item = tx
                    .get_item(item_id)
                    .await
                    .map_err(|e| e.wrap("failed to load item"))?
                    .ok_or(AppError::ItemNotFound)?;

                if item.created_by != user_id {
                    return Err(AppError::NotOwner);
                }
                if item.status != item_status::DRAFT {
                    return Err(AppError::ItemNotDraft);
                }

                tx.publish_item(item_id)
                    .await
                    .map_err(|e| e.wrap("failed to publish item"))
            })
        })
        .await?;

        tracing::info!(item_id, "item published");
        Ok(())
    }

    pub async fn get(&self, item_id: i64) -> AppResult<Item> {
        with_tx(&self.ledger, Isolation::ReadCommitted, move |tx| {
            Box::pin(async move {
                tx.get_item(item_id)
                    .await
                    .map_err(|e| e.wrap("failed to load item"))?
                    .ok_or(AppError::ItemNotFound)
            })
        })
        .await
    }
}
