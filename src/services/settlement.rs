//! Settlement pipeline step functions.
//!
//! Each step is one short transaction over one page of work and follows the
//! probe contract from `services::batch`: select `batch_size + 1` candidate
//! ids, split off the probe row, then mark and credit only the rest. The
//! probe row is never mutated by the step that selected it, so a later call
//! (or a full rescan from cursor 0) can only touch rows that still need the
//! transition. The four steps are independent jobs; the pipeline converges
//! across scheduler ticks rather than inside one of them.

use metrics::counter;

use crate::db::ledger::{Ledger, LedgerTx};
use crate::db::{with_tx, Isolation};
use crate::errors::AppResult;
use crate::services::batch::page_cursor;

/// Move ONGOING items whose time window has elapsed to FINISHED.
pub async fn finish_items_step<L: Ledger>(
    ledger: &L,
    batch_size: usize,
    cursor: i64,
) -> AppResult<i64> {
    with_tx(ledger, Isolation::ReadCommitted, move |tx| {
        Box::pin(async move {
            let page = tx
                .finishable_items(cursor, batch_size as i64 + 1)
                .await
                .map_err(|e| e.wrap("failed to select finishable items"))?;
            let (ids, next) = page_cursor(page, batch_size);
            if ids.is_empty() {
                return Ok(0);
            }

            let finished = tx
                .mark_items_finished(&ids)
                .await
                .map_err(|e| e.wrap("failed to finish items"))?;

            counter!("settlement_items_finished_total").increment(finished);
            tracing::debug!(finished, next_cursor = next, "finish-items step");
            Ok(next)
        })
    })
    .await
}

/// Record the winning bid on finished items that have none yet.
pub async fn pick_winner_step<L: Ledger>(
    ledger: &L,
    batch_size: usize,
    cursor: i64,
) -> AppResult<i64> {
    with_tx(ledger, Isolation::ReadCommitted, move |tx| {
        Box::pin(async move {
            let page = tx
                .winnerless_items(cursor, batch_size as i64 + 1)
                .await
                .map_err(|e| e.wrap("failed to select winnerless items"))?;
            let (ids, next) = page_cursor(page, batch_size);
            if ids.is_empty() {
                return Ok(0);
            }

            // Items with no active bids are skipped here and picked up again
            // on a later scan.
            let assigned = tx
                .assign_winning_bids(&ids)
                .await
                .map_err(|e| e.wrap("failed to assign winning bids"))?;

            counter!("settlement_winners_picked_total").increment(assigned);
            tracing::debug!(assigned, next_cursor = next, "pick-winner step");
            Ok(next)
        })
    })
    .await
}

/// Return losing bids: mark them returned and release their escrow back to
/// the bidders, one summed credit per user.
pub async fn refund_step<L: Ledger>(
    ledger: &L,
    batch_size: usize,
    cursor: i64,
) -> AppResult<i64> {
    with_tx(ledger, Isolation::ReadCommitted, move |tx| {
        Box::pin(async move {
            let page = tx
                .refundable_bids(cursor, batch_size as i64 + 1)
                .await
                .map_err(|e| e.wrap("failed to select refundable bids"))?;
            let (ids, next) = page_cursor(page, batch_size);
            if ids.is_empty() {
                return Ok(0);
            }

            // Credit exactly the rows the mark flipped, nothing else.
            let returned = tx
                .mark_bids_returned(&ids)
                .await
                .map_err(|e| e.wrap("failed to mark bids returned"))?;
            if !returned.is_empty() {
                tx.credit_returned_bids(&returned)
                    .await
                    .map_err(|e| e.wrap("failed to refund bidders"))?;
            }

            counter!("settlement_bids_refunded_total").increment(returned.len() as u64);
            tracing::debug!(refunded = returned.len(), next_cursor = next, "refund step");
            Ok(next)
        })
    })
    .await
}

/// Pay sellers: mark winning bids paid and credit each item's creator with
/// the winning amount.
pub async fn pay_step<L: Ledger>(ledger: &L, batch_size: usize, cursor: i64) -> AppResult<i64> {
    with_tx(ledger, Isolation::ReadCommitted, move |tx| {
        Box::pin(async move {
            let page = tx
                .payable_bids(cursor, batch_size as i64 + 1)
                .await
                .map_err(|e| e.wrap("failed to select payable bids"))?;
            let (ids, next) = page_cursor(page, batch_size);
            if ids.is_empty() {
                return Ok(0);
            }

            let paid = tx
                .mark_bids_paid(&ids)
                .await
                .map_err(|e| e.wrap("failed to mark bids paid"))?;
            if !paid.is_empty() {
                tx.credit_item_creators(&paid)
                    .await
                    .map_err(|e| e.wrap("failed to pay item creators"))?;
            }

            counter!("settlement_bids_paid_total").increment(paid.len() as u64);
            tracing::debug!(paid = paid.len(), next_cursor = next, "pay step");
            Ok(next)
        })
    })
    .await
}
