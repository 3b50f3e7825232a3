mod common;

use common::{setup, COOLDOWN_SECS};
use gavel::errors::AppError;
use gavel::services::settlement::finish_items_step;

#[tokio::test]
async fn rejects_bid_on_missing_item() {
    let app = setup();
    let alice = app.seed_user("alice", 500).await;

    let err = app.bids.place_bid(alice, 999, 100).await.unwrap_err();
    assert!(matches!(err, AppError::ItemNotFound));
}

#[tokio::test]
async fn rejects_bid_on_unpublished_item() {
    let app = setup();
    let seller = app.seed_user("seller", 0).await;
    let alice = app.seed_user("alice", 500).await;
    let item = app
        .items
        .create("draft item", 100, 60, seller)
        .await
        .unwrap();

    // Drafts read as missing to bidders.
    let err = app.bids.place_bid(alice, item, 200).await.unwrap_err();
    assert!(matches!(err, AppError::ItemNotFound));
}

#[tokio::test]
async fn rejects_bid_on_finished_item() {
    let app = setup();
    let seller = app.seed_user("seller", 0).await;
    let alice = app.seed_user("alice", 500).await;
    let item = app.seed_open_item(seller, 100, 10).await;

    app.ledger.advance_clock(11).await;
    finish_items_step(&app.ledger, 10, 0).await.unwrap();

    let err = app.bids.place_bid(alice, item, 200).await.unwrap_err();
    assert!(matches!(err, AppError::ItemFinished));
}

#[tokio::test]
async fn rejects_bid_on_own_item() {
    let app = setup();
    let seller = app.seed_user("seller", 500).await;
    let item = app.seed_open_item(seller, 100, 60).await;

    let err = app.bids.place_bid(seller, item, 200).await.unwrap_err();
    assert!(matches!(err, AppError::OwnItem));
}

#[tokio::test]
async fn rejects_bid_equal_to_start_price() {
    let app = setup();
    let seller = app.seed_user("seller", 0).await;
    let alice = app.seed_user("alice", 500).await;
    let item = app.seed_open_item(seller, 100, 60).await;

    // Must be strictly greater than the start price.
    let err = app.bids.place_bid(alice, item, 100).await.unwrap_err();
    assert!(matches!(err, AppError::BidNotAboveStart));
    assert_eq!(app.balance(alice).await, 500);
}

#[tokio::test]
async fn rejects_bid_equal_to_current_highest() {
    let app = setup();
    let seller = app.seed_user("seller", 0).await;
    let alice = app.seed_user("alice", 500).await;
    let bob = app.seed_user("bob", 500).await;
    let item = app.seed_open_item(seller, 100, 60).await;

    app.bid_and_clear_cooldown(alice, item, 150).await;

    // Equal bids do not win.
    let err = app.bids.place_bid(bob, item, 150).await.unwrap_err();
    assert!(matches!(err, AppError::BidNotAboveHighest));
    assert_eq!(app.balance(bob).await, 500);
}

#[tokio::test]
async fn rejects_bid_exceeding_balance() {
    let app = setup();
    let seller = app.seed_user("seller", 0).await;
    let alice = app.seed_user("alice", 120).await;
    let item = app.seed_open_item(seller, 100, 60).await;

    let err = app.bids.place_bid(alice, item, 150).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientBalance));

    // Nothing was escrowed and no bid row survived the rollback.
    assert_eq!(app.balance(alice).await, 120);
    assert!(app.bids_for(item).await.is_empty());
}

#[tokio::test]
async fn first_bid_escrows_the_full_amount() {
    let app = setup();
    let seller = app.seed_user("seller", 0).await;
    let alice = app.seed_user("alice", 500).await;
    let item = app.seed_open_item(seller, 100, 60).await;

    app.bids.place_bid(alice, item, 150).await.unwrap();

    assert_eq!(app.balance(alice).await, 350);
    let bids = app.bids_for(item).await;
    assert_eq!(bids.len(), 1);
    assert!(bids[0].is_active);
    assert!(!bids[0].is_returned);
    assert_eq!(bids[0].amount, 150);
}

#[tokio::test]
async fn raising_own_bid_debits_only_the_difference() {
    let app = setup();
    let seller = app.seed_user("seller", 0).await;
    let alice = app.seed_user("alice", 500).await;
    let item = app.seed_open_item(seller, 100, 60).await;

    app.bid_and_clear_cooldown(alice, item, 150).await;
    app.bids.place_bid(alice, item, 180).await.unwrap();

    // 150 + (180 - 150): the raise only charges the increment.
    assert_eq!(app.balance(alice).await, 320);

    let bids = app.bids_for(item).await;
    assert_eq!(bids.len(), 2);

    // The replaced bid is released immediately, not deferred to settlement.
    let old = bids.iter().find(|b| b.amount == 150).unwrap();
    assert!(!old.is_active);
    assert!(old.is_returned);

    let active: Vec<_> = bids.iter().filter(|b| b.is_active).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].amount, 180);
}

#[tokio::test]
async fn outbid_rival_bid_stays_active() {
    let app = setup();
    let seller = app.seed_user("seller", 0).await;
    let alice = app.seed_user("alice", 500).await;
    let bob = app.seed_user("bob", 500).await;
    let item = app.seed_open_item(seller, 100, 60).await;

    app.bid_and_clear_cooldown(alice, item, 150).await;
    app.bids.place_bid(bob, item, 200).await.unwrap();

    // Alice's escrow is held until batch settlement, not released on outbid.
    assert_eq!(app.balance(alice).await, 350);
    let bids = app.bids_for(item).await;
    let alices = bids.iter().find(|b| b.user_id == alice).unwrap();
    assert!(alices.is_active);
    assert!(!alices.is_returned);
}

#[tokio::test]
async fn keeps_at_most_one_active_bid_per_user_and_item() {
    let app = setup();
    let seller = app.seed_user("seller", 0).await;
    let alice = app.seed_user("alice", 1000).await;
    let bob = app.seed_user("bob", 1000).await;
    let item = app.seed_open_item(seller, 100, 60).await;

    app.bid_and_clear_cooldown(alice, item, 150).await;
    app.bid_and_clear_cooldown(bob, item, 200).await;
    app.bid_and_clear_cooldown(alice, item, 250).await;
    app.bid_and_clear_cooldown(alice, item, 300).await;

    let bids = app.bids_for(item).await;
    assert_eq!(bids.len(), 4);
    let alice_active = bids
        .iter()
        .filter(|b| b.user_id == alice && b.is_active)
        .count();
    let bob_active = bids
        .iter()
        .filter(|b| b.user_id == bob && b.is_active)
        .count();
    assert_eq!(alice_active, 1);
    assert_eq!(bob_active, 1);

    // Total escrow matches the active holds: 300 for alice, 200 for bob.
    assert_eq!(app.balance(alice).await, 700);
    assert_eq!(app.balance(bob).await, 800);
}

#[tokio::test]
async fn rejects_second_bid_within_cooldown() {
    let app = setup();
    let seller = app.seed_user("seller", 0).await;
    let alice = app.seed_user("alice", 1000).await;
    let item = app.seed_open_item(seller, 100, 60).await;

    app.bids.place_bid(alice, item, 150).await.unwrap();

    let err = app.bids.place_bid(alice, item, 200).await.unwrap_err();
    assert!(matches!(err, AppError::CooldownActive(secs) if secs == COOLDOWN_SECS));

    // The rejection happened before any transaction work.
    assert_eq!(app.bids_for(item).await.len(), 1);
    assert_eq!(app.balance(alice).await, 850);
}

#[tokio::test]
async fn rejected_bids_do_not_arm_the_cooldown() {
    let app = setup();
    let seller = app.seed_user("seller", 0).await;
    let alice = app.seed_user("alice", 1000).await;
    let item = app.seed_open_item(seller, 100, 60).await;

    let err = app.bids.place_bid(alice, item, 50).await.unwrap_err();
    assert!(matches!(err, AppError::BidNotAboveStart));

    // A failed attempt leaves the user free to bid again at once.
    app.bids.place_bid(alice, item, 150).await.unwrap();
    assert_eq!(app.balance(alice).await, 850);
}
