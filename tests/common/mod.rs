use gavel::cache::MemCache;
use gavel::db::memory::MemLedger;
use gavel::models::{Bid, Item};
use gavel::services::bidding::BidService;
use gavel::services::cooldown::CooldownGate;
use gavel::services::items::ItemService;
use gavel::services::users::UserService;

#[allow(dead_code)]
pub const COOLDOWN_SECS: u64 = 5;

/// Engine wired onto the in-memory ledger and cache.
pub struct TestApp {
    pub ledger: MemLedger,
    pub gate: CooldownGate<MemCache>,
    pub bids: BidService<MemLedger, MemCache>,
    pub items: ItemService<MemLedger>,
    pub users: UserService<MemLedger>,
}

pub fn setup() -> TestApp {
    let ledger = MemLedger::new();
    let cache = MemCache::new();
    let gate = CooldownGate::new(cache, COOLDOWN_SECS);

    TestApp {
        bids: BidService::new(ledger.clone(), gate.clone()),
        items: ItemService::new(ledger.clone()),
        users: UserService::new(ledger.clone()),
        gate,
        ledger,
    }
}

impl TestApp {
    /// Registered user with a funded balance.
    #[allow(dead_code)]
    pub async fn seed_user(&self, username: &str, balance: i64) -> i64 {
        let user_id = self.users.register(username).await.expect("register user");
        if balance > 0 {
            self.users
                .deposit(user_id, balance)
                .await
                .expect("fund user");
        }
        user_id
    }

    /// Published item, open for bids.
    #[allow(dead_code)]
    pub async fn seed_open_item(&self, creator: i64, start_price: i64, time_window: i64) -> i64 {
        let item_id = self
            .items
            .create("seeded item", start_price, time_window, creator)
            .await
            .expect("create item");
        self.items
            .publish(creator, item_id)
            .await
            .expect("publish item");
        item_id
    }

    /// Place a bid and drop the cooldown it leaves behind, for tests that
    /// are not about the cooldown gate.
    #[allow(dead_code)]
    pub async fn bid_and_clear_cooldown(&self, user_id: i64, item_id: i64, amount: i64) {
        self.bids
            .place_bid(user_id, item_id, amount)
            .await
            .expect("place bid");
        self.gate.clear(user_id).await.expect("clear cooldown");
    }

    #[allow(dead_code)]
    pub async fn balance(&self, user_id: i64) -> i64 {
        self.users.get(user_id).await.expect("get user").balance
    }

    #[allow(dead_code)]
    pub async fn item(&self, item_id: i64) -> Item {
        self.items.get(item_id).await.expect("get item")
    }

    #[allow(dead_code)]
    pub async fn bids_for(&self, item_id: i64) -> Vec<Bid> {
        self.bids
            .bids_for_item(item_id)
            .await
            .expect("list bids for item")
    }
}
