pub mod bid;
pub mod item;
pub mod user;

pub use bid::Bid;
pub use item::{item_status, Item};
pub use user::User;
