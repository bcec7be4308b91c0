pub mod hub;

pub use hub::{BroadcastHub, HubEvent, Subscription, Topic};
