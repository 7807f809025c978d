pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod poller;
pub mod store;

pub use crate::config::{FeedConfig, PollConfig, RetryConfig, StoreConfig, TableName};
pub use crate::error::QuakewatchError;
pub use crate::event::Event;
pub use crate::feed::{FeedSource, FeedWindow};
pub use crate::poller::Poller;
pub use crate::store::EventStore;
