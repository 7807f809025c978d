pub mod client;

pub use crate::client::UsgsFeedClient;
