pub mod config;
pub mod error;
pub mod feed;
pub mod storage;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use feed::{Article, FeedFetcher, FeedState, FetchOutcome};
