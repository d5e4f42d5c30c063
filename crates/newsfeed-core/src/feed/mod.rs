mod fetcher;
mod http;
mod models;
mod query;

pub use fetcher::{load_cached, FeedFetcher, FeedState, FetchOutcome, FEED_CACHE_KEY};
pub use http::{HttpClient, ReqwestHttpClient};
pub use models::{Article, SearchResponse};
pub use query::{applied_term, RequestBuilder, MIN_SEARCH_TERM_CHARS};
