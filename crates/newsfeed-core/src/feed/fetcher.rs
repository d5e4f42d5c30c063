use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::http::{HttpClient, ReqwestHttpClient};
use super::models::{Article, SearchResponse};
use super::query::{applied_term, redact_api_key, RequestBuilder};
use crate::config::AppConfig;
use crate::storage::{open_cache_store, CacheStore};
use crate::Result;

/// Cache key holding the last successful result set
pub const FEED_CACHE_KEY: &str = "@articles";

/// Signal surfaced by every feed operation
///
/// Failures never escape as errors; they resolve into one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The request succeeded with `count` articles in the new page
    Loaded { count: usize },
    /// A search term was applied and the API returned nothing
    NoResults,
    /// The request failed; `cached` articles were restored from the cache
    Offline { cached: usize },
    /// The request failed and there was nothing cached to fall back to
    Unavailable,
    /// `load_more` was called while a request was still in flight
    Skipped,
}

/// Session state of one feed listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedState {
    /// Accumulated articles, oldest page first
    pub articles: Vec<Article>,
    /// Last requested page (1-based)
    pub page: u32,
    /// Trimmed search term; only sent upstream when long enough
    pub search_term: String,
    /// True while a request is in flight
    pub is_loading: bool,
    /// True when `articles` came from the cache instead of the network
    pub fallback_active: bool,
    /// Signal of the most recently completed operation
    pub last_outcome: Option<FetchOutcome>,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            articles: Vec::new(),
            page: 1,
            search_term: String::new(),
            is_loading: false,
            fallback_active: false,
            last_outcome: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Merge {
    Append,
    Replace,
}

/// Paginated article fetcher with cache write-through and offline fallback
pub struct FeedFetcher {
    http: Arc<dyn HttpClient>,
    cache: Arc<dyn CacheStore>,
    requests: RequestBuilder,
    cache_key: String,
    /// Held from merge until the cache write lands, so writes hit the
    /// cache in the same order their merges hit `state`
    cache_write: Mutex<()>,
    state: RwLock<FeedState>,
}

impl FeedFetcher {
    /// Create a fetcher around explicit network and cache collaborators
    pub fn new(
        config: &AppConfig,
        http: Arc<dyn HttpClient>,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self> {
        Ok(Self {
            http,
            cache,
            requests: RequestBuilder::new(&config.api)?,
            cache_key: config.cache.key.clone(),
            cache_write: Mutex::new(()),
            state: RwLock::new(FeedState::default()),
        })
    }

    /// Create a fetcher using the reqwest client and the configured cache backend
    pub async fn open(config: &AppConfig) -> Result<Self> {
        if config.api.resolved_api_key().is_none() {
            tracing::warn!(
                "No API key configured; set api.api_key or {} to authenticate",
                crate::config::API_KEY_ENV
            );
        }

        let http = Arc::new(ReqwestHttpClient::new(&config.sync)?);
        let cache = open_cache_store(config).await?;
        Self::new(config, http, cache)
    }

    /// Snapshot of the current session state
    pub async fn state(&self) -> FeedState {
        self.state.read().await.clone()
    }

    /// Key the result set is cached under
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// Load the first page with no search filter
    pub async fn initial_load(&self) -> FetchOutcome {
        self.search("").await
    }

    /// Request the next page with the current search term and append it
    ///
    /// Does nothing while another request is in flight. The page counter
    /// advances before the request resolves and is not rolled back on failure.
    pub async fn load_more(&self) -> FetchOutcome {
        let (term, page) = {
            let mut state = self.state.write().await;
            if state.is_loading {
                tracing::debug!(page = state.page, "Request in flight, ignoring load_more");
                return FetchOutcome::Skipped;
            }
            state.is_loading = true;
            state.page += 1;
            (state.search_term.clone(), state.page)
        };

        self.run(term, page, Merge::Append).await
    }

    /// Reload page 1 with the current search term, replacing all articles
    pub async fn refresh(&self) -> FetchOutcome {
        let term = {
            let mut state = self.state.write().await;
            state.is_loading = true;
            state.page = 1;
            state.search_term.clone()
        };

        self.run(term, 1, Merge::Replace).await
    }

    /// Set a new search term and load its first page, replacing all articles
    pub async fn search(&self, term: &str) -> FetchOutcome {
        let term = {
            let mut state = self.state.write().await;
            state.is_loading = true;
            state.page = 1;
            state.search_term = term.trim().to_string();
            state.search_term.clone()
        };

        self.run(term, 1, Merge::Replace).await
    }

    async fn run(&self, term: String, page: u32, merge: Merge) -> FetchOutcome {
        let url = self.requests.page_url(&term, page);
        tracing::info!(
            page,
            query = applied_term(&term).unwrap_or(""),
            "Requesting articles"
        );
        tracing::debug!("GET {}", redact_api_key(&url));

        match self.fetch_page(url.as_str()).await {
            Ok(fresh) => self.apply_success(fresh, &term, merge).await,
            Err(e) => {
                tracing::warn!(page, "Article request failed: {}", e);
                self.apply_failure().await
            }
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<Vec<Article>> {
        let body = self.http.get(url).await?;
        let response: SearchResponse = serde_json::from_slice(&body)?;
        Ok(response.into_articles())
    }

    async fn apply_success(&self, fresh: Vec<Article>, term: &str, merge: Merge) -> FetchOutcome {
        let outcome = if fresh.is_empty() && applied_term(term).is_some() {
            FetchOutcome::NoResults
        } else {
            FetchOutcome::Loaded { count: fresh.len() }
        };

        let write_guard = self.cache_write.lock().await;
        let snapshot = {
            let mut state = self.state.write().await;
            match merge {
                Merge::Append => state.articles.extend(fresh),
                Merge::Replace => state.articles = fresh,
            }
            state.fallback_active = false;
            serde_json::to_string(&state.articles)
        };

        match snapshot {
            Ok(payload) => {
                if let Err(e) = self.cache.set(&self.cache_key, &payload).await {
                    tracing::warn!("Failed to cache articles: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to encode articles for cache: {}", e),
        }
        drop(write_guard);

        let mut state = self.state.write().await;
        state.is_loading = false;
        state.last_outcome = Some(outcome.clone());
        tracing::info!(
            total = state.articles.len(),
            page = state.page,
            "Articles loaded"
        );
        outcome
    }

    async fn apply_failure(&self) -> FetchOutcome {
        let cached = match load_cached(self.cache.as_ref(), &self.cache_key).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!("Cached articles unavailable: {}", e);
                None
            }
        };

        let mut state = self.state.write().await;
        let outcome = match cached {
            Some(articles) => {
                let cached = articles.len();
                state.articles = articles;
                state.fallback_active = true;
                tracing::warn!(cached, "Offline, showing cached articles");
                FetchOutcome::Offline { cached }
            }
            None => {
                tracing::error!("Unable to load articles and no cached copy exists");
                FetchOutcome::Unavailable
            }
        };
        state.is_loading = false;
        state.last_outcome = Some(outcome.clone());
        outcome
    }
}

/// Read and decode the cached result set stored under `key`
pub async fn load_cached(cache: &dyn CacheStore, key: &str) -> Result<Option<Vec<Article>>> {
    match cache.get(key).await? {
        Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryCacheStore;
    use crate::Error;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use tokio::sync::Notify;
    use url::Url;

    /// Scripted HTTP client: pops one canned response per call
    #[derive(Default)]
    struct FakeHttp {
        responses: Mutex<VecDeque<Result<Bytes>>>,
        requests: Mutex<Vec<String>>,
        gate: Mutex<Option<Arc<Notify>>>,
    }

    impl FakeHttp {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        async fn respond(&self, body: &str) {
            self.responses
                .lock()
                .await
                .push_back(Ok(Bytes::from(body.to_string())));
        }

        async fn fail(&self, status: u16) {
            self.responses.lock().await.push_back(Err(Error::Status {
                status,
                url: "https://newsapi.org/v2/everything".to_string(),
                message: None,
            }));
        }

        /// Hold the next request until the returned handle is notified
        async fn hold_next(&self) -> Arc<Notify> {
            let notify = Arc::new(Notify::new());
            *self.gate.lock().await = Some(notify.clone());
            notify
        }

        async fn requests(&self) -> Vec<Url> {
            self.requests
                .lock()
                .await
                .iter()
                .map(|u| Url::parse(u).unwrap())
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl HttpClient for FakeHttp {
        async fn get(&self, url: &str) -> Result<Bytes> {
            self.requests.lock().await.push(url.to_string());
            let gate = self.gate.lock().await.take();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.responses
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(Error::Other("no scripted response".to_string())))
        }
    }

    /// Cache whose every operation fails
    struct BrokenCache;

    #[async_trait::async_trait]
    impl CacheStore for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::Other("disk unavailable".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Other("disk full".to_string()))
        }
    }

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            author: Some(format!("{} author", title)),
            description: None,
            url: format!("https://techcrunch.com/{}", title.to_lowercase()),
            image_url: None,
        }
    }

    fn body(articles: &[Article]) -> String {
        serde_json::json!({
            "status": "ok",
            "totalResults": articles.len(),
            "articles": articles,
        })
        .to_string()
    }

    fn titles(articles: &[Article]) -> Vec<&str> {
        articles.iter().map(|a| a.title.as_str()).collect()
    }

    fn param(url: &Url, name: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    fn fetcher(http: Arc<FakeHttp>, cache: Arc<dyn CacheStore>) -> FeedFetcher {
        FeedFetcher::new(&AppConfig::default(), http, cache).unwrap()
    }

    #[tokio::test]
    async fn test_new_session_state() {
        let state = fetcher(FakeHttp::new(), Arc::new(MemoryCacheStore::new()))
            .state()
            .await;
        assert_eq!(state, FeedState::default());
        assert_eq!(state.page, 1);
        assert!(state.articles.is_empty());
        assert!(!state.is_loading);
        assert!(!state.fallback_active);
    }

    #[tokio::test]
    async fn test_initial_load_then_load_more_accumulates() {
        let http = FakeHttp::new();
        http.respond(&body(&[article("A"), article("B")])).await;
        http.respond(&body(&[article("C"), article("D")])).await;
        let fetcher = fetcher(http.clone(), Arc::new(MemoryCacheStore::new()));

        assert_eq!(fetcher.initial_load().await, FetchOutcome::Loaded { count: 2 });
        assert_eq!(fetcher.load_more().await, FetchOutcome::Loaded { count: 2 });

        let state = fetcher.state().await;
        assert_eq!(titles(&state.articles), ["A", "B", "C", "D"]);
        assert_eq!(state.page, 2);
        assert!(!state.is_loading);
        assert!(!state.fallback_active);

        let requests = http.requests().await;
        assert_eq!(param(&requests[0], "page").as_deref(), Some("1"));
        assert_eq!(param(&requests[1], "page").as_deref(), Some("2"));
        assert_eq!(param(&requests[1], "pageSize").as_deref(), Some("10"));
        assert!(param(&requests[0], "q").is_none());
    }

    #[tokio::test]
    async fn test_refresh_twice_replaces() {
        let http = FakeHttp::new();
        http.respond(&body(&[article("A"), article("B")])).await;
        http.respond(&body(&[article("C")])).await;
        http.respond(&body(&[article("D"), article("E")])).await;
        let fetcher = fetcher(http.clone(), Arc::new(MemoryCacheStore::new()));

        fetcher.initial_load().await;
        fetcher.refresh().await;
        fetcher.refresh().await;

        let state = fetcher.state().await;
        assert_eq!(titles(&state.articles), ["D", "E"]);
        assert_eq!(state.page, 1);
    }

    #[tokio::test]
    async fn test_refresh_resets_page_and_keeps_term() {
        let http = FakeHttp::new();
        http.respond(&body(&[article("A")])).await;
        http.respond(&body(&[article("B")])).await;
        http.respond(&body(&[article("C")])).await;
        let fetcher = fetcher(http.clone(), Arc::new(MemoryCacheStore::new()));

        fetcher.search("  robotics ").await;
        fetcher.load_more().await;
        fetcher.refresh().await;

        let state = fetcher.state().await;
        assert_eq!(state.search_term, "robotics");
        assert_eq!(state.page, 1);
        assert_eq!(titles(&state.articles), ["C"]);

        let requests = http.requests().await;
        assert_eq!(param(&requests[2], "q").as_deref(), Some("robotics"));
        assert_eq!(param(&requests[2], "page").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_search_scenario() {
        let http = FakeHttp::new();
        http.respond(&body(&[article("A"), article("B")])).await;
        http.respond(&body(&[])).await;
        let fetcher = fetcher(http.clone(), Arc::new(MemoryCacheStore::new()));

        assert_eq!(fetcher.search("ai").await, FetchOutcome::Loaded { count: 2 });
        assert_eq!(fetcher.search("ai tools").await, FetchOutcome::NoResults);

        let requests = http.requests().await;
        assert!(param(&requests[0], "q").is_none());
        assert_eq!(param(&requests[1], "q").as_deref(), Some("ai tools"));
        assert_eq!(param(&requests[1], "page").as_deref(), Some("1"));

        let state = fetcher.state().await;
        assert!(state.articles.is_empty());
        assert!(!state.fallback_active);
        assert_eq!(state.last_outcome, Some(FetchOutcome::NoResults));
    }

    #[tokio::test]
    async fn test_empty_unfiltered_page_is_not_no_results() {
        let http = FakeHttp::new();
        http.respond(r#"{"status":"ok"}"#).await;
        let fetcher = fetcher(http, Arc::new(MemoryCacheStore::new()));

        assert_eq!(fetcher.initial_load().await, FetchOutcome::Loaded { count: 0 });
    }

    #[tokio::test]
    async fn test_search_discards_previous_pages() {
        let http = FakeHttp::new();
        http.respond(&body(&[article("A")])).await;
        http.respond(&body(&[article("B")])).await;
        http.respond(&body(&[article("X")])).await;
        let fetcher = fetcher(http, Arc::new(MemoryCacheStore::new()));

        fetcher.initial_load().await;
        fetcher.load_more().await;
        fetcher.search("gadgets").await;

        let state = fetcher.state().await;
        assert_eq!(titles(&state.articles), ["X"]);
        assert_eq!(state.page, 1);
    }

    #[tokio::test]
    async fn test_load_more_while_loading_is_noop() {
        let http = FakeHttp::new();
        http.respond(&body(&[article("A")])).await;
        let gate = http.hold_next().await;
        let fetcher = fetcher(http.clone(), Arc::new(MemoryCacheStore::new()));

        let (refreshed, (skipped, during), ()) = tokio::join!(
            fetcher.refresh(),
            async {
                let outcome = fetcher.load_more().await;
                (outcome, fetcher.state().await)
            },
            async { gate.notify_one() },
        );

        assert_eq!(skipped, FetchOutcome::Skipped);
        assert!(during.is_loading);
        assert_eq!(during.page, 1);
        assert!(during.articles.is_empty());

        assert_eq!(refreshed, FetchOutcome::Loaded { count: 1 });
        let state = fetcher.state().await;
        assert_eq!(state.page, 1);
        assert!(!state.is_loading);
        assert_eq!(http.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_to_cache_on_network_failure() {
        let cached = serde_json::to_string(&[article("A"), article("B")]).unwrap();
        let cache = Arc::new(MemoryCacheStore::with_entry(FEED_CACHE_KEY, cached));
        let http = FakeHttp::new();
        http.fail(500).await;
        let fetcher = fetcher(http, cache);

        assert_eq!(fetcher.refresh().await, FetchOutcome::Offline { cached: 2 });

        let state = fetcher.state().await;
        assert_eq!(titles(&state.articles), ["A", "B"]);
        assert!(state.fallback_active);
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_failure_without_cache_is_unavailable() {
        let http = FakeHttp::new();
        http.fail(503).await;
        let fetcher = fetcher(http, Arc::new(MemoryCacheStore::new()));

        assert_eq!(fetcher.initial_load().await, FetchOutcome::Unavailable);

        let state = fetcher.state().await;
        assert!(state.articles.is_empty());
        assert!(!state.fallback_active);
        assert!(!state.is_loading);
        assert_eq!(state.last_outcome, Some(FetchOutcome::Unavailable));
    }

    #[tokio::test]
    async fn test_malformed_body_takes_failure_path() {
        let cached = serde_json::to_string(&[article("Cached")]).unwrap();
        let cache = Arc::new(MemoryCacheStore::with_entry(FEED_CACHE_KEY, cached));
        let http = FakeHttp::new();
        http.respond("<html>Bad gateway</html>").await;
        let fetcher = fetcher(http, cache);

        assert_eq!(fetcher.initial_load().await, FetchOutcome::Offline { cached: 1 });
        assert!(fetcher.state().await.fallback_active);
    }

    #[tokio::test]
    async fn test_failure_without_cache_keeps_loaded_articles() {
        let http = FakeHttp::new();
        http.respond(&body(&[article("A"), article("B")])).await;
        http.fail(502).await;
        let fetcher = fetcher(http, Arc::new(BrokenCache));

        fetcher.initial_load().await;
        assert_eq!(fetcher.load_more().await, FetchOutcome::Unavailable);

        let state = fetcher.state().await;
        assert_eq!(titles(&state.articles), ["A", "B"]);
        assert!(!state.fallback_active);
    }

    #[tokio::test]
    async fn test_failed_load_more_skips_page_on_retry() {
        let http = FakeHttp::new();
        http.respond(&body(&[article("A")])).await;
        http.fail(500).await;
        http.respond(&body(&[article("C")])).await;
        let fetcher = fetcher(http.clone(), Arc::new(MemoryCacheStore::new()));

        fetcher.initial_load().await;
        fetcher.load_more().await;
        assert_eq!(fetcher.state().await.page, 2);

        fetcher.load_more().await;
        let requests = http.requests().await;
        assert_eq!(param(&requests[1], "page").as_deref(), Some("2"));
        assert_eq!(param(&requests[2], "page").as_deref(), Some("3"));

        let state = fetcher.state().await;
        assert_eq!(state.page, 3);
        assert_eq!(titles(&state.articles), ["A", "C"]);
    }

    #[tokio::test]
    async fn test_cache_write_failure_is_ignored() {
        let http = FakeHttp::new();
        http.respond(&body(&[article("A")])).await;
        let fetcher = fetcher(http, Arc::new(BrokenCache));

        assert_eq!(fetcher.initial_load().await, FetchOutcome::Loaded { count: 1 });

        let state = fetcher.state().await;
        assert_eq!(titles(&state.articles), ["A"]);
        assert!(!state.fallback_active);
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_cache_holds_full_merged_articles() {
        let cache = Arc::new(MemoryCacheStore::new());
        let http = FakeHttp::new();
        http.respond(&body(&[article("A"), article("B")])).await;
        http.respond(&body(&[article("C")])).await;
        let fetcher = fetcher(http, cache.clone());

        fetcher.initial_load().await;
        fetcher.load_more().await;

        let cached = load_cached(cache.as_ref(), FEED_CACHE_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached, fetcher.state().await.articles);
        assert_eq!(titles(&cached), ["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_success_after_fallback_clears_flag() {
        let cached = serde_json::to_string(&[article("Old")]).unwrap();
        let cache = Arc::new(MemoryCacheStore::with_entry(FEED_CACHE_KEY, cached));
        let http = FakeHttp::new();
        http.fail(500).await;
        http.respond(&body(&[article("New")])).await;
        let fetcher = fetcher(http, cache);

        fetcher.initial_load().await;
        assert!(fetcher.state().await.fallback_active);

        assert_eq!(fetcher.refresh().await, FetchOutcome::Loaded { count: 1 });
        let state = fetcher.state().await;
        assert!(!state.fallback_active);
        assert_eq!(titles(&state.articles), ["New"]);
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_is_treated_as_missing() {
        let cache = Arc::new(MemoryCacheStore::with_entry(FEED_CACHE_KEY, "not json"));
        let http = FakeHttp::new();
        http.fail(500).await;
        let fetcher = fetcher(http, cache);

        assert_eq!(fetcher.refresh().await, FetchOutcome::Unavailable);
        assert!(!fetcher.state().await.fallback_active);
    }

    #[tokio::test]
    async fn test_custom_cache_key() {
        let mut config = AppConfig::default();
        config.cache.key = "@techcrunch".to_string();
        let cache = Arc::new(MemoryCacheStore::new());
        let http = FakeHttp::new();
        http.respond(&body(&[article("A")])).await;
        let fetcher = FeedFetcher::new(&config, http, cache.clone()).unwrap();

        fetcher.initial_load().await;
        assert_eq!(fetcher.cache_key(), "@techcrunch");
        assert!(cache.get("@techcrunch").await.unwrap().is_some());
        assert!(cache.get(FEED_CACHE_KEY).await.unwrap().is_none());
    }

    /// Cache whose first write waits until released
    struct HeldCache {
        inner: MemoryCacheStore,
        gate: Mutex<Option<Arc<Notify>>>,
    }

    #[async_trait::async_trait]
    impl CacheStore for HeldCache {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            let gate = self.gate.lock().await.take();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.inner.set(key, value).await
        }
    }

    #[tokio::test]
    async fn test_overlapping_writes_leave_cache_matching_state() {
        let gate = Arc::new(Notify::new());
        let cache = Arc::new(HeldCache {
            inner: MemoryCacheStore::new(),
            gate: Mutex::new(Some(gate.clone())),
        });
        let http = FakeHttp::new();
        http.respond(&body(&[article("A")])).await;
        http.respond(&body(&[article("X"), article("Y")])).await;
        let fetcher = fetcher(http, cache.clone());

        // The refresh's cache write stalls while the search completes
        let (refreshed, searched, ()) = tokio::join!(
            fetcher.refresh(),
            fetcher.search("gadgets"),
            async { gate.notify_one() },
        );
        assert_eq!(refreshed, FetchOutcome::Loaded { count: 1 });
        assert_eq!(searched, FetchOutcome::Loaded { count: 2 });

        let state = fetcher.state().await;
        assert_eq!(titles(&state.articles), ["X", "Y"]);
        let cached = load_cached(cache.as_ref(), FEED_CACHE_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached, state.articles);
    }
}
