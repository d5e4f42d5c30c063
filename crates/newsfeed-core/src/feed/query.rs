use url::Url;

use crate::config::ApiConfig;
use crate::Result;

/// Minimum trimmed length for a search term to be sent upstream
pub const MIN_SEARCH_TERM_CHARS: usize = 3;

/// Return the trimmed term if it is long enough to act as a filter
pub fn applied_term(term: &str) -> Option<&str> {
    let trimmed = term.trim();
    (trimmed.chars().count() >= MIN_SEARCH_TERM_CHARS).then_some(trimmed)
}

/// Builds page request URLs against the search endpoint
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    endpoint: Url,
    domains: String,
    sort_by: String,
    api_key: String,
    page_size: u32,
}

impl RequestBuilder {
    /// Create a builder from API configuration
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(crate::Error::Config(format!(
                "Unsupported endpoint scheme: {}",
                endpoint.scheme()
            )));
        }

        Ok(Self {
            endpoint,
            domains: config.domains.clone(),
            sort_by: config.sort_by.clone(),
            api_key: config.resolved_api_key().unwrap_or_default(),
            page_size: config.page_size.max(1),
        })
    }

    /// Build the URL for one page, adding `q` only for an applied term
    pub fn page_url(&self, term: &str, page: u32) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("domains", &self.domains)
                .append_pair("sortBy", &self.sort_by)
                .append_pair("apiKey", &self.api_key);
            if let Some(term) = applied_term(term) {
                pairs.append_pair("q", term);
            }
            pairs
                .append_pair("page", &page.to_string())
                .append_pair("pageSize", &self.page_size.to_string());
        }
        url
    }
}

/// Render a URL for logs with the API key masked
pub fn redact_api_key(url: &Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if k == "apiKey" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), value)
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}
