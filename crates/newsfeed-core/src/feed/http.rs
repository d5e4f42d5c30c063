use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, USER_AGENT};
use reqwest::{Client, Proxy};

use super::models::ApiErrorBody;
use crate::config::SyncConfig;
use crate::{Error, Result};

const CLIENT_USER_AGENT: &str = concat!("newsfeed/", env!("CARGO_PKG_VERSION"));

/// Network collaborator of the fetcher: one GET, whole body back
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    /// Fetch `url`, failing on transport errors and non-success statuses
    async fn get(&self, url: &str) -> Result<Bytes>;
}

/// HTTP client backed by reqwest
pub struct ReqwestHttpClient {
    client: Client,
    max_response_bytes: usize,
}

impl ReqwestHttpClient {
    /// Create a new client with configuration
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let client = Self::build_client(config.request_timeout_secs, &config.proxy_url)?;

        Ok(Self {
            client,
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// Build HTTP client with optional timeout and proxy
    fn build_client(timeout_secs: Option<u64>, proxy_url: &Option<String>) -> Result<Client> {
        let mut builder = Client::builder()
            .default_headers(Self::build_headers())
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        if let Some(ref proxy) = proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for article requests");
        }

        builder.build().map_err(Error::Http)
    }

    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        headers
    }

    fn ensure_content_size(&self, size: usize) -> Result<()> {
        if size > self.max_response_bytes {
            return Err(Error::ResponseTooLarge {
                size,
                limit: self.max_response_bytes,
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<Bytes> {
        // reqwest errors carry the full URL, which includes the API key
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.without_url()))?;
        let status = response.status();

        if let Some(len) = response.content_length() {
            self.ensure_content_size(len as usize)?;
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Http(e.without_url()))?;
        self.ensure_content_size(body.len())?;

        if !status.is_success() {
            return Err(status_error(status.as_u16(), response_url(url), &body));
        }

        Ok(body)
    }
}

/// Strip the query string so keys never end up in error messages
fn response_url(url: &str) -> String {
    url.split('?').next().unwrap_or(url).to_string()
}

/// Build a status error, lifting the API's own message out of the body
fn status_error(status: u16, url: String, body: &[u8]) -> Error {
    let message = serde_json::from_slice::<ApiErrorBody>(body)
        .ok()
        .and_then(|err| match (err.code, err.message) {
            (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
            (None, Some(message)) => Some(message),
            (Some(code), None) => Some(code),
            (None, None) => None,
        });

    Error::Status {
        status,
        url,
        message,
    }
}
