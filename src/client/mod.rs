//! HTTP transport used by the probe sampler and throughput workers

#[cfg(test)]
pub(crate) mod mock;

use crate::error::{AppError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use reqwest::{Client, Url};
use std::time::Duration;

/// Chunk lengths of a download body, in arrival order
pub type ByteStream = BoxStream<'static, Result<usize>>;

/// Query parameter carrying the per-request cache-busting token
pub const CACHE_BUST_PARAM: &str = "nocache";

/// HTTP client trait for abstraction and testing
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue one request to `url` and resolve once response headers arrive
    ///
    /// Any HTTP status counts as a response. Returns the status code.
    async fn probe(&self, url: &str) -> Result<u16>;

    /// Start a download and hand back its body as a stream of chunk lengths
    ///
    /// A non-success status is an error so the caller restarts instead of
    /// counting an error page as throughput.
    async fn open_download(&self, url: &str) -> Result<ByteStream>;

    /// POST `payload` to `url` and resolve once the exchange completes
    ///
    /// The response status is returned but carries no meaning for the caller.
    async fn upload(&self, url: &str, payload: Bytes) -> Result<u16>;
}

/// Append a fresh cache-busting token to `base`
pub fn cache_busted_url(base: &str) -> Result<String> {
    let mut url = Url::parse(base)?;
    url.query_pairs_mut()
        .append_pair(CACHE_BUST_PARAM, &uuid::Uuid::new_v4().simple().to_string());
    Ok(url.into())
}

fn no_cache_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}

/// reqwest-backed client shared by every stream of a run
///
/// Only the connect phase carries a timeout here. Throughput phases are
/// bounded by their deadline and probes by the sampler's own timeout, so a
/// whole-request timeout would cut long downloads short.
#[derive(Debug, Clone)]
pub struct NetworkClient {
    client: Client,
}

impl NetworkClient {
    /// Create a new network client
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(crate::defaults::USER_AGENT)
            .default_headers(no_cache_headers())
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for NetworkClient {
    async fn probe(&self, url: &str) -> Result<u16> {
        let target = cache_busted_url(url)?;
        let response = self.client.get(target).send().await?;
        Ok(response.status().as_u16())
    }

    async fn open_download(&self, url: &str) -> Result<ByteStream> {
        let target = cache_busted_url(url)?;
        let response = self.client.get(target).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::http_request(format!(
                "Download returned HTTP {}",
                status.as_u16()
            )));
        }

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.len()).map_err(AppError::from));
        Ok(chunks.boxed())
    }

    async fn upload(&self, url: &str, payload: Bytes) -> Result<u16> {
        let target = cache_busted_url(url)?;
        let response = self
            .client
            .post(target)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        // Drain so the connection can go back to the pool
        let _ = response.bytes().await;
        Ok(status)
    }
}
