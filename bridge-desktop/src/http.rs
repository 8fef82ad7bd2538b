//! Content fetcher implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{ContentFetcher, FetchResponse},
    media::MediaLocator,
};
use futures_util::TryStreamExt;
use reqwest::{Client, StatusCode};
use std::error::Error as _;
use std::time::Duration;
use tracing::{debug, warn};

/// Reqwest-based content fetcher.
///
/// Bodies are streamed through `tokio_util::io::StreamReader`, so a track is
/// never buffered in memory as a whole. There is no overall request timeout:
/// a large track on a slow link is allowed to take as long as it needs, and
/// only the connect phase is bounded.
pub struct ReqwestContentFetcher {
    client: Client,
}

impl ReqwestContentFetcher {
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(Duration::from_secs(10))
    }

    pub fn with_connect_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .pool_max_idle_per_host(4)
            .user_agent(concat!("gapless-queue/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Maps a transport failure, singling out TLS certificate problems.
    fn classify_error(error: reqwest::Error) -> BridgeError {
        let mut source = error.source();
        while let Some(cause) = source {
            let text = cause.to_string().to_ascii_lowercase();
            if text.contains("certificate") || text.contains("invalidcert") {
                return BridgeError::Certificate(cause.to_string());
            }
            source = cause.source();
        }

        if error.is_timeout() {
            BridgeError::Network(format!("request timed out: {}", error))
        } else if error.is_connect() {
            BridgeError::Network(format!("connection failed: {}", error))
        } else {
            BridgeError::Network(error.to_string())
        }
    }

    fn classify_status(status: StatusCode, url: &str) -> BridgeError {
        match status {
            StatusCode::UNAUTHORIZED => BridgeError::Unauthorized(format!("{} returned 401", url)),
            StatusCode::FORBIDDEN => BridgeError::PermissionDenied(format!("{} returned 403", url)),
            StatusCode::NOT_FOUND => BridgeError::NotFound(url.to_string()),
            other => BridgeError::Network(format!("HTTP error: {}", other)),
        }
    }
}

#[async_trait]
impl ContentFetcher for ReqwestContentFetcher {
    async fn fetch(&self, locator: &MediaLocator) -> Result<FetchResponse> {
        let mut request = self.client.get(&locator.url);
        for (key, value) in &locator.headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(|e| {
            let error = Self::classify_error(e);
            warn!(error = %error, "Content request failed");
            error
        })?;

        let status = response.status();
        if !status.is_success() {
            let url = response.url().path().to_string();
            return Err(Self::classify_status(status, &url));
        }

        let content_length = response.content_length();
        debug!(status = %status, content_length, "Streaming content body");

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let reader = tokio_util::io::StreamReader::new(stream);

        Ok(FetchResponse::new(Box::new(reader)).with_content_length(content_length))
    }
}
