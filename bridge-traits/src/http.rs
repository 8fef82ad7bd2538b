//! Content fetcher capability.
//!
//! Downloads the bytes behind a [`MediaLocator`] as an async stream so the
//! engine can write large tracks to slot storage without holding them in
//! memory.

use async_trait::async_trait;
use bytes::Bytes;
use core_async::io::{AsyncRead, AsyncReadExt};
use std::fmt;

use crate::error::{BridgeError, Result};
use crate::media::MediaLocator;

/// Boxed byte stream handed out by fetchers.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// A response body plus the length the server announced, if any.
pub struct FetchResponse {
    pub stream: ByteStream,
    pub content_length: Option<u64>,
}

impl FetchResponse {
    pub fn new(stream: ByteStream) -> Self {
        Self {
            stream,
            content_length: None,
        }
    }

    pub fn with_content_length(mut self, length: Option<u64>) -> Self {
        self.content_length = length;
        self
    }

    /// Wraps an in-memory body.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data: Bytes = data.into();
        let length = data.len() as u64;
        Self::new(Box::new(std::io::Cursor::new(data))).with_content_length(Some(length))
    }

    /// Reads the whole body, refusing anything larger than `limit` bytes.
    pub async fn into_bytes(mut self, limit: usize) -> Result<Bytes> {
        if let Some(length) = self.content_length {
            if length > limit as u64 {
                return Err(BridgeError::OperationFailed(format!(
                    "response of {} bytes exceeds limit of {} bytes",
                    length, limit
                )));
            }
        }

        let mut buffer = Vec::new();
        let mut limited = (&mut self.stream).take(limit as u64 + 1);
        limited
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| BridgeError::Network(format!("failed to read response body: {}", e)))?;

        if buffer.len() > limit {
            return Err(BridgeError::OperationFailed(format!(
                "response exceeds limit of {} bytes",
                limit
            )));
        }
        Ok(Bytes::from(buffer))
    }
}

impl fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResponse")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Fetches remote content.
///
/// # Errors
///
/// - [`BridgeError::Network`] for transport failures and unexpected status codes
/// - [`BridgeError::Certificate`] when TLS verification fails
/// - [`BridgeError::Unauthorized`] / [`BridgeError::PermissionDenied`] for 401 / 403
/// - [`BridgeError::NotFound`] for 404
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, locator: &MediaLocator) -> Result<FetchResponse>;
}
