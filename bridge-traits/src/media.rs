//! Media source capability.
//!
//! Turns an opaque track identifier into something a [`ContentFetcher`]
//! can download. Hosts typically implement this on top of their account
//! session: the locator carries a signed URL or an authorization header.
//!
//! [`ContentFetcher`]: crate::http::ContentFetcher

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// A resolved, fetchable address for a track's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaLocator {
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl MediaLocator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    /// Adds a request header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Adds an `Authorization: Bearer` header.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.header("Authorization", value)
    }
}

/// Resolves playable locators for track identifiers.
///
/// # Errors
///
/// Implementations report expired or missing credentials as
/// [`BridgeError::Unauthorized`](crate::error::BridgeError::Unauthorized)
/// and transport failures as
/// [`BridgeError::Network`](crate::error::BridgeError::Network).
///
/// # Example
///
/// ```ignore
/// use bridge_traits::media::{MediaLocator, MediaSource};
///
/// struct SignedUrls { token: String }
///
/// #[async_trait::async_trait]
/// impl MediaSource for SignedUrls {
///     async fn resolve_locator(&self, track_id: &str) -> Result<MediaLocator> {
///         Ok(MediaLocator::new(format!("https://cdn.example.com/{track_id}"))
///             .bearer_token(&self.token))
///     }
/// }
/// ```
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Resolve the locator for a track's audio.
    async fn resolve_locator(&self, track_id: &str) -> Result<MediaLocator>;

    /// Resolve the locator for a track's artwork, when the source has any.
    async fn resolve_artwork(&self, _track_id: &str) -> Result<Option<MediaLocator>> {
        Ok(None)
    }
}
