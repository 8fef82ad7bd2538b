//! Storage abstraction.
//!
//! Each buffer slot owns a private directory below the cache root. The
//! engine writes audio through [`FileSystemAccess::open_write_stream`] and
//! removes the directory with [`FileSystemAccess::delete_dir_all`] when the
//! queue closes.

use async_trait::async_trait;
use bytes::Bytes;
use core_async::io::AsyncWrite;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File system access trait.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn scratch(fs: &dyn FileSystemAccess) -> Result<()> {
///     let dir = fs.get_cache_directory().await?.join("buffer1");
///     fs.create_dir_all(&dir).await?;
///     fs.write_file(&dir.join("artwork"), Bytes::from_static(b"...")).await?;
///     fs.delete_dir_all(&dir).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Directory for disposable data the system may reclaim.
    async fn get_cache_directory(&self) -> Result<PathBuf>;

    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Create a directory and all missing parents.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to a file, replacing any previous content.
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Open a file for streaming writes, truncating any previous content.
    async fn open_write_stream(&self, path: &Path) -> Result<Box<dyn AsyncWrite + Send + Unpin>>;

    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Delete a directory and everything below it.
    ///
    /// Implementations report a missing directory as
    /// [`BridgeError::NotFound`](crate::error::BridgeError::NotFound) so
    /// callers can decide whether that counts as success.
    async fn delete_dir_all(&self, path: &Path) -> Result<()>;
}
