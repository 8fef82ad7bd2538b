//! # Prefetch Configuration
//!
//! Tuning for slot storage layout and materialization.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Number of buffer slots. Fixed: one per role.
pub const SLOT_COUNT: usize = 3;

/// Slot storage layout and materialization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefetchConfig {
    /// Directory below the file system's cache directory that holds the
    /// slot directories, used when `CoreConfig::buffer_root` is unset.
    ///
    /// Default: "queue-buffers".
    #[serde(default = "default_storage_directory")]
    pub storage_directory: String,

    /// Slot directories are named `<prefix>1` to `<prefix>3`.
    ///
    /// Default: "buffer".
    #[serde(default = "default_slot_directory_prefix")]
    pub slot_directory_prefix: String,

    /// Default: "audio".
    #[serde(default = "default_audio_file_name")]
    pub audio_file_name: String,

    /// Default: "artwork".
    #[serde(default = "default_artwork_file_name")]
    pub artwork_file_name: String,

    /// Fetch artwork into the slot alongside the audio. Artwork failures are
    /// logged and never fail materialization.
    ///
    /// Default: true.
    #[serde(default = "default_true")]
    pub fetch_artwork: bool,

    /// Upper bound for artwork bodies in bytes.
    ///
    /// Default: 8 MiB.
    #[serde(default = "default_max_artwork_bytes")]
    pub max_artwork_bytes: usize,

    /// Compare the stored audio against `Track::content_hash` when present.
    ///
    /// Default: true.
    #[serde(default = "default_true")]
    pub verify_integrity: bool,

    /// Bound on one whole materialization, in seconds. `None` waits for as
    /// long as the fetch takes.
    ///
    /// Default: none.
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,

    /// Read buffer used while streaming audio into storage.
    ///
    /// Default: 64 KiB.
    #[serde(default = "default_copy_buffer_size")]
    pub copy_buffer_size: usize,
}

fn default_storage_directory() -> String {
    "queue-buffers".to_string()
}

fn default_slot_directory_prefix() -> String {
    "buffer".to_string()
}

fn default_audio_file_name() -> String {
    "audio".to_string()
}

fn default_artwork_file_name() -> String {
    "artwork".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_artwork_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_copy_buffer_size() -> usize {
    64 * 1024
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            storage_directory: default_storage_directory(),
            slot_directory_prefix: default_slot_directory_prefix(),
            audio_file_name: default_audio_file_name(),
            artwork_file_name: default_artwork_file_name(),
            fetch_artwork: true,
            max_artwork_bytes: default_max_artwork_bytes(),
            verify_integrity: true,
            fetch_timeout_secs: None,
            copy_buffer_size: default_copy_buffer_size(),
        }
    }
}

impl PrefetchConfig {
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    /// Directory for slot `number` (1-based) below `root`.
    pub fn slot_directory(&self, root: &Path, number: usize) -> PathBuf {
        root.join(format!("{}{}", self.slot_directory_prefix, number))
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("storage_directory", &self.storage_directory),
            ("slot_directory_prefix", &self.slot_directory_prefix),
            ("audio_file_name", &self.audio_file_name),
            ("artwork_file_name", &self.artwork_file_name),
        ] {
            if value.is_empty() {
                return Err(format!("{} must not be empty", name));
            }
            if value.contains(&['/', '\\'][..]) || value == ".." || value == "." {
                return Err(format!("{} must be a single path component", name));
            }
        }

        if self.audio_file_name == self.artwork_file_name {
            return Err("audio_file_name and artwork_file_name must differ".to_string());
        }

        if self.copy_buffer_size == 0 {
            return Err("copy_buffer_size must be > 0".to_string());
        }

        if self.fetch_timeout_secs == Some(0) {
            return Err("fetch_timeout_secs must be > 0 when set".to_string());
        }

        Ok(())
    }
}
