//! Store configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Smallest accepted `chunk_size`.
pub const MIN_CHUNK_SIZE: u64 = 1;

/// How a store coordinates with other writers of the same file.
///
/// # Examples
///
/// ```
/// use flatlog::LockMode;
///
/// assert_eq!(LockMode::default(), LockMode::Flock);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    /// Advisory exclusive lock via `flock(2)` (or `LockFileEx` on Windows).
    #[default]
    Flock,
    /// Skip locking entirely. Only safe when a single process ever touches
    /// the file; concurrent writers may interleave or lose merges.
    None,
}

/// Settings shared by every operation of a [`LogStore`](crate::LogStore).
///
/// Every field has a default, so a JSON config only needs the keys it
/// changes:
///
/// ```
/// use flatlog::{LockMode, StoreConfig};
///
/// let config: StoreConfig = serde_json::from_str(r#"{"name": "audit", "lock_mode": "none"}"#).unwrap();
/// assert_eq!(config.name, "audit");
/// assert_eq!(config.lock_mode, LockMode::None);
/// assert_eq!(config.delimiter, " | ");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct StoreConfig {
    /// Log identifier; the file is `<dir>/<name>.log`. Empty means no file
    /// is configured and every write is refused.
    pub name: String,

    /// Separator between timestamp and text on every stored line.
    pub delimiter: String,

    /// Byte size of the windows the reader scans at a time.
    pub chunk_size: u64,

    pub lock_mode: LockMode,

    /// Default attempt ceiling for file opens and lock acquisition.
    pub max_tries: u32,

    /// Default pause between attempts, in microseconds.
    pub max_tries_delay_us: u64,

    /// Permission bits applied to files this store creates (Unix only).
    pub file_mode: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            name: "app".to_string(),
            delimiter: " | ".to_string(),
            chunk_size: 64 * 1024,
            lock_mode: LockMode::Flock,
            max_tries: 20,
            max_tries_delay_us: 2000,
            file_mode: 0o644,
        }
    }
}

impl StoreConfig {
    /// Load a config from a JSON file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file can't be read and [`Error::Config`]
    /// if it isn't valid JSON for this struct or fails [`validate`](Self::validate).
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: StoreConfig = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the store relies on.
    ///
    /// The delimiter has to be non-empty and single-line, otherwise stored
    /// lines can't be split back into timestamp and text.
    pub fn validate(&self) -> Result<()> {
        if self.delimiter.is_empty() {
            return Err(Error::Config("delimiter must not be empty".to_string()));
        }
        if self.delimiter.contains(['\n', '\r']) {
            return Err(Error::Config(
                "delimiter must not contain line breaks".to_string(),
            ));
        }
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(Error::Config(format!(
                "chunk_size must be at least {MIN_CHUNK_SIZE}"
            )));
        }
        if self.name.contains(['/', '\\']) {
            return Err(Error::Config(format!(
                "name must not contain path separators: {:?}",
                self.name
            )));
        }
        Ok(())
    }

    pub fn max_tries_delay(&self) -> Duration {
        Duration::from_micros(self.max_tries_delay_us)
    }
}
