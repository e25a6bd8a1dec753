use crate::chunk::ChunkScanner;
use crate::config::{LockMode, StoreConfig};
use crate::error::Result;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Where a store keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    /// Absolute path of the log file.
    pub log: PathBuf,
    /// Directory for auxiliary files such as search output.
    pub aux_dir: PathBuf,
}

impl LogPaths {
    /// Resolve the file for identifier `name` inside `dir`.
    ///
    /// Returns `None` for an empty name: no file is configured.
    pub fn resolve(dir: &Path, name: &str) -> Option<Self> {
        if name.is_empty() {
            return None;
        }
        let dir = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
        Some(LogPaths {
            log: dir.join(format!("{name}.log")),
            aux_dir: dir,
        })
    }

    /// Sibling used while pruning: `<name>.log.new`.
    pub fn prune_temp(&self) -> PathBuf {
        let mut name = self.log.as_os_str().to_os_string();
        name.push(".new");
        PathBuf::from(name)
    }
}

/// A single-file text log shared with other processes.
///
/// Holds no file handles and caches none of the file's contents: every
/// operation reopens the file and coordinates with other writers through
/// advisory locks. The only state kept between calls is the set of entries
/// this instance has saved with `allow_dups` off, which lives and dies with
/// the instance.
///
/// # Examples
///
/// ```
/// use flatlog::{FindOptions, LogStore, SaveOptions};
///
/// let dir = tempfile::tempdir().unwrap();
/// let mut store = LogStore::open(dir.path()).unwrap();
///
/// assert!(store.save("service started", &SaveOptions::default()).unwrap());
/// assert!(store.save("disk almost full", &SaveOptions::default()).unwrap());
///
/// let page = store.find(10, 1, &FindOptions::default()).unwrap().into_page().unwrap();
/// assert_eq!(page.total, 2);
/// assert!(page.hits[0].line.ends_with("| disk almost full"));
/// ```
#[derive(Debug)]
pub struct LogStore {
    pub(crate) config: StoreConfig,
    pub(crate) paths: Option<LogPaths>,
    pub(crate) saved: HashSet<u64>,
}

impl LogStore {
    /// Open a store with the default config in `dir`, creating `dir` if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        LogStore::builder(dir).open()
    }

    pub fn builder(dir: impl AsRef<Path>) -> LogStoreBuilder {
        LogStoreBuilder {
            dir: dir.as_ref().to_path_buf(),
            config: StoreConfig::default(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Path of the log file, or `None` if no file is configured.
    pub fn path(&self) -> Option<&Path> {
        self.paths.as_ref().map(|p| p.log.as_path())
    }

    /// Directory holding the log and any search output.
    pub fn dir(&self) -> Option<&Path> {
        self.paths.as_ref().map(|p| p.aux_dir.as_path())
    }

    /// Current size of the log in bytes; 0 when it doesn't exist yet.
    pub fn size(&self) -> io::Result<u64> {
        let Some(path) = self.path() else {
            return Ok(0);
        };
        match fs::metadata(path) {
            Ok(m) => Ok(m.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Number of lines in the log, counted the way a search sees them:
    /// blank lines and a trailing partial line are left out.
    pub fn line_count(&self) -> io::Result<u64> {
        let scanner = match self.path() {
            Some(path) => ChunkScanner::open(path, self.config.chunk_size)?,
            None => None,
        };
        match scanner {
            Some(mut scanner) => scanner.line_count(),
            None => Ok(0),
        }
    }

    pub(crate) fn lock_mode(&self) -> LockMode {
        self.config.lock_mode
    }
}

/// Builder for [`LogStore`].
///
/// ```
/// use flatlog::{LockMode, LogStore};
///
/// let dir = tempfile::tempdir().unwrap();
/// let store = LogStore::builder(dir.path())
///     .name("audit")
///     .delimiter(" :: ")
///     .lock_mode(LockMode::None)
///     .open()
///     .unwrap();
/// assert!(store.path().unwrap().ends_with("audit.log"));
/// ```
#[derive(Debug, Clone)]
pub struct LogStoreBuilder {
    dir: PathBuf,
    config: StoreConfig,
}

impl LogStoreBuilder {
    /// Replace the whole config, e.g. one loaded with
    /// [`StoreConfig::from_json_file`].
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.config.delimiter = delimiter.into();
        self
    }

    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.config.chunk_size = bytes;
        self
    }

    pub fn lock_mode(mut self, mode: LockMode) -> Self {
        self.config.lock_mode = mode;
        self
    }

    pub fn max_tries(mut self, tries: u32) -> Self {
        self.config.max_tries = tries;
        self
    }

    pub fn max_tries_delay_us(mut self, micros: u64) -> Self {
        self.config.max_tries_delay_us = micros;
        self
    }

    pub fn file_mode(mut self, mode: u32) -> Self {
        self.config.file_mode = mode;
        self
    }

    /// Validate the config and create the directory. The log file itself is
    /// only created by the first save.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) for an invalid config,
    /// or an I/O error if the directory can't be created.
    pub fn open(self) -> Result<LogStore> {
        self.config.validate()?;
        let paths = LogPaths::resolve(&self.dir, &self.config.name);
        if paths.is_some() {
            fs::create_dir_all(&self.dir)?;
        }
        Ok(LogStore {
            config: self.config,
            paths,
            saved: HashSet::new(),
        })
    }
}
