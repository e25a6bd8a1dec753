use crate::entry::{entry_content, fingerprint, stamp};
use crate::error::Result;
use crate::fs_tools;
use crate::lock::{self, Retry};
use crate::merge;
use crate::store::LogStore;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Smallest trailing window, in bytes, that turns on duplicate merging.
pub const MIN_MERGE_WINDOW: u64 = 1024;

/// Per-call options for [`LogStore::save`].
///
/// # Examples
///
/// ```
/// use flatlog::SaveOptions;
///
/// let options = SaveOptions::default().no_dups().with_merge_window(4096);
/// assert!(!options.allow_dups);
/// assert_eq!(options.merge_dups, 4096);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct SaveOptions {
    /// When false, text this store instance already saved is skipped.
    pub allow_dups: bool,

    /// Trailing window, in bytes, cleared of earlier copies of the entry
    /// before it is appended. Below [`MIN_MERGE_WINDOW`] merging is off.
    pub merge_dups: u64,

    /// Overrides the store's `max_tries`.
    pub max_tries: Option<u32>,

    /// Overrides the store's `max_tries_delay_us`.
    pub max_tries_delay: Option<Duration>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        SaveOptions {
            allow_dups: true,
            merge_dups: 0,
            max_tries: None,
            max_tries_delay: None,
        }
    }
}

impl SaveOptions {
    pub fn no_dups(mut self) -> Self {
        self.allow_dups = false;
        self
    }

    pub fn with_merge_window(mut self, bytes: u64) -> Self {
        self.merge_dups = bytes;
        self
    }

    pub fn with_max_tries(mut self, tries: u32) -> Self {
        self.max_tries = Some(tries);
        self
    }

    pub fn with_max_tries_delay(mut self, delay: Duration) -> Self {
        self.max_tries_delay = Some(delay);
        self
    }

    fn merge_window(&self) -> Option<u64> {
        (self.merge_dups >= MIN_MERGE_WINDOW).then_some(self.merge_dups)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenMode {
    Create,
    Append,
    ReadWrite,
    /// Write-only append, for files that can't be opened for reading.
    AppendOnly,
}

impl OpenMode {
    fn open(self, path: &Path) -> io::Result<File> {
        let mut options = OpenOptions::new();
        match self {
            OpenMode::Create | OpenMode::Append => options.read(true).create(true).append(true),
            OpenMode::ReadWrite => options.read(true).write(true),
            OpenMode::AppendOnly => options.create(true).append(true),
        };
        options.open(path)
    }
}

impl LogStore {
    /// Append `text` as a new timestamped line.
    ///
    /// Returns `Ok(true)` once the line is on disk, or when `allow_dups` is
    /// off and this instance already saved the same text. `Ok(false)` means
    /// nothing was written: no file is configured, the file couldn't be
    /// opened, the lock stayed contended for the whole retry budget, or the
    /// write itself failed. Callers should check it and retry later.
    ///
    /// With a merge window, earlier copies of the same text inside the last
    /// `merge_dups` bytes are removed before the new line is appended; the
    /// read, truncate, rewrite and append all happen under one lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lock`](crate::Error::Lock) if the lock call fails for
    /// a reason other than contention.
    pub fn save(&mut self, text: &str, options: &SaveOptions) -> Result<bool> {
        let Some(path) = self.path().map(Path::to_path_buf) else {
            log::warn!("no log file configured, dropping entry");
            return Ok(false);
        };

        let text_hash = fingerprint(text.as_bytes(), 0);
        if !options.allow_dups && self.saved.contains(&text_hash) {
            return Ok(true);
        }

        let content = entry_content(text, &self.config.delimiter);
        let retry = Retry {
            max_tries: options.max_tries.unwrap_or(self.config.max_tries),
            delay: options
                .max_tries_delay
                .unwrap_or_else(|| self.config.max_tries_delay()),
        };
        let merge_window = options.merge_window();

        let created = !path.exists();
        let mode = if created {
            OpenMode::Create
        } else if merge_window.is_none() {
            OpenMode::Append
        } else {
            OpenMode::ReadWrite
        };

        let Some((mut file, mode)) = self.open_locked(&path, mode, retry)? else {
            return Ok(false);
        };

        let merge_window = merge_window.filter(|_| mode == OpenMode::ReadWrite);
        let written = match write_entry(&mut file, mode, merge_window, &content) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("failed to write to {}: {e}", path.display());
                false
            }
        };
        lock::release(file, self.lock_mode());

        if written && !options.allow_dups {
            self.saved.insert(text_hash);
        }
        if created {
            if let Err(e) = fs_tools::normalize_permissions(&path, self.config.file_mode) {
                log::warn!("failed to set permissions on {}: {e}", path.display());
            }
        }
        Ok(written)
    }

    /// Open and lock `path`, making sure the locked handle is still the file
    /// at `path`. A prune that renamed a new file into place while we waited
    /// for the lock leaves us holding the old one; drop it and start over.
    fn open_locked(
        &self,
        path: &Path,
        mode: OpenMode,
        retry: Retry,
    ) -> Result<Option<(File, OpenMode)>> {
        for _ in 0..retry.max_tries.max(1) {
            let Some((file, opened_mode)) = open_with_retry(path, mode, retry) else {
                return Ok(None);
            };
            let Some(file) = lock::acquire(file, path, self.lock_mode(), retry)? else {
                return Ok(None);
            };
            if fs_tools::is_current(&file, path) {
                return Ok(Some((file, opened_mode)));
            }
            log::debug!("{} was replaced while waiting for the lock, reopening", path.display());
            lock::release(file, self.lock_mode());
        }
        log::warn!("{} kept being replaced, giving up", path.display());
        Ok(None)
    }
}

/// Open `path`, retrying with a fixed delay. A read+write open that keeps
/// failing past half the budget falls back to append-only.
fn open_with_retry(path: &Path, mut mode: OpenMode, retry: Retry) -> Option<(File, OpenMode)> {
    let tries = retry.max_tries.max(1);
    for attempt in 0..tries {
        if mode == OpenMode::ReadWrite && attempt > 0 && attempt >= tries.div_ceil(2) {
            log::debug!("falling back to append-only for {}", path.display());
            mode = OpenMode::AppendOnly;
        }
        match mode.open(path) {
            Ok(file) => return Some((file, mode)),
            Err(e) => {
                log::debug!("open {} attempt {} failed: {e}", path.display(), attempt + 1);
                if attempt + 1 < tries {
                    thread::sleep(retry.delay);
                }
            }
        }
    }
    log::warn!("could not open {} after {tries} attempts", path.display());
    None
}

/// The critical section: optional tail merge, then the append. Runs with the
/// lock held.
///
/// A file left ending in a partial line (a writer that died mid-write) gets
/// its `\n` first so the new entry starts on a line of its own. Write-only
/// handles can't look, and append as is.
fn write_entry(
    file: &mut File,
    mode: OpenMode,
    merge_window: Option<u64>,
    content: &str,
) -> io::Result<()> {
    if let Some(window) = merge_window {
        merge_tail(file, window, content)?;
    }
    let mut line = stamp(content);
    let len = file.seek(SeekFrom::End(0))?;
    if mode != OpenMode::AppendOnly && len > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::Start(len - 1))?;
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            line.insert(0, '\n');
        }
        file.seek(SeekFrom::End(0))?;
    }
    file.write_all(line.as_bytes())?;
    file.flush()
}

fn merge_tail(file: &mut File, window: u64, content: &str) -> io::Result<()> {
    let len = file.metadata()?.len();
    let start = len.saturating_sub(window.max(MIN_MERGE_WINDOW));

    // Read one byte early to learn whether `start` is a line boundary.
    let read_from = start.saturating_sub(1);
    file.seek(SeekFrom::Start(read_from))?;
    let mut buf = Vec::with_capacity((len - read_from) as usize);
    Read::by_ref(file).take(len - read_from).read_to_end(&mut buf)?;

    let (at_line_start, tail) = if start == 0 {
        (true, &buf[..])
    } else {
        match buf.split_first() {
            Some((&prev, rest)) => (prev == b'\n', rest),
            None => return Ok(()),
        }
    };

    if !contains(tail, content.as_bytes()) {
        return Ok(());
    }
    let Some(merged) = merge::remove_entry_from_window(tail, content, at_line_start) else {
        return Ok(());
    };

    file.set_len(start)?;
    file.seek(SeekFrom::Start(start))?;
    file.write_all(&merged)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}
