use crate::error::Result;
use crate::fs_tools;
use crate::lock::{self, Retry};
use crate::store::LogStore;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

impl LogStore {
    /// Shrink the log to at most its last `bytes` bytes, keeping whole lines.
    ///
    /// The kept content is the suffix of the file starting at the first line
    /// boundary at or after `size - bytes`. It is copied to `<name>.log.new`
    /// and renamed over the log. Returns the number of lines kept:
    ///
    /// - `Ok(Some(0))` if the file is missing or already fits, and also when
    ///   not even one line fits, in which case the log is left untouched;
    /// - `Ok(None)` if no file is configured, the log or temporary file
    ///   couldn't be opened or stayed locked, or another prune replaced the
    ///   log while this one waited for its lock.
    ///
    /// Both files are locked until the rename. Writers waiting on the old
    /// file notice the swap once they get the lock and reopen the new one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lock`](crate::Error::Lock) for a non-contention lock
    /// failure and I/O errors from the copy or the swap.
    pub fn prune_bytes(&self, bytes: u64) -> Result<Option<u64>> {
        let Some(paths) = self.paths.as_ref() else {
            return Ok(None);
        };
        let size = self.size()?;
        if size <= bytes {
            return Ok(Some(0));
        }

        let retry = Retry {
            max_tries: self.config.max_tries,
            delay: self.config.max_tries_delay(),
        };
        let temp_path = paths.prune_temp();

        let Some(source) = open_or_warn(&paths.log, OpenOptions::new().read(true)) else {
            return Ok(None);
        };
        let Some(source) = lock::acquire(source, &paths.log, self.lock_mode(), retry)? else {
            return Ok(None);
        };
        if !fs_tools::is_current(&source, &paths.log) {
            log::debug!("{} was replaced while waiting for the lock", paths.log.display());
            lock::release(source, self.lock_mode());
            return Ok(None);
        }
        let Some(temp) = open_or_warn(
            &temp_path,
            OpenOptions::new().create(true).write(true).truncate(false),
        ) else {
            lock::release(source, self.lock_mode());
            return Ok(None);
        };
        let temp = match lock::acquire(temp, &temp_path, self.lock_mode(), retry) {
            Ok(Some(temp)) => temp,
            Ok(None) => {
                lock::release(source, self.lock_mode());
                return Ok(None);
            }
            Err(e) => {
                lock::release(source, self.lock_mode());
                return Err(e);
            }
        };

        let copied = copy_tail(&source, &temp, bytes);
        lock::release(temp, self.lock_mode());

        let kept = match copied {
            Ok(kept) => kept,
            Err(e) => {
                lock::release(source, self.lock_mode());
                fs_tools::remove_if_exists(&temp_path)?;
                return Err(e.into());
            }
        };

        if kept == 0 {
            lock::release(source, self.lock_mode());
            fs_tools::remove_if_exists(&temp_path)?;
            log::debug!("no whole line fits in {bytes} bytes, leaving {} alone", paths.log.display());
            return Ok(Some(0));
        }

        let swapped = fs_tools::atomic_replace(&paths.log, &temp_path);
        lock::release(source, self.lock_mode());
        swapped?;

        if let Err(e) = fs_tools::normalize_permissions(&paths.log, self.config.file_mode) {
            log::warn!("failed to set permissions on {}: {e}", paths.log.display());
        }
        log::debug!("pruned {} to {kept} lines", paths.log.display());
        Ok(Some(kept))
    }
}

fn open_or_warn(path: &Path, options: &OpenOptions) -> Option<File> {
    match options.open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            log::warn!("failed to open {}: {e}", path.display());
            None
        }
    }
}

/// Copy the whole lines of `source` that start at or after `len - bytes`
/// into `temp`, replacing its contents. Returns the number copied.
fn copy_tail(source: &File, temp: &File, bytes: u64) -> io::Result<u64> {
    let len = source.metadata()?.len();
    let from = len.saturating_sub(bytes);

    let mut reader = BufReader::new(source);
    let mut line = Vec::new();
    if from > 0 {
        // Discard through the first '\n' at or after from - 1: a line that
        // starts exactly at `from` survives, a partial one doesn't.
        reader.seek(SeekFrom::Start(from - 1))?;
        reader.read_until(b'\n', &mut line)?;
    }

    temp.set_len(0)?;
    let mut out = BufWriter::new(temp);
    let mut kept = 0u64;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 || line.last() != Some(&b'\n') {
            break;
        }
        out.write_all(&line)?;
        kept += 1;
    }
    out.flush()?;
    drop(out);
    temp.sync_data()?;
    Ok(kept)
}
