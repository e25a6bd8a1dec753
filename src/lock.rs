//! Advisory exclusive locking with bounded retry.

use crate::config::LockMode;
use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::File;
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Retry policy for opening and locking a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retry {
    pub max_tries: u32,
    pub delay: Duration,
}

/// Take an exclusive lock on `file`, retrying while another holder has it.
///
/// Makes up to `retry.max_tries + 1` non-blocking attempts with a fixed
/// `retry.delay` between them. On success the locked handle is handed back;
/// contention that outlasts the budget is `Ok(None)` with the handle closed.
/// Any other lock failure means the handle is unusable: it is closed and
/// [`Error::Lock`] is returned.
///
/// With [`LockMode::None`] no lock is attempted and the handle comes straight
/// back.
pub fn acquire(file: File, path: &Path, mode: LockMode, retry: Retry) -> Result<Option<File>> {
    if mode == LockMode::None {
        log::debug!("locking disabled, skipping lock on {}", path.display());
        return Ok(Some(file));
    }

    for attempt in 0..=retry.max_tries {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(Some(file)),
            Err(e) if is_contended(&e) => {
                if attempt < retry.max_tries {
                    thread::sleep(retry.delay);
                }
            }
            Err(source) => {
                drop(file);
                return Err(Error::Lock {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }

    log::warn!(
        "{} still locked after {} attempts",
        path.display(),
        retry.max_tries.saturating_add(1)
    );
    Ok(None)
}

/// Release a lock taken by [`acquire`] and close the handle.
pub fn release(file: File, mode: LockMode) {
    if mode == LockMode::Flock {
        if let Err(e) = FileExt::unlock(&file) {
            log::debug!("unlock failed, closing the handle anyway: {e}");
        }
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
