use std::io;
use std::path::PathBuf;

/// Conditions that are structurally wrong and should not be retried blindly.
///
/// Ordinary contention (another process holding the lock) and a missing
/// file path are not errors: those surface as `Ok(false)` / `Ok(None)` from
/// the operation that hit them.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The lock call failed for a reason other than contention. The handle
    /// has been closed by the time the caller sees this.
    #[error("failed to lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The destination of a streamed search could not be opened or locked.
    #[error("failed to set up search output {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unrecognised date: {0:?}")]
    InvalidDate(String),

    #[error("expected a bare file name, got {0:?}")]
    InvalidFileName(String),
}

pub type Result<T> = std::result::Result<T, Error>;
