//! A single-file, append-mostly text log that several processes can share.
//!
//! Each entry is one line, `YYYY-MM-DD HH:MM:SS<delimiter><text>\n`. Writers
//! coordinate through advisory locks, can collapse recent duplicates, and
//! never leave a partial line behind. Readers page through the file from
//! either end without loading it whole, and the file can be cut down to a
//! byte budget from the tail.

mod chunk;
mod config;
mod entry;
mod error;
mod filter;
pub mod fs_tools;
pub mod lock;
mod merge;
mod prune;
mod reader;
mod store;
mod writer;

pub use chunk::{ChunkScanner, ScannedLine};
pub use config::{LockMode, StoreConfig};
pub use entry::{LogEntry, TIMESTAMP_FORMAT, parse_timestamp, sanitize};
pub use error::{Error, Result};
pub use filter::{LineFilter, Verdict, parse_date};
pub use merge::remove_entry_from_window;
pub use reader::{FindOptions, Hit, Page, SearchResult};
pub use store::{LogPaths, LogStore, LogStoreBuilder};
pub use writer::{MIN_MERGE_WINDOW, SaveOptions};
