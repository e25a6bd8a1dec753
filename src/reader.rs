use crate::chunk::ChunkScanner;
use crate::entry::fingerprint;
use crate::error::{Error, Result};
use crate::filter::{LineFilter, Verdict, parse_date};
use crate::fs_tools;
use crate::lock::{self, Retry};
use crate::store::LogStore;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Per-call options for [`LogStore::find`].
///
/// # Examples
///
/// ```
/// use flatlog::FindOptions;
///
/// let options = FindOptions::default()
///     .with_text("timeout")
///     .date_from_str("2024-05-01")
///     .unwrap()
///     .forward();
/// assert!(!options.reverse);
/// assert_eq!(options.date_from.unwrap().to_string(), "2024-05-01 00:00:00");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct FindOptions {
    /// Keep only lines containing this substring.
    pub text: Option<String>,
    /// Inclusive lower bound; defaults to the start of the log when only
    /// `date_to` is set.
    pub date_from: Option<NaiveDateTime>,
    /// Inclusive upper bound; defaults to now when only `date_from` is set.
    pub date_to: Option<NaiveDateTime>,
    /// Scan newest first. On by default.
    pub reverse: bool,
    /// Stream matches into this file (a bare name inside the log's
    /// directory) instead of returning them.
    pub to_file: Option<String>,
}

impl Default for FindOptions {
    fn default() -> Self {
        FindOptions {
            text: None,
            date_from: None,
            date_to: None,
            reverse: true,
            to_file: None,
        }
    }
}

impl FindOptions {
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn date_from(mut self, from: NaiveDateTime) -> Self {
        self.date_from = Some(from);
        self
    }

    pub fn date_to(mut self, to: NaiveDateTime) -> Self {
        self.date_to = Some(to);
        self
    }

    /// Set the lower bound from text; see [`parse_date`].
    pub fn date_from_str(self, from: &str) -> Result<Self> {
        Ok(self.date_from(parse_date(from, false)?))
    }

    /// Set the upper bound from text; a bare date means the end of that day.
    pub fn date_to_str(self, to: &str) -> Result<Self> {
        Ok(self.date_to(parse_date(to, true)?))
    }

    /// Scan oldest first.
    pub fn forward(mut self) -> Self {
        self.reverse = false;
        self
    }

    pub fn to_file(mut self, name: impl Into<String>) -> Self {
        self.to_file = Some(name.into());
        self
    }
}

/// A matching line and its 1-based position among all matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub ordinal: u64,
    pub line: String,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub hits: Vec<Hit>,
    /// Matching lines in the whole log (all lines when unfiltered).
    pub total: u64,
    /// Matches before this page.
    pub start: u64,
    /// Ordinal of the last match this page can hold, clamped to `total`.
    pub end: u64,
    /// Page size; 0 means unlimited.
    pub limit: u64,
}

impl Page {
    /// Hits keyed as `"{ordinal}/{total}/{start}/{end}/{limit}"`, in scan order.
    ///
    /// ```
    /// use flatlog::{Hit, Page};
    ///
    /// let page = Page {
    ///     hits: vec![Hit { ordinal: 3, line: "x".to_string() }],
    ///     total: 7,
    ///     start: 2,
    ///     end: 4,
    ///     limit: 2,
    /// };
    /// assert_eq!(page.keyed(), vec![("3/7/2/4/2".to_string(), "x".to_string())]);
    /// ```
    pub fn keyed(&self) -> Vec<(String, String)> {
        self.hits
            .iter()
            .map(|hit| {
                (
                    format!(
                        "{}/{}/{}/{}/{}",
                        hit.ordinal, self.total, self.start, self.end, self.limit
                    ),
                    hit.line.clone(),
                )
            })
            .collect()
    }
}

/// What [`LogStore::find`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResult {
    Page(Page),
    /// Number of lines written to the `to_file` destination.
    Streamed(u64),
}

impl SearchResult {
    pub fn into_page(self) -> Option<Page> {
        match self {
            SearchResult::Page(page) => Some(page),
            SearchResult::Streamed(_) => None,
        }
    }

    pub fn streamed(&self) -> Option<u64> {
        match self {
            SearchResult::Streamed(n) => Some(*n),
            SearchResult::Page(_) => None,
        }
    }
}

enum Sink {
    Memory(Vec<Hit>),
    File {
        path: PathBuf,
        out: BufWriter<File>,
        written: u64,
    },
}

impl Sink {
    fn push(&mut self, ordinal: u64, line: String) -> io::Result<()> {
        match self {
            Sink::Memory(hits) => hits.push(Hit { ordinal, line }),
            Sink::File { out, written, .. } => {
                out.write_all(line.as_bytes())?;
                out.write_all(b"\n")?;
                *written += 1;
            }
        }
        Ok(())
    }
}

impl LogStore {
    /// Read one page of matching lines.
    ///
    /// Matches are numbered from 1 in scan order (newest first unless
    /// `options.reverse` is off) and page `page_num` holds matches
    /// `(page_num - 1) * limit + 1 ..= page_num * limit`. A `limit` of 0
    /// returns every match. The file is read chunk by chunk, so memory use is
    /// bounded by the chunk size plus the page.
    ///
    /// Without filters the scan stops as soon as the page is full and
    /// `total` is the file's line count. With a text or date filter the whole
    /// file is scanned (unless the date range rules out the rest) so `total`
    /// is the exact number of matches.
    ///
    /// # Errors
    ///
    /// Unlike [`save`](LogStore::save), a `to_file` destination that can't be
    /// opened or locked is an error ([`Error::Output`] or [`Error::Lock`]),
    /// as are I/O errors while reading the log.
    pub fn find(&self, limit: u64, page_num: u64, options: &FindOptions) -> Result<SearchResult> {
        let filter = LineFilter::new(options.text.clone(), options.date_from, options.date_to);
        let has_filters = filter.is_active();

        let mut sink = match &options.to_file {
            Some(name) => self.open_output(name)?,
            None => Sink::Memory(Vec::new()),
        };

        let start = page_num.saturating_sub(1).saturating_mul(limit);
        let end = (limit > 0).then(|| start.saturating_add(limit));

        let mut n = 0u64;
        let mut kept = 0u64;
        let mut unfiltered_total = 0u64;
        let scanner = match self.path() {
            Some(path) => ChunkScanner::open(path, self.config.chunk_size)?,
            None => None,
        };
        if let Some(mut scanner) = scanner {
            if !has_filters {
                unfiltered_total = scanner.line_count()?;
            }
            let mut seen = HashSet::new();
            'scan: for index in 1..=scanner.total_chunks() {
                if !has_filters && limit > 0 && kept >= limit {
                    break;
                }
                for line in scanner.chunk_at(index, options.reverse)? {
                    if !seen.insert(fingerprint(line.text.as_bytes(), line.offset)) {
                        continue;
                    }
                    match filter.check(&line.text, options.reverse) {
                        Verdict::Match => {}
                        Verdict::Skip => continue,
                        Verdict::Stop => break 'scan,
                    }
                    n += 1;
                    if n > start && end.is_none_or(|end| n <= end) {
                        sink.push(n, line.text)?;
                        kept += 1;
                    }
                }
            }
        }

        let mut total = if has_filters { n } else { unfiltered_total };
        let end = end.map_or(total, |end| end.min(total));
        if limit > 0 && kept < limit && total > end {
            total = end;
        }

        match sink {
            Sink::Memory(hits) => Ok(SearchResult::Page(Page {
                hits,
                total,
                start,
                end,
                limit,
            })),
            Sink::File { path, out, written } => {
                let file = out.into_inner().map_err(|e| e.into_error())?;
                file.sync_data()?;
                lock::release(file, self.lock_mode());
                if let Err(e) = fs_tools::normalize_permissions(&path, self.config.file_mode) {
                    log::warn!("failed to set permissions on {}: {e}", path.display());
                }
                log::debug!("streamed {written} lines to {}", path.display());
                Ok(SearchResult::Streamed(written))
            }
        }
    }

    fn open_output(&self, name: &str) -> Result<Sink> {
        if name.is_empty() || Path::new(name).file_name() != Some(OsStr::new(name)) {
            return Err(Error::InvalidFileName(name.to_string()));
        }
        let Some(dir) = self.dir() else {
            return Err(Error::Config("no log file configured".to_string()));
        };
        let path = dir.join(name);
        if self.path() == Some(path.as_path()) || self.paths.as_ref().is_some_and(|p| p.prune_temp() == path) {
            return Err(Error::InvalidFileName(name.to_string()));
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| Error::Output {
                path: path.clone(),
                source,
            })?;
        let retry = Retry {
            max_tries: self.config.max_tries,
            delay: self.config.max_tries_delay(),
        };
        let Some(file) = lock::acquire(file, &path, self.lock_mode(), retry)? else {
            return Err(Error::Output {
                path,
                source: io::Error::new(io::ErrorKind::WouldBlock, "destination is locked"),
            });
        };
        // Truncate only once the lock is ours.
        file.set_len(0).map_err(|source| Error::Output {
            path: path.clone(),
            source,
        })?;

        Ok(Sink::File {
            path,
            out: BufWriter::new(file),
            written: 0,
        })
    }
}
