//! Fixed-size chunk view of a log file, readable from either end.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

/// A complete line together with the byte offset where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedLine {
    pub offset: u64,
    pub text: String,
}

/// Reads a file as a sequence of `chunk_size` byte windows.
///
/// A line belongs to the chunk that contains its first byte, so walking
/// chunks `1..=total_chunks()` yields every complete line exactly once. The
/// file length is captured at open; bytes appended afterwards are ignored.
pub struct ChunkScanner {
    reader: BufReader<File>,
    len: u64,
    chunk_size: u64,
}

impl ChunkScanner {
    /// Open `path` for scanning. Returns `Ok(None)` if the file doesn't exist.
    pub fn open(path: &Path, chunk_size: u64) -> io::Result<Option<Self>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let len = file.metadata()?.len();
        Ok(Some(ChunkScanner {
            reader: BufReader::new(file),
            len,
            chunk_size: chunk_size.max(1),
        }))
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_chunks(&self) -> u64 {
        self.len.div_ceil(self.chunk_size)
    }

    /// Lines starting in chunk `index` (1-based, counted from the file end
    /// when `reverse`), trimmed, in scan order.
    ///
    /// Empty lines and a trailing line with no `\n` yet are skipped.
    pub fn chunk_at(&mut self, index: u64, reverse: bool) -> io::Result<Vec<ScannedLine>> {
        if index == 0 || index > self.total_chunks() {
            return Ok(Vec::new());
        }

        let (lo, hi) = if reverse {
            let hi = self.len - (index - 1) * self.chunk_size;
            (hi.saturating_sub(self.chunk_size), hi)
        } else {
            let lo = (index - 1) * self.chunk_size;
            (lo, (lo + self.chunk_size).min(self.len))
        };

        let mut pos = self.first_line_start(lo)?;
        let mut lines = Vec::new();
        let mut buf = Vec::new();

        while pos < hi {
            buf.clear();
            let n = self.reader.read_until(b'\n', &mut buf)? as u64;
            if n == 0 || buf.last() != Some(&b'\n') {
                break;
            }
            let text = String::from_utf8_lossy(&buf);
            let text = text.trim();
            if !text.is_empty() {
                lines.push(ScannedLine {
                    offset: pos,
                    text: text.to_string(),
                });
            }
            pos += n;
        }

        if reverse {
            lines.reverse();
        }
        Ok(lines)
    }

    /// Number of lines the chunks yield in total: complete, non-blank lines
    /// starting before the length captured at open.
    pub fn line_count(&mut self) -> io::Result<u64> {
        self.reader.seek(SeekFrom::Start(0))?;
        let mut pos = 0u64;
        let mut count = 0u64;
        let mut buf = Vec::new();
        while pos < self.len {
            buf.clear();
            let n = self.reader.read_until(b'\n', &mut buf)? as u64;
            if n == 0 || buf.last() != Some(&b'\n') {
                break;
            }
            if !buf.trim_ascii().is_empty() {
                count += 1;
            }
            pos += n;
        }
        Ok(count)
    }

    /// Position the reader at the first line starting at or after `lo` and
    /// return that offset.
    fn first_line_start(&mut self, lo: u64) -> io::Result<u64> {
        if lo == 0 {
            self.reader.seek(SeekFrom::Start(0))?;
            return Ok(0);
        }
        // Consume through the first '\n' at or after lo - 1; if the byte at
        // lo - 1 is itself '\n', lo is already a line start.
        self.reader.seek(SeekFrom::Start(lo - 1))?;
        let mut skipped = Vec::new();
        let n = self.reader.read_until(b'\n', &mut skipped)? as u64;
        Ok(lo - 1 + n)
    }
}
