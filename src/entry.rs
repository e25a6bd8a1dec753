use chrono::{Local, NaiveDateTime};

/// `strftime` format of the timestamp that starts every line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Byte length of a formatted timestamp.
pub const TIMESTAMP_LEN: usize = 19;

/// xxh64 of `bytes`. The seed tells apart equal bytes that must not collide,
/// such as identical lines at different offsets.
pub(crate) fn fingerprint(bytes: &[u8], seed: u64) -> u64 {
    xxhash_rust::xxh64::xxh64(bytes, seed)
}

/// Make caller text safe to store on a single line.
///
/// Line breaks become a literal `\n`, surrounding whitespace is trimmed and
/// every occurrence of `delimiter` is removed, so the stored text never
/// contains a newline or the delimiter.
///
/// # Examples
///
/// ```
/// use flatlog::sanitize;
///
/// assert_eq!(sanitize("first\nsecond", " | "), "first\\nsecond");
/// assert_eq!(sanitize("a | b", " | "), "ab");
/// ```
pub fn sanitize(text: &str, delimiter: &str) -> String {
    let mut out = text
        .trim()
        .replace("\r\n", "\\n")
        .replace(['\n', '\r'], "\\n");
    // Removing one occurrence can splice together a new one.
    while !delimiter.is_empty() && out.contains(delimiter) {
        out = out.replace(delimiter, "");
    }
    out.trim().to_string()
}

/// The part of a line that identifies an entry: delimiter plus sanitized text.
pub(crate) fn entry_content(text: &str, delimiter: &str) -> String {
    format!("{delimiter}{}", sanitize(text, delimiter))
}

/// A complete, newline-terminated line stamped with the current local time.
pub(crate) fn stamp(content: &str) -> String {
    format!("{}{content}\n", Local::now().format(TIMESTAMP_FORMAT))
}

/// Parse the timestamp at the start of a stored line.
pub fn parse_timestamp(line: &str) -> Option<NaiveDateTime> {
    let ts = line.get(..TIMESTAMP_LEN)?;
    NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).ok()
}

/// One stored line, split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: NaiveDateTime,
    pub text: String,
}

impl LogEntry {
    /// Split a stored line into timestamp and text.
    ///
    /// Returns `None` when the line doesn't start with a timestamp followed
    /// by `delimiter`.
    ///
    /// # Examples
    ///
    /// ```
    /// use flatlog::LogEntry;
    ///
    /// let entry = LogEntry::parse("2024-05-01 12:30:00 | disk full", " | ").unwrap();
    /// assert_eq!(entry.text, "disk full");
    /// assert_eq!(entry.timestamp.to_string(), "2024-05-01 12:30:00");
    /// assert!(LogEntry::parse("garbage", " | ").is_none());
    /// ```
    pub fn parse(line: &str, delimiter: &str) -> Option<Self> {
        let timestamp = parse_timestamp(line)?;
        let text = line[TIMESTAMP_LEN..].strip_prefix(delimiter)?;
        Some(LogEntry {
            timestamp,
            text: text.to_string(),
        })
    }
}
