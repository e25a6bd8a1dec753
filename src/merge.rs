//! Duplicate removal over the trailing window of the file.

use crate::entry::{TIMESTAMP_LEN, parse_timestamp};

/// Drop every whole line of `window` whose content after the timestamp is
/// exactly `content` (delimiter plus sanitized text).
///
/// `at_line_start` says whether `window` begins on a line boundary. When it
/// doesn't, the leading fragment belongs to a line that starts before the
/// window and is kept untouched. A trailing fragment with no `\n` is kept
/// too. Returns `None` if nothing matched.
pub fn remove_entry_from_window(window: &[u8], content: &str, at_line_start: bool) -> Option<Vec<u8>> {
    let head_len = if at_line_start {
        0
    } else {
        match window.iter().position(|&b| b == b'\n') {
            Some(i) => i + 1,
            None => return None,
        }
    };

    let mut out = Vec::with_capacity(window.len());
    out.extend_from_slice(&window[..head_len]);

    let mut removed = 0usize;
    for line in window[head_len..].split_inclusive(|&b| b == b'\n') {
        let complete = line.last() == Some(&b'\n');
        if complete && is_same_entry(line, content) {
            removed += 1;
            continue;
        }
        out.extend_from_slice(line);
    }

    if removed == 0 {
        return None;
    }
    log::debug!("merged {removed} earlier copies of {content:?}");
    Some(out)
}

fn is_same_entry(line: &[u8], content: &str) -> bool {
    let body = line.strip_suffix(b"\n").unwrap_or(line);
    let body = body.strip_suffix(b"\r").unwrap_or(body);
    match std::str::from_utf8(body) {
        Ok(text) => parse_timestamp(text).is_some() && &text[TIMESTAMP_LEN..] == content,
        Err(_) => false,
    }
}
