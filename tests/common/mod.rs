#![allow(dead_code)]

use flatlog::{LogEntry, LogStore, SaveOptions};
use std::fs;
use std::path::Path;

pub const DELIM: &str = " | ";

pub fn save_n(store: &mut LogStore, n: usize) {
    for i in 0..n {
        assert!(store.save(&format!("entry {i}"), &SaveOptions::default()).unwrap());
    }
}

/// Lines of the file, without their newlines.
pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Text part of every line in the file.
pub fn read_texts(path: &Path) -> Vec<String> {
    read_lines(path)
        .iter()
        .map(|line| LogEntry::parse(line, DELIM).expect("well-formed line").text)
        .collect()
}

/// Write `(timestamp, text)` pairs as raw log lines.
pub fn write_entries(path: &Path, entries: &[(&str, &str)]) {
    let mut contents = String::new();
    for (ts, text) in entries {
        contents.push_str(&format!("{ts}{DELIM}{text}\n"));
    }
    fs::write(path, contents).unwrap();
}
