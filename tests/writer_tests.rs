mod common;

use common::{read_lines, read_texts, save_n};
use flatlog::{FindOptions, LogEntry, LogStore, SaveOptions, parse_timestamp};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_sequential_saves_keep_order() {
    let dir = tempdir().unwrap();
    let mut store = LogStore::open(dir.path()).unwrap();

    save_n(&mut store, 10);

    let texts = read_texts(store.path().unwrap());
    assert_eq!(texts.len(), 10);
    for (i, text) in texts.iter().enumerate() {
        assert_eq!(text, &format!("entry {i}"));
    }
}

#[test]
fn test_lines_are_timestamped_and_terminated() {
    let dir = tempdir().unwrap();
    let mut store = LogStore::open(dir.path()).unwrap();

    store.save("hello", &SaveOptions::default()).unwrap();

    let raw = fs::read_to_string(store.path().unwrap()).unwrap();
    assert!(raw.ends_with('\n'));
    let line = raw.trim_end_matches('\n');
    assert!(parse_timestamp(line).is_some(), "bad timestamp in {line:?}");
    assert_eq!(&line[19..], " | hello");
}

#[test]
fn test_save_sanitizes_text() {
    let dir = tempdir().unwrap();
    let mut store = LogStore::open(dir.path()).unwrap();

    store
        .save("  line one\nline two | with pipe\r\n", &SaveOptions::default())
        .unwrap();

    let lines = read_lines(store.path().unwrap());
    assert_eq!(lines.len(), 1, "embedded newlines must not split the entry");
    let entry = LogEntry::parse(&lines[0], " | ").unwrap();
    assert_eq!(entry.text, "line one\\nline twowith pipe");
}

#[test]
fn test_save_creates_file_on_first_write() {
    let dir = tempdir().unwrap();
    let mut store = LogStore::open(dir.path()).unwrap();
    let path = store.path().unwrap().to_path_buf();

    assert!(!path.exists(), "open must not create the log file");
    assert!(store.save("first", &SaveOptions::default()).unwrap());
    assert!(path.exists());
    assert_eq!(store.line_count().unwrap(), 1);
}

#[cfg(unix)]
#[test]
fn test_new_file_permissions_normalized() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let mut store = LogStore::builder(dir.path()).file_mode(0o600).open().unwrap();
    store.save("secret", &SaveOptions::default()).unwrap();

    let mode = fs::metadata(store.path().unwrap()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_no_file_configured_writes_nothing() {
    let dir = tempdir().unwrap();
    let mut store = LogStore::builder(dir.path()).name("").open().unwrap();

    assert!(store.path().is_none());
    assert!(!store.save("lost", &SaveOptions::default()).unwrap());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_disallow_dups_writes_once() {
    let dir = tempdir().unwrap();
    let mut store = LogStore::open(dir.path()).unwrap();
    let options = SaveOptions::default().no_dups();

    assert!(store.save("only once", &options).unwrap());
    assert!(store.save("only once", &options).unwrap());
    assert!(store.save("something else", &options).unwrap());

    assert_eq!(
        read_texts(store.path().unwrap()),
        vec!["only once", "something else"]
    );
}

#[test]
fn test_dedup_set_belongs_to_instance() {
    let dir = tempdir().unwrap();
    let options = SaveOptions::default().no_dups();

    let mut first = LogStore::open(dir.path()).unwrap();
    first.save("repeat", &options).unwrap();

    // A fresh instance starts with an empty set.
    let mut second = LogStore::open(dir.path()).unwrap();
    second.save("repeat", &options).unwrap();

    assert_eq!(read_texts(first.path().unwrap()), vec!["repeat", "repeat"]);
}

#[test]
fn test_allow_dups_default_keeps_repeats() {
    let dir = tempdir().unwrap();
    let mut store = LogStore::open(dir.path()).unwrap();

    for _ in 0..3 {
        store.save("again", &SaveOptions::default()).unwrap();
    }
    assert_eq!(read_texts(store.path().unwrap()).len(), 3);
}

#[test]
fn test_merge_collapses_duplicate_within_window() {
    let dir = tempdir().unwrap();
    let mut store = LogStore::open(dir.path()).unwrap();
    let merge = SaveOptions::default().with_merge_window(1024);

    store.save("disk full", &merge).unwrap();
    store.save("cpu hot", &merge).unwrap();
    store.save("disk full, again", &merge).unwrap();
    store.save("disk full", &merge).unwrap();

    assert_eq!(
        read_texts(store.path().unwrap()),
        vec!["cpu hot", "disk full, again", "disk full"]
    );
}

#[test]
fn test_merge_removes_every_copy_in_window() {
    let dir = tempdir().unwrap();
    let mut store = LogStore::open(dir.path()).unwrap();

    for _ in 0..4 {
        store.save("flapping", &SaveOptions::default()).unwrap();
        store.save("other", &SaveOptions::default()).unwrap();
    }
    store
        .save("flapping", &SaveOptions::default().with_merge_window(2048))
        .unwrap();

    let texts = read_texts(store.path().unwrap());
    assert_eq!(texts.iter().filter(|t| *t == "flapping").count(), 1);
    assert_eq!(texts.last().unwrap(), "flapping");
    assert_eq!(texts.iter().filter(|t| *t == "other").count(), 4);
}

#[test]
fn test_merge_keeps_duplicate_outside_window() {
    let dir = tempdir().unwrap();
    let mut store = LogStore::open(dir.path()).unwrap();

    store.save("rare event", &SaveOptions::default()).unwrap();
    for i in 0..60 {
        store
            .save(&format!("filler line number {i:03} with some padding"), &SaveOptions::default())
            .unwrap();
    }
    assert!(store.size().unwrap() > 2048);

    store
        .save("rare event", &SaveOptions::default().with_merge_window(1024))
        .unwrap();

    let texts = read_texts(store.path().unwrap());
    assert_eq!(texts.len(), 62);
    assert_eq!(texts.first().unwrap(), "rare event");
    assert_eq!(texts.last().unwrap(), "rare event");
}

#[test]
fn test_merge_window_larger_than_file() {
    let dir = tempdir().unwrap();
    let mut store = LogStore::open(dir.path()).unwrap();
    let merge = SaveOptions::default().with_merge_window(1_000_000);

    store.save("a", &merge).unwrap();
    store.save("b", &merge).unwrap();
    store.save("a", &merge).unwrap();

    assert_eq!(read_texts(store.path().unwrap()), vec!["b", "a"]);
}

#[test]
fn test_merge_below_minimum_is_off() {
    let dir = tempdir().unwrap();
    let mut store = LogStore::open(dir.path()).unwrap();
    let small = SaveOptions::default().with_merge_window(512);

    store.save("a", &small).unwrap();
    store.save("a", &small).unwrap();

    assert_eq!(read_texts(store.path().unwrap()), vec!["a", "a"]);
}

#[test]
fn test_merge_leaves_only_whole_lines() {
    let dir = tempdir().unwrap();
    let mut store = LogStore::open(dir.path()).unwrap();
    let merge = SaveOptions::default().with_merge_window(1024);

    for i in 0..100 {
        store.save(&format!("message {}", i % 7), &merge).unwrap();
    }

    let raw = fs::read_to_string(store.path().unwrap()).unwrap();
    assert!(raw.ends_with('\n'));
    for line in raw.lines() {
        assert!(
            LogEntry::parse(line, " | ").is_some(),
            "corrupted line after merge: {line:?}"
        );
    }
    let texts = read_texts(store.path().unwrap());
    assert_eq!(texts.last().unwrap(), "message 1");
}

#[test]
fn test_save_after_partial_line_starts_new_line() {
    let dir = tempdir().unwrap();
    let mut store = LogStore::open(dir.path()).unwrap();
    fs::write(store.path().unwrap(), "2024-01-01 00:00:00 | half").unwrap();

    assert!(store.save("next", &SaveOptions::default()).unwrap());

    let lines = read_lines(store.path().unwrap());
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "2024-01-01 00:00:00 | half");
    assert_eq!(LogEntry::parse(&lines[1], " | ").unwrap().text, "next");

    let found = store
        .find(10, 1, &FindOptions::default().with_text("next"))
        .unwrap()
        .into_page()
        .unwrap();
    assert_eq!(found.total, 1);
    assert_eq!(LogEntry::parse(&found.hits[0].line, " | ").unwrap().text, "next");
}
