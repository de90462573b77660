//! Include whitelist loading from files and indexed settings

use std::path::PathBuf;
use umlgate::{
    Settings, Whitelist,
    config::{INCLUDE_WHITELIST_KEY, RENDER_QUEUE_KEY},
    load_whitelist,
};

fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
        .display()
        .to_string()
}

fn from_file(name: &str) -> Whitelist {
    load_whitelist(&Settings::new().with(INCLUDE_WHITELIST_KEY, fixture(name)))
}

fn indexed(values: &[(&str, &str)]) -> Whitelist {
    let settings: Settings = values
        .iter()
        .map(|(suffix, value)| (format!("{INCLUDE_WHITELIST_KEY}_{suffix}"), value.to_string()))
        .collect();
    load_whitelist(&settings)
}

// === File source ===

#[test]
fn test_no_settings_yield_empty_whitelist() {
    assert!(load_whitelist(&Settings::new()).is_empty());
    assert!(load_whitelist(&Settings::new().with(RENDER_QUEUE_KEY, "3")).is_empty());
}

#[test]
fn test_empty_file_yields_empty_whitelist() {
    assert!(from_file("whitelist_empty.txt").is_empty());
}

#[test]
fn test_missing_file_yields_empty_whitelist() {
    let settings = Settings::new().with(INCLUDE_WHITELIST_KEY, "missing.txt");
    assert!(load_whitelist(&settings).is_empty());
}

#[test]
fn test_all_invalid_patterns_are_skipped() {
    assert!(from_file("whitelist_invalid.txt").is_empty());
}

#[test]
fn test_invalid_patterns_do_not_stop_the_scan() {
    assert_eq!(from_file("whitelist_mixed.txt").sources(), vec![r"\/valid\/regex"]);
}

#[test]
fn test_empty_lines_are_skipped() {
    assert_eq!(
        from_file("whitelist_empty_lines.txt").sources(),
        vec!["/path/to/includes", "/other/includes"]
    );
}

#[test]
fn test_valid_file() {
    let whitelist = from_file("whitelist_valid.txt");
    assert_eq!(whitelist.sources(), vec![r"https:\/\/example\.org\/includes"]);
    assert!(whitelist.is_match("https://example.org/includes"));
}

#[test]
fn test_one_invalid_among_many_keeps_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("whitelist.txt");
    std::fs::write(&path, "/a/.*\n/b/[0-9]+\n(unclosed\n/c\n  /d  \n").unwrap();

    let settings = Settings::new().with(INCLUDE_WHITELIST_KEY, path.display().to_string());
    let whitelist = load_whitelist(&settings);
    assert_eq!(whitelist.sources(), vec!["/a/.*", "/b/[0-9]+", "/c", "/d"]);
    assert!(whitelist.is_match("/b/42"));
    assert!(!whitelist.is_match("/b/x"));
}

// === Indexed settings ===

#[test]
fn test_single_indexed_entry() {
    assert_eq!(indexed(&[("0", "/path/to/includes")]).sources(), vec!["/path/to/includes"]);
}

#[test]
fn test_zero_padded_index_is_ignored() {
    assert!(indexed(&[("00", "/path/to/includes")]).is_empty());
}

#[test]
fn test_scan_stops_at_first_gap() {
    let whitelist = indexed(&[("0", "/path/to/includes"), ("2", "/another/path")]);
    assert_eq!(whitelist.sources(), vec!["/path/to/includes"]);
}

#[test]
fn test_indexed_entries_in_order() {
    let whitelist = indexed(&[("2", "/path3"), ("0", "/path1"), ("1", "/path2")]);
    assert_eq!(whitelist.sources(), vec!["/path1", "/path2", "/path3"]);
}

#[test]
fn test_invalid_indexed_entry_is_skipped() {
    let whitelist = indexed(&[
        ("0", "/path1"),
        ("1", r"this\is\an\invalid\regular\/expression"),
        ("2", "/path3"),
    ]);
    assert_eq!(whitelist.sources(), vec!["/path1", "/path3"]);
}

#[test]
fn test_indexed_entries_are_trimmed() {
    let whitelist = indexed(&[("0", "/path1  "), ("1", "  /path2 "), ("2", "\t/path3\n")]);
    assert_eq!(whitelist.sources(), vec!["/path1", "/path2", "/path3"]);
}

#[test]
fn test_file_entries_precede_indexed_entries() {
    let settings = Settings::new()
        .with(INCLUDE_WHITELIST_KEY, fixture("whitelist_empty_lines.txt"))
        .with(format!("{INCLUDE_WHITELIST_KEY}_0"), "/from/settings");
    assert_eq!(
        load_whitelist(&settings).sources(),
        vec!["/path/to/includes", "/other/includes", "/from/settings"]
    );
}
