//! # Include Whitelist
//!
//! Operator-supplied patterns that may re-allow local-file includes when the
//! gateway runs in [`SafeMode::Safe`](crate::safe_mode::SafeMode::Safe).
//!
//! Patterns come from two sources, concatenated in this order:
//!
//! 1. the file named by `UMLGATE_INCLUDE_WHITELIST`, one pattern per line, blank
//!    lines ignored;
//! 2. the indexed settings `UMLGATE_INCLUDE_WHITELIST_0`, `_1`, ... scanned until
//!    the first missing index.
//!
//! Loading is total. A missing file contributes nothing and an invalid pattern
//! is logged and skipped, so one bad line never disables the rest of the list.
//!
//! Every pattern must match the *whole* include path: `/etc` does not allow
//! `/etc/passwd`.

use crate::config::{INCLUDE_WHITELIST_KEY, Settings};
use regex::Regex;
use std::{fmt, path::Path};

/// One compiled whitelist pattern.
#[derive(Clone)]
pub struct WhitelistEntry {
    source: String,
    regex: Regex,
}

impl WhitelistEntry {
    /// Compiles `source` as a full-match pattern.
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{source})$"))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// The pattern as written by the operator.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

impl fmt::Debug for WhitelistEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WhitelistEntry").field(&self.source).finish()
    }
}

impl PartialEq for WhitelistEntry {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for WhitelistEntry {}

/// Ordered list of whitelist entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    entries: Vec<WhitelistEntry>,
}

impl Whitelist {
    pub fn new(entries: Vec<WhitelistEntry>) -> Self {
        Self { entries }
    }

    /// Compiles every pattern, skipping (and logging) invalid ones.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut whitelist = Whitelist::default();
        for pattern in patterns {
            whitelist.push_pattern(pattern.as_ref(), "inline");
        }
        whitelist
    }

    /// True when any entry matches the whole of `path`.
    pub fn is_match(&self, path: &str) -> bool {
        self.entries.iter().any(|entry| entry.is_match(path))
    }

    pub fn entries(&self) -> &[WhitelistEntry] {
        &self.entries
    }

    /// Pattern sources in evaluation order.
    pub fn sources(&self) -> Vec<&str> {
        self.entries.iter().map(WhitelistEntry::source).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push_pattern(&mut self, pattern: &str, origin: &str) -> bool {
        match WhitelistEntry::new(pattern) {
            Ok(entry) => {
                self.entries.push(entry);
                true
            }
            Err(e) => {
                tracing::warn!(
                    "Skipping invalid include whitelist pattern '{}' ({}): {}",
                    pattern,
                    origin,
                    e
                );
                false
            }
        }
    }
}

/// Builds the whitelist from the file source followed by the indexed settings.
pub fn load_whitelist(settings: &Settings) -> Whitelist {
    let mut whitelist = Whitelist::default();

    if let Some(path) = settings.get(INCLUDE_WHITELIST_KEY) {
        load_file_patterns(Path::new(path.trim()), &mut whitelist);
    }
    load_indexed_patterns(settings, &mut whitelist);

    tracing::debug!("Loaded {} include whitelist entries", whitelist.len());
    whitelist
}

fn load_file_patterns(path: &Path, whitelist: &mut Whitelist) {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(
                "Include whitelist file {:?} could not be read, ignoring it: {}",
                path,
                e
            );
            return;
        }
    };

    let origin = path.display().to_string();
    for line in contents.lines() {
        let pattern = line.trim();
        if pattern.is_empty() {
            continue;
        }
        whitelist.push_pattern(pattern, &origin);
    }
}

fn load_indexed_patterns(settings: &Settings, whitelist: &mut Whitelist) {
    for index in 0.. {
        let key = format!("{INCLUDE_WHITELIST_KEY}_{index}");
        let Some(value) = settings.get(&key) else {
            break;
        };
        let pattern = value.trim();
        if pattern.is_empty() {
            tracing::debug!("Skipping empty include whitelist setting {}", key);
            continue;
        }
        whitelist.push_pattern(pattern, &key);
    }
}
