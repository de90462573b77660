//! Directive classification.
//!
//! Classification looks only at the path syntax and the directive keyword, never
//! at the filesystem or the network.

use super::directive::{Directive, DirectiveKind};
use std::collections::BTreeSet;

/// Libraries bundled with the diagram engine's standard library.
pub const DEFAULT_STDLIB_LIBRARIES: &[&str] = &[
    "archimate",
    "aws",
    "awslib",
    "azure",
    "c4",
    "classy",
    "cloudinsight",
    "cloudogu",
    "domainstory",
    "edgy",
    "elastic",
    "ibm",
    "k8s",
    "kubernetes",
    "logos",
    "material",
    "office",
    "osa",
    "tupadr3",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// `<library/resource>` naming a bundled library.
    StdlibResource,
    /// A bracketed form that is not a valid reference to a bundled library.
    UnknownLibrary,
    LocalAbsolutePath,
    /// Resolved against the engine's own search path.
    RelativeSearchPath,
    RemoteUrl,
}

/// Set of library names accepted inside `<...>` includes. Names are compared
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdlibRegistry {
    libraries: BTreeSet<String>,
}

impl Default for StdlibRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_STDLIB_LIBRARIES.iter().copied())
    }
}

impl StdlibRegistry {
    pub fn new<I, S>(libraries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            libraries: libraries
                .into_iter()
                .map(|name| name.as_ref().trim().to_ascii_lowercase())
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    /// Parses a comma-separated list such as `"aws, azure,c4"`.
    pub fn from_list(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn contains(&self, library: &str) -> bool {
        self.libraries.contains(&library.trim().to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

pub fn classify(directive: &Directive, stdlib: &StdlibRegistry) -> Classification {
    let target = directive.target();

    if target.starts_with('<') {
        return classify_bracketed(target, stdlib);
    }
    if directive.kind == DirectiveKind::IncludeUrl || is_remote(target) {
        return Classification::RemoteUrl;
    }
    if target.starts_with('/') {
        return Classification::LocalAbsolutePath;
    }
    Classification::RelativeSearchPath
}

fn classify_bracketed(target: &str, stdlib: &StdlibRegistry) -> Classification {
    let Some(inner) = target
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
    else {
        return Classification::UnknownLibrary;
    };

    match inner.trim().split_once('/') {
        Some((library, resource))
            if !library.is_empty() && !resource.trim().is_empty() && stdlib.contains(library) =>
        {
            Classification::StdlibResource
        }
        _ => Classification::UnknownLibrary,
    }
}

fn is_remote(target: &str) -> bool {
    let lower = target.get(..8).unwrap_or(target).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
