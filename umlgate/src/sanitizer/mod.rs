//! # Directive Sanitizer
//!
//! Statically removes inclusion directives that could make the render engine
//! fetch remote URLs (server-side request forgery) or read local files.
//!
//! ## Decision table
//!
//! | classification       | `Unsafe` | `Safe`              | `Secure` |
//! |----------------------|----------|---------------------|----------|
//! | `StdlibResource`     | keep     | keep                | keep     |
//! | `RelativeSearchPath` | keep     | keep                | keep     |
//! | `RemoteUrl`          | keep     | drop                | drop     |
//! | `UnknownLibrary`     | keep     | drop                | drop     |
//! | `LocalAbsolutePath`  | keep     | keep if whitelisted | drop     |
//!
//! A dropped directive removes its whole line. Kept lines, and every line that
//! is not a directive, are reproduced byte for byte and in order.
//!
//! [`sanitize`] is total and deterministic: the same text, mode, whitelist and
//! stdlib registry always give the same output, and sanitizing twice is the
//! same as sanitizing once.

pub mod classify;
pub mod directive;

pub use classify::{Classification, DEFAULT_STDLIB_LIBRARIES, StdlibRegistry, classify};
pub use directive::{Directive, DirectiveKind, parse_directive};

use crate::{safe_mode::SafeMode, whitelist::Whitelist};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Drop,
}

/// Applies the decision table to one classified directive.
pub fn decide(
    directive: &Directive,
    classification: Classification,
    mode: SafeMode,
    whitelist: &Whitelist,
) -> Verdict {
    if !mode.is_at_least(SafeMode::Safe) {
        return Verdict::Keep;
    }

    let keep = match classification {
        Classification::StdlibResource | Classification::RelativeSearchPath => true,
        Classification::RemoteUrl | Classification::UnknownLibrary => false,
        Classification::LocalAbsolutePath => {
            !mode.is_at_least(SafeMode::Secure) && whitelist.is_match(&directive.path)
        }
    };

    if keep { Verdict::Keep } else { Verdict::Drop }
}

/// Removes every directive the policy does not allow.
///
/// In [`SafeMode::Unsafe`] the text is returned as is. Otherwise the output
/// holds the surviving lines, each terminated by a single `\n`; trailing empty
/// lines of the input are not carried over.
pub fn sanitize(
    text: &str,
    mode: SafeMode,
    whitelist: &Whitelist,
    stdlib: &StdlibRegistry,
) -> String {
    if mode == SafeMode::Unsafe {
        return text.to_string();
    }

    let mut lines: Vec<&str> = text.split('\n').collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    let mut output = String::with_capacity(text.len() + 1);
    for (line_number, line) in lines.into_iter().enumerate() {
        if let Some(directive) = parse_directive(line, line_number) {
            let classification = classify(&directive, stdlib);
            if decide(&directive, classification, mode, whitelist) == Verdict::Drop {
                tracing::debug!(
                    "Dropping {} {} at line {} ({:?}, safe mode {})",
                    directive.kind,
                    directive.path,
                    line_number,
                    classification,
                    mode
                );
                continue;
            }
        }
        output.push_str(line);
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, mode: SafeMode, patterns: &[&str]) -> String {
        sanitize(
            text,
            mode,
            &Whitelist::from_patterns(patterns.iter().copied()),
            &StdlibRegistry::default(),
        )
    }

    #[test]
    fn test_output_ends_with_single_newline() {
        assert_eq!(run("@startuml\n@enduml", SafeMode::Secure, &[]), "@startuml\n@enduml\n");
        assert_eq!(run("@startuml\n@enduml\n\n\n", SafeMode::Safe, &[]), "@startuml\n@enduml\n");
    }

    #[test]
    fn test_inner_blank_lines_are_preserved() {
        assert_eq!(run("a\n\nb", SafeMode::Secure, &[]), "a\n\nb\n");
    }

    #[test]
    fn test_unsafe_is_identity() {
        let text = "@startuml\n!include /foo/bar\n!include https://foo.bar\n@enduml";
        assert_eq!(run(text, SafeMode::Unsafe, &[]), text);
    }

    #[test]
    fn test_decide_local_path_matrix() {
        let directive = parse_directive("!include /etc/password", 1).unwrap();
        let whitelist = Whitelist::from_patterns(["/etc/password"]);
        let empty = Whitelist::default();
        let local = Classification::LocalAbsolutePath;

        assert_eq!(decide(&directive, local, SafeMode::Unsafe, &empty), Verdict::Keep);
        assert_eq!(decide(&directive, local, SafeMode::Safe, &empty), Verdict::Drop);
        assert_eq!(decide(&directive, local, SafeMode::Safe, &whitelist), Verdict::Keep);
        assert_eq!(decide(&directive, local, SafeMode::Secure, &whitelist), Verdict::Drop);
    }

    #[test]
    fn test_decide_remote_and_unknown_library() {
        let directive = parse_directive("!include https://foo.bar", 0).unwrap();
        let everything = Whitelist::from_patterns([".*"]);
        for class in [Classification::RemoteUrl, Classification::UnknownLibrary] {
            assert_eq!(decide(&directive, class, SafeMode::Unsafe, &everything), Verdict::Keep);
            assert_eq!(decide(&directive, class, SafeMode::Safe, &everything), Verdict::Drop);
            assert_eq!(decide(&directive, class, SafeMode::Secure, &everything), Verdict::Drop);
        }
    }

    #[test]
    fn test_whitelist_is_matched_against_path_not_comment() {
        let text = "!include /etc/password # allowed\n";
        assert_eq!(run(text, SafeMode::Safe, &["/etc/password"]), text);
        assert_eq!(run(text, SafeMode::Safe, &["/etc/password # allowed"]), "");
    }

    #[test]
    fn test_whitelist_sees_sub_index() {
        let text = "!include /etc/password!1\n";
        assert_eq!(run(text, SafeMode::Safe, &["/etc/password"]), "");
        assert_eq!(run(text, SafeMode::Safe, &["/etc/password!1"]), text);
    }
}
