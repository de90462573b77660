//! Inclusion directive tokenizer.
//!
//! Grammar of a directive line:
//!
//! ```text
//! line      := ws* "!" keyword ws+ path (ws* | ws+ comment)
//! keyword   := "includeurl" | "includesub" | "include"
//! path      := (escaped-space | non-ws)+
//! comment   := "#" any*
//! ```
//!
//! `escaped-space` is a backslash immediately followed by a space; it belongs to
//! the path. A path ending in `!` followed only by digits carries a numeric
//! sub-index (`/lib/file.puml!2`). Lines that do not follow the grammar are not
//! directives.
//!
//! Only the three keywords above are recognized. Other inclusion forms such as
//! `!include_many`, `!include_once` and `!import` are out of scope: they are not
//! directives here and pass through the sanitizer untouched.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Include,
    IncludeUrl,
    IncludeSub,
}

impl DirectiveKind {
    pub fn keyword(self) -> &'static str {
        match self {
            DirectiveKind::Include => "include",
            DirectiveKind::IncludeUrl => "includeurl",
            DirectiveKind::IncludeSub => "includesub",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "!{}", self.keyword())
    }
}

/// One recognized inclusion statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub kind: DirectiveKind,
    /// Raw path token, escaped spaces and `!N` suffix included.
    pub path: String,
    /// Trailing comment starting at `#`, if any.
    pub comment: Option<String>,
    pub sub_index: Option<u32>,
    /// Zero-based line number in the text the directive was parsed from.
    pub line: usize,
}

impl Directive {
    /// The path without its numeric `!N` suffix.
    pub fn target(&self) -> &str {
        match self.sub_index {
            Some(_) => self
                .path
                .rsplit_once('!')
                .map_or(self.path.as_str(), |(target, _)| target),
            None => &self.path,
        }
    }

    /// The path with escaped spaces resolved.
    pub fn unescaped_path(&self) -> String {
        self.path.replace("\\ ", " ")
    }
}

// Longest keywords first so `includeurl` is not read as `include` + `url`.
const KEYWORDS: [DirectiveKind; 3] = [
    DirectiveKind::IncludeUrl,
    DirectiveKind::IncludeSub,
    DirectiveKind::Include,
];

/// Parses `line` as a directive; `None` when it does not follow the grammar.
pub fn parse_directive(line: &str, line_number: usize) -> Option<Directive> {
    let rest = line.trim_start().strip_prefix('!')?;

    let (kind, rest) = KEYWORDS
        .iter()
        .find_map(|kind| rest.strip_prefix(kind.keyword()).map(|rest| (*kind, rest)))?;

    let after_keyword = rest.trim_start();
    if after_keyword.len() == rest.len() {
        // keyword must be followed by whitespace (`!includes` is something else)
        return None;
    }

    let path_len = path_token_len(after_keyword);
    if path_len == 0 {
        return None;
    }
    let (path, rest) = after_keyword.split_at(path_len);

    let trailing = rest.trim_start();
    let comment = if trailing.is_empty() {
        None
    } else if trailing.starts_with('#') {
        Some(trailing.to_string())
    } else {
        return None;
    };

    Some(Directive {
        kind,
        path: path.to_string(),
        comment,
        sub_index: sub_index(path),
        line: line_number,
    })
}

/// Byte length of the path token at the start of `input`.
fn path_token_len(input: &str) -> usize {
    let mut chars = input.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c == '\\' && matches!(chars.peek(), Some((_, ' '))) {
            chars.next();
            continue;
        }
        if c.is_whitespace() {
            return idx;
        }
    }
    input.len()
}

fn sub_index(path: &str) -> Option<u32> {
    let (_, suffix) = path.rsplit_once('!')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Option<Directive> {
        parse_directive(line, 0)
    }

    #[test]
    fn test_plain_include() {
        let d = parse("!include /etc/password").unwrap();
        assert_eq!(d.kind, DirectiveKind::Include);
        assert_eq!(d.path, "/etc/password");
        assert_eq!(d.comment, None);
        assert_eq!(d.sub_index, None);
    }

    #[test]
    fn test_path_excludes_comment_and_keeps_sub_index() {
        let d = parse("!include   /etc/password!1   # comment").unwrap();
        assert_eq!(d.path, "/etc/password!1");
        assert_eq!(d.comment.as_deref(), Some("# comment"));
        assert_eq!(d.sub_index, Some(1));
        assert_eq!(d.target(), "/etc/password");
    }

    #[test]
    fn test_escaped_spaces_belong_to_path() {
        let d = parse("!include /etc/path\\ with\\ spaces/file # comment").unwrap();
        assert_eq!(d.path, "/etc/path\\ with\\ spaces/file");
        assert_eq!(d.unescaped_path(), "/etc/path with spaces/file");
    }

    #[test]
    fn test_remote_path() {
        let d = parse("!include https://foo.bar").unwrap();
        assert_eq!(d.path, "https://foo.bar");
    }

    #[test]
    fn test_includeurl_with_surrounding_spaces() {
        let d = parse("  !includeurl   https://foo.bar").unwrap();
        assert_eq!(d.kind, DirectiveKind::IncludeUrl);
        assert_eq!(d.path, "https://foo.bar");
    }

    #[test]
    fn test_includesub_named_block_is_not_a_sub_index() {
        let d = parse("!includesub fooBar!BASIC").unwrap();
        assert_eq!(d.kind, DirectiveKind::IncludeSub);
        assert_eq!(d.path, "fooBar!BASIC");
        assert_eq!(d.sub_index, None);
        assert_eq!(d.target(), "fooBar!BASIC");
    }

    #[test]
    fn test_comment_may_contain_anything() {
        let d = parse("!include /etc/password #<aws/common>").unwrap();
        assert_eq!(d.path, "/etc/password");
        assert_eq!(d.comment.as_deref(), Some("#<aws/common>"));
    }

    #[test]
    fn test_trailing_whitespace_and_carriage_return() {
        let d = parse("!include bar  \r").unwrap();
        assert_eq!(d.path, "bar");
        assert_eq!(d.comment, None);
    }

    #[test]
    fn test_dangling_bracket_is_still_a_path_token() {
        assert_eq!(parse("!include <azure").unwrap().path, "<azure");
    }

    #[test]
    fn test_non_directives() {
        assert!(parse("Bob->Alice:hello").is_none());
        assert!(parse("include /etc/password").is_none());
        assert!(parse("!include").is_none());
        assert!(parse("!include    ").is_none());
        assert!(parse("!includes /etc/password").is_none());
        assert!(parse("!include/etc/password").is_none());
        assert!(parse("!include /etc/password trailing words").is_none());
        assert!(parse("' !include /etc/password").is_none());
    }

    #[test]
    fn test_other_include_forms_are_not_directives() {
        assert!(parse("!include_many /etc/password").is_none());
        assert!(parse("!include_once /etc/password").is_none());
        assert!(parse("!import /etc/archive.zip").is_none());
    }

    #[test]
    fn test_line_number_is_recorded() {
        assert_eq!(parse_directive("!include bar", 7).unwrap().line, 7);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(DirectiveKind::IncludeUrl.to_string(), "!includeurl");
    }
}
