//! Locating the `@start...` / `@end...` block of a diagram source.
//!
//! Line numbers reported to users are zero-based and relative to the `@start`
//! line, so the first line of the diagram body is line 1.

/// The first delimited diagram block in a source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramBlock<'a> {
    /// Diagram type taken from the start delimiter (`uml` for `@startuml`).
    pub kind: &'a str,
    /// Absolute index of the `@start` line.
    pub start_line: usize,
    /// Absolute index of the `@end` line.
    pub end_line: usize,
    /// Lines strictly between the delimiters.
    pub body: Vec<&'a str>,
}

impl DiagramBlock<'_> {
    /// Converts an absolute line index into a block-relative line number.
    pub fn relative_line(&self, absolute: usize) -> usize {
        absolute.saturating_sub(self.start_line)
    }

    /// Body lines paired with their block-relative line numbers.
    pub fn numbered_body(&self) -> impl Iterator<Item = (usize, &str)> {
        self.body
            .iter()
            .enumerate()
            .map(|(offset, line)| (offset + 1, *line))
    }
}

/// Finds the first `@start...` line and the first `@end...` line after it.
/// Returns `None` when either delimiter is missing.
pub fn locate(source: &str) -> Option<DiagramBlock<'_>> {
    let lines: Vec<&str> = source.lines().collect();

    let (start_line, kind) = lines.iter().enumerate().find_map(|(idx, line)| {
        let kind = line.trim().strip_prefix("@start")?;
        Some((idx, delimiter_kind(kind)))
    })?;

    let end_line = lines
        .iter()
        .enumerate()
        .skip(start_line + 1)
        .find(|(_, line)| line.trim().starts_with("@end"))
        .map(|(idx, _)| idx)?;

    Some(DiagramBlock {
        kind,
        start_line,
        end_line,
        body: lines[start_line + 1..end_line].to_vec(),
    })
}

fn delimiter_kind(rest: &str) -> &str {
    let end = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    &rest[..end]
}
