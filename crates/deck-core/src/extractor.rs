//! Action marker extraction
//!
//! Scans advisory text for embedded action markers:
//!
//! ```text
//! marker := "[OPERATION:" kind ":" label "]"
//! kind   := [A-Za-z0-9_]+
//! label  := one or more chars, excluding ']' and '\n'
//! ```
//!
//! Matching is left-to-right and non-overlapping. The `OPERATION:` tag is
//! case-sensitive. A candidate that fails to parse is skipped one byte past
//! its opening bracket, so a marker nested after a broken one is still found.
//! Labels end at the first `]`; nested brackets are not supported.

use std::ops::Range;

/// Literal opening of every marker
pub const MARKER_OPEN: &str = "[OPERATION:";

/// A `(kind, label)` pair found in advisory text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescriptor<'a> {
    /// Kind tag
    pub kind: &'a str,
    /// Label
    pub label: &'a str,
    /// Byte range of the whole marker in the source text
    pub span: Range<usize>,
}

/// Scanner for action markers
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionExtractor;

impl ActionExtractor {
    /// Create new extractor
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Lazily iterate over the markers in `text`
    ///
    /// Never fails; text without markers yields an empty sequence.
    #[inline]
    pub fn extract<'a>(&self, text: &'a str) -> Markers<'a> {
        Markers { text, cursor: 0 }
    }
}

/// Iterator over markers in a text, produced by [`ActionExtractor::extract`]
#[derive(Debug, Clone)]
pub struct Markers<'a> {
    text: &'a str,
    cursor: usize,
}

impl<'a> Iterator for Markers<'a> {
    type Item = ActionDescriptor<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.text.len() {
            let found = self.text[self.cursor..].find(MARKER_OPEN)?;
            let start = self.cursor + found;

            match parse_marker(self.text, start) {
                Some(descriptor) => {
                    self.cursor = descriptor.span.end;
                    return Some(descriptor);
                }
                // '[' is one byte, so start + 1 is always a char boundary
                None => self.cursor = start + 1,
            }
        }
        None
    }
}

/// Parse a marker whose opening bracket sits at `start`
fn parse_marker(text: &str, start: usize) -> Option<ActionDescriptor<'_>> {
    let kind_start = start + MARKER_OPEN.len();
    let rest = &text[kind_start..];

    let kind_len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count();
    if kind_len == 0 || rest.as_bytes().get(kind_len) != Some(&b':') {
        return None;
    }

    let label_start = kind_start + kind_len + 1;
    let label_len = text[label_start..].find(|c: char| c == ']' || c == '\n')?;
    if label_len == 0 || text.as_bytes()[label_start + label_len] != b']' {
        return None;
    }

    let end = label_start + label_len + 1;
    Some(ActionDescriptor {
        kind: &text[kind_start..kind_start + kind_len],
        label: &text[label_start..label_start + label_len],
        span: start..end,
    })
}
