//! Search and replace functionality.
//!
//! Searching is line by line through a [`Matcher`]. Matches never span a
//! newline.

use crate::cursor::{Direction, Position, TextRange};
use crate::error::SearchError;
use crate::text::BufferList;
use regex::bytes::{Regex, RegexBuilder};
use std::ops::Range;

/// Finds matches inside a single line.
pub trait Matcher: Send + Sync {
    /// Returns the first match in `haystack` starting at or after `start`.
    fn find_at(&self, haystack: &[u8], start: usize) -> Option<Range<usize>>;

    /// Expands `template` against `selected`, resolving group references.
    /// Returns `None` if `selected` does not match.
    fn expand(&self, _selected: &[u8], _template: &str) -> Option<Vec<u8>> {
        None
    }
}

/// Options for compiling a [`RegexMatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    pub case_sensitive: bool,
    /// Treat the pattern as plain text.
    pub literal: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            literal: false,
        }
    }
}

/// A [`Matcher`] backed by a byte regex.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    /// Compiles `pattern`.
    pub fn new(pattern: &str, options: MatchOptions) -> Result<Self, SearchError> {
        let source = if options.literal {
            regex::escape(pattern)
        } else {
            pattern.to_string()
        };
        let regex = RegexBuilder::new(&source)
            .case_insensitive(!options.case_sensitive)
            .build()
            .map_err(|source| SearchError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self { regex })
    }

    /// Compiles a case-sensitive literal pattern.
    pub fn literal(text: &str) -> Result<Self, SearchError> {
        Self::new(
            text,
            MatchOptions {
                case_sensitive: true,
                literal: true,
            },
        )
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl Matcher for RegexMatcher {
    fn find_at(&self, haystack: &[u8], start: usize) -> Option<Range<usize>> {
        self.regex.find_at(haystack, start).map(|m| m.range())
    }

    fn expand(&self, selected: &[u8], template: &str) -> Option<Vec<u8>> {
        let captures = self.regex.captures(selected)?;
        let mut out = Vec::new();
        captures.expand(convert_group_references(template).as_bytes(), &mut out);
        Some(out)
    }
}

/// Rewrites `\N` and `$N` group references as `${N}`; other `$` are literal.
pub(crate) fn convert_group_references(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' || c == '$' {
            let mut digits = String::new();
            while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(*d);
                chars.next();
            }
            if !digits.is_empty() {
                out.push_str("${");
                out.push_str(&digits);
                out.push('}');
                continue;
            }
            if c == '$' {
                if chars.peek() == Some(&'{') {
                    out.push('$');
                } else {
                    out.push_str("$$");
                }
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Returns every non-empty match in `line`.
fn matches_in_line(matcher: &dyn Matcher, line: &[u8]) -> Vec<Range<usize>> {
    let mut found = Vec::new();
    let mut start = 0;
    while start <= line.len() {
        let Some(range) = matcher.find_at(line, start) else {
            break;
        };
        if range.is_empty() {
            start = range.end + 1;
        } else {
            start = range.end;
            found.push(range);
        }
    }
    found
}

fn to_range(line: usize, range: Range<usize>) -> TextRange {
    TextRange::new(Position::new(line, range.start), Position::new(line, range.end))
}

/// Finds the next match from `from` in `direction`.
///
/// Forward searches return the first match starting at or after `from`;
/// backward searches return the last match ending at or before it. With
/// `wrap`, the search continues from the other end of the document.
pub fn find_match(
    text: &BufferList,
    matcher: &dyn Matcher,
    direction: Direction,
    from: Position,
    wrap: bool,
) -> Option<TextRange> {
    let line_count = text.line_count();
    let from_line = from.line.min(line_count - 1);
    match direction {
        Direction::Right => {
            let lines = (from_line..line_count).chain(if wrap { 0..from_line + 1 } else { 0..0 });
            for (step, line) in lines.enumerate() {
                let found = matches_in_line(matcher, text.line(line));
                let hit = match step {
                    0 => found.into_iter().find(|r| r.start >= from.col),
                    _ if line == from_line => found.into_iter().find(|r| r.start < from.col),
                    _ => found.into_iter().next(),
                };
                if let Some(range) = hit {
                    return Some(to_range(line, range));
                }
            }
            None
        }
        Direction::Left => {
            let lines = (0..=from_line)
                .rev()
                .chain(if wrap { (from_line..line_count).rev() } else { (0..0).rev() });
            for (step, line) in lines.enumerate() {
                let found = matches_in_line(matcher, text.line(line));
                let hit = match step {
                    0 => found.into_iter().rev().find(|r| r.end <= from.col),
                    _ if line == from_line => found.into_iter().rev().find(|r| r.end > from.col),
                    _ => found.into_iter().next_back(),
                };
                if let Some(range) = hit {
                    return Some(to_range(line, range));
                }
            }
            None
        }
    }
}

/// Returns every match in the document, in order.
pub fn find_all(text: &BufferList, matcher: &dyn Matcher) -> Vec<TextRange> {
    let mut all = Vec::new();
    for (_, buffer) in text.iter() {
        for local in 0..buffer.line_count() {
            let line = buffer.start_line() + local;
            all.extend(
                matches_in_line(matcher, buffer.line(local))
                    .into_iter()
                    .map(|range| to_range(line, range)),
            );
        }
    }
    all
}

/// Search results held by a view.
#[derive(Debug, Clone, Default)]
pub struct Search {
    /// All matches in the document.
    matches: Vec<TextRange>,
    /// Index of the current (highlighted) match.
    current_match: Option<usize>,
    /// Document version the matches were computed against.
    version: u64,
}

impl Search {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the matches, computed at document `version`.
    pub fn set_matches(&mut self, matches: Vec<TextRange>, version: u64) {
        self.matches = matches;
        self.current_match = None;
        self.version = version;
    }

    /// Returns all matches.
    pub fn matches(&self) -> &[TextRange] {
        &self.matches
    }

    /// Returns the number of matches.
    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Returns true if the matches were computed against `version`.
    pub fn is_current(&self, version: u64) -> bool {
        self.version == version
    }

    /// Returns the current match index.
    pub fn current_match_index(&self) -> Option<usize> {
        self.current_match
    }

    /// Marks the match equal to `range` as current.
    pub fn select(&mut self, range: TextRange) {
        self.current_match = self.matches.iter().position(|m| *m == range);
    }

    /// Clears the search results.
    pub fn clear(&mut self) {
        self.matches.clear();
        self.current_match = None;
    }

    /// Returns true if there are any matches.
    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }

    /// Returns the matches on lines `start_line..end_line`.
    pub fn matches_in_range(&self, start_line: usize, end_line: usize) -> &[TextRange] {
        let first = self.matches.partition_point(|m| m.start.line < start_line);
        let last = self.matches.partition_point(|m| m.start.line < end_line);
        &self.matches[first..last.max(first)]
    }
}
