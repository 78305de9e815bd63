//! Syntax highlighting.
//!
//! Highlighting is line based: a [`Highlighter`] turns one line plus the
//! parser state left by the previous line into tokens and a new state. The
//! document runs it buffer by buffer in the background (see
//! [`Document::schedule_highlighting`](crate::Document::schedule_highlighting)),
//! storing tokens and the end state on each buffer.

mod keyword;
mod language;
mod token;

pub use keyword::KeywordHighlighter;
pub use language::Language;
pub use token::{LineTokens, Token, TokenStyle};

use crate::error::HighlightError;

/// Opaque state carried from the end of one line to the start of the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ParserState(pub u64);

/// A pluggable line highlighter.
pub trait Highlighter: Send + Sync {
    /// Returns the state at the start of the document.
    fn default_state(&self) -> ParserState;

    /// Tokenizes `line` (without its newline) starting from `state`.
    fn parse_line(
        &self,
        line: &[u8],
        state: ParserState,
    ) -> Result<(LineTokens, ParserState), HighlightError>;

    /// Returns true if parsing from `a` and from `b` gives the same results.
    fn states_equivalent(&self, a: ParserState, b: ParserState) -> bool {
        a == b
    }
}
