//! Token styles produced by highlighters.

/// Semantic style of a run of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TokenStyle {
    /// Keywords (fn, let, if, else, etc.)
    Keyword,
    /// String literals
    String,
    /// Numeric literals (integers, floats)
    Number,
    /// Comments (line and block)
    Comment,
    /// Type names
    Type,
    /// Constants and literal words (true, null)
    Constant,
    /// Operators (+, -, *, /, etc.)
    Operator,
    /// Punctuation (brackets, commas, semicolons)
    Punctuation,
    /// Default text (no special highlighting)
    #[default]
    Default,
}

/// A run of `len` bytes sharing one style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub style: TokenStyle,
    pub len: usize,
}

impl Token {
    pub fn new(style: TokenStyle, len: usize) -> Self {
        Self { style, len }
    }
}

/// Tokens covering one line, in order.
pub type LineTokens = Vec<Token>;
