//! Keyword-based highlighter for the built-in languages.

use super::{Highlighter, Language, LineTokens, ParserState, Token, TokenStyle};
use crate::error::HighlightError;

const NORMAL: ParserState = ParserState(0);
const IN_BLOCK_COMMENT: ParserState = ParserState(1);

/// Highlights comments, strings, numbers and keywords of a [`Language`].
///
/// The only state carried between lines is whether a block comment is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordHighlighter {
    language: Language,
}

impl KeywordHighlighter {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    fn word_style(&self, word: &[u8]) -> TokenStyle {
        let Ok(word) = std::str::from_utf8(word) else {
            return TokenStyle::Default;
        };
        if self.language.keywords().contains(&word) {
            TokenStyle::Keyword
        } else if self.language.constants().contains(&word) {
            TokenStyle::Constant
        } else if self.language.has_highlighting()
            && word.starts_with(|c: char| c.is_ascii_uppercase())
        {
            TokenStyle::Type
        } else {
            TokenStyle::Default
        }
    }
}

impl Highlighter for KeywordHighlighter {
    fn default_state(&self) -> ParserState {
        NORMAL
    }

    fn parse_line(
        &self,
        line: &[u8],
        state: ParserState,
    ) -> Result<(LineTokens, ParserState), HighlightError> {
        let block = self.language.block_comment();
        let mut in_block = match state {
            NORMAL => false,
            IN_BLOCK_COMMENT if block.is_some() => true,
            other => {
                return Err(HighlightError::ParseFailed(format!(
                    "{:?} is not a valid {} state",
                    other,
                    self.language.name()
                )))
            }
        };

        let mut tokens = LineTokens::new();
        let mut i = 0;
        while i < line.len() {
            let rest = &line[i..];
            if in_block {
                let close = block.map(|(_, close)| close).unwrap_or(b"*/");
                let len = match find(rest, close) {
                    Some(at) => {
                        in_block = false;
                        at + close.len()
                    }
                    None => rest.len(),
                };
                push(&mut tokens, TokenStyle::Comment, len);
                i += len;
                continue;
            }
            if let Some(marker) = self.language.line_comment() {
                if rest.starts_with(marker) {
                    push(&mut tokens, TokenStyle::Comment, rest.len());
                    break;
                }
            }
            if let Some((open, _)) = block {
                if rest.starts_with(open) {
                    push(&mut tokens, TokenStyle::Comment, open.len());
                    in_block = true;
                    i += open.len();
                    continue;
                }
            }

            let c = rest[0];
            let (style, len) = if self.language.string_quotes().contains(&c) {
                (TokenStyle::String, string_len(rest, c))
            } else if c.is_ascii_digit() {
                let len = run_len(rest, |b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_');
                (TokenStyle::Number, len)
            } else if is_word_byte(c) {
                let len = run_len(rest, is_word_byte);
                (self.word_style(&rest[..len]), len)
            } else if c.is_ascii_whitespace() {
                (TokenStyle::Default, run_len(rest, |b| b.is_ascii_whitespace()))
            } else if b"(){}[],;:.".contains(&c) {
                (TokenStyle::Punctuation, 1)
            } else {
                (TokenStyle::Operator, 1)
            };
            push(&mut tokens, style, len);
            i += len;
        }

        let end = if in_block { IN_BLOCK_COMMENT } else { NORMAL };
        Ok((tokens, end))
    }
}

/// Appends a token, extending the previous one if the style matches.
fn push(tokens: &mut LineTokens, style: TokenStyle, len: usize) {
    match tokens.last_mut() {
        Some(last) if last.style == style => last.len += len,
        _ => tokens.push(Token::new(style, len)),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn run_len(bytes: &[u8], pred: impl Fn(u8) -> bool) -> usize {
    bytes.iter().position(|&b| !pred(b)).unwrap_or(bytes.len())
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// Returns the length of the string literal at the start of `bytes`.
/// Unterminated strings run to the end of the line.
fn string_len(bytes: &[u8], quote: u8) -> usize {
    let mut j = 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b if b == quote => return j + 1,
            _ => j += 1,
        }
    }
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn styles(tokens: &LineTokens) -> Vec<TokenStyle> {
        tokens.iter().map(|t| t.style).collect()
    }

    #[test]
    fn test_rust_line() {
        let h = KeywordHighlighter::new(Language::Rust);
        let (tokens, state) = h.parse_line(b"let x = 42; // hi", NORMAL).unwrap();
        assert_eq!(state, NORMAL);
        assert_eq!(tokens[0], Token::new(TokenStyle::Keyword, 3));
        assert!(styles(&tokens).contains(&TokenStyle::Number));
        assert_eq!(tokens.last().unwrap().style, TokenStyle::Comment);
        assert_eq!(tokens.iter().map(|t| t.len).sum::<usize>(), 17);
    }

    #[test]
    fn test_block_comment_spans_lines() {
        let h = KeywordHighlighter::new(Language::C);
        let (tokens, state) = h.parse_line(b"int a; /* open", NORMAL).unwrap();
        assert_eq!(state, IN_BLOCK_COMMENT);
        assert_eq!(tokens.last().unwrap().style, TokenStyle::Comment);

        let (tokens, state) = h.parse_line(b"still */ return", state).unwrap();
        assert_eq!(state, NORMAL);
        assert_eq!(tokens[0], Token::new(TokenStyle::Comment, 8));
        assert_eq!(tokens.last().unwrap().style, TokenStyle::Keyword);
    }

    #[test]
    fn test_strings_with_escapes() {
        let h = KeywordHighlighter::new(Language::Json);
        let (tokens, _) = h.parse_line(br#"{"a\"b": true}"#, NORMAL).unwrap();
        assert_eq!(tokens[1], Token::new(TokenStyle::String, 6));
        assert!(styles(&tokens).contains(&TokenStyle::Constant));
    }

    #[test]
    fn test_invalid_state_is_an_error() {
        let h = KeywordHighlighter::new(Language::Python);
        assert!(h.parse_line(b"x", IN_BLOCK_COMMENT).is_err());
        assert!(h.parse_line(b"x", ParserState(7)).is_err());
    }

    #[test]
    fn test_plain_text() {
        let h = KeywordHighlighter::new(Language::PlainText);
        let (tokens, _) = h.parse_line(b"Hello world", NORMAL).unwrap();
        assert!(tokens
            .iter()
            .all(|t| t.style == TokenStyle::Default || t.style == TokenStyle::Operator));
    }
}
