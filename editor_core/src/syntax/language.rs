//! Language detection and lexical configuration.
//!
//! Detects languages from file extensions and describes the lexical features
//! the built-in highlighter needs: comment markers, string quotes and keywords.

use std::path::Path;

/// Supported programming languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    C,
    Cpp,
    Json,
    #[default]
    PlainText,
}

impl Language {
    /// Returns all available languages.
    pub fn all() -> &'static [Language] {
        &[
            Language::Rust,
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::C,
            Language::Cpp,
            Language::Json,
            Language::PlainText,
        ]
    }

    /// Detects language from a file path based on extension.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::PlainText)
    }

    /// Detects language from a file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Self::Rust,
            "py" | "pyw" | "pyi" => Self::Python,
            "js" | "jsx" | "mjs" | "cjs" => Self::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Self::TypeScript,
            "c" | "h" => Self::C,
            "cpp" | "cc" | "cxx" | "c++" | "hpp" | "hh" | "hxx" | "h++" => Self::Cpp,
            "json" | "jsonc" | "json5" => Self::Json,
            _ => Self::PlainText,
        }
    }

    /// Returns the display name of the language.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rust => "Rust",
            Self::Python => "Python",
            Self::JavaScript => "JavaScript",
            Self::TypeScript => "TypeScript",
            Self::C => "C",
            Self::Cpp => "C++",
            Self::Json => "JSON",
            Self::PlainText => "Plain Text",
        }
    }

    /// Returns whether this language supports syntax highlighting.
    pub fn has_highlighting(&self) -> bool {
        !matches!(self, Self::PlainText)
    }

    /// Returns the marker that starts a comment running to the end of line.
    pub fn line_comment(&self) -> Option<&'static [u8]> {
        match self {
            Self::Python => Some(b"#"),
            Self::Json | Self::PlainText => None,
            _ => Some(b"//"),
        }
    }

    /// Returns the markers delimiting block comments.
    pub fn block_comment(&self) -> Option<(&'static [u8], &'static [u8])> {
        match self {
            Self::Rust | Self::JavaScript | Self::TypeScript | Self::C | Self::Cpp => {
                Some((b"/*", b"*/"))
            }
            _ => None,
        }
    }

    /// Returns the characters that open string literals.
    pub fn string_quotes(&self) -> &'static [u8] {
        match self {
            Self::Rust | Self::C | Self::Cpp | Self::Json => b"\"",
            Self::Python | Self::JavaScript | Self::TypeScript => b"\"'`",
            Self::PlainText => b"",
        }
    }

    /// Returns the reserved words of the language.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Rust => &[
                "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else",
                "enum", "extern", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod",
                "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct",
                "super", "trait", "type", "unsafe", "use", "where", "while",
            ],
            Self::Python => &[
                "and", "as", "assert", "async", "await", "break", "class", "continue", "def",
                "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
                "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise",
                "return", "try", "while", "with", "yield",
            ],
            Self::JavaScript | Self::TypeScript => &[
                "async", "await", "break", "case", "catch", "class", "const", "continue",
                "default", "delete", "do", "else", "export", "extends", "for", "function", "if",
                "import", "in", "instanceof", "interface", "let", "new", "return", "switch",
                "this", "throw", "try", "type", "typeof", "var", "while", "yield",
            ],
            Self::C | Self::Cpp => &[
                "auto", "break", "case", "class", "const", "continue", "default", "do", "else",
                "enum", "extern", "for", "goto", "if", "inline", "namespace", "private",
                "public", "return", "sizeof", "static", "struct", "switch", "template",
                "typedef", "union", "using", "virtual", "void", "volatile", "while",
            ],
            Self::Json | Self::PlainText => &[],
        }
    }

    /// Returns the literal words that highlight as constants.
    pub fn constants(&self) -> &'static [&'static str] {
        match self {
            Self::Python => &["True", "False", "None"],
            Self::JavaScript | Self::TypeScript => &["true", "false", "null", "undefined"],
            Self::C | Self::Cpp => &["true", "false", "NULL", "nullptr"],
            Self::Rust | Self::Json => &["true", "false", "null"],
            Self::PlainText => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("RS"), Language::Rust);
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("ts"), Language::TypeScript);
        assert_eq!(Language::from_extension("hpp"), Language::Cpp);
        assert_eq!(Language::from_extension("json"), Language::Json);
        assert_eq!(Language::from_extension("unknown"), Language::PlainText);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Language::from_path(Path::new("main.rs")), Language::Rust);
        assert_eq!(
            Language::from_path(Path::new("/path/to/config.json")),
            Language::Json
        );
        assert_eq!(
            Language::from_path(Path::new("README")),
            Language::PlainText
        );
    }

    #[test]
    fn test_lexical_features() {
        assert_eq!(Language::Python.line_comment(), Some(&b"#"[..]));
        assert!(Language::Python.block_comment().is_none());
        assert!(Language::Rust.block_comment().is_some());
        assert!(Language::Rust.keywords().contains(&"fn"));
        assert!(Language::PlainText.keywords().is_empty());
        assert!(!Language::PlainText.has_highlighting());
    }
}
