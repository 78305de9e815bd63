//! Error types for the document engine.
//!
//! Programming errors (editing before a document has loaded, stale buffer
//! handles, broken cursor ordering) are assertion failures, not variants here.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while compiling a search pattern.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("invalid search pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors reported by a syntax highlighter while parsing a line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HighlightError {
    #[error("highlighter failed: {0}")]
    ParseFailed(String),
}

/// Errors raised when serializing or restoring view settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised when opening a document from disk.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
