//! Document configuration.

use serde::{Deserialize, Serialize};

/// Default capacity of a text buffer in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Smallest buffer capacity accepted; anything lower is raised to this.
pub const MIN_BUFFER_SIZE: usize = 8;

/// How indentation is written when indenting or converting lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Indentation {
    #[default]
    Tabs,
    Spaces,
}

/// Tunables for a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentOptions {
    /// Target capacity of each text buffer.
    pub buffer_size: usize,
    /// Width of a tab stop, in columns.
    pub tab_width: usize,
    /// Indentation written by indent and convert operations.
    pub indentation: Indentation,
    /// Maximum number of undo entries kept (0 = unlimited).
    pub max_undo: usize,
    /// Consecutive typing within this window undoes as one step (0 = off).
    pub coalesce_window_ms: u64,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            tab_width: 4,
            indentation: Indentation::Tabs,
            max_undo: 0,
            coalesce_window_ms: 0,
        }
    }
}

impl DocumentOptions {
    /// Returns the buffer size clamped to the supported minimum.
    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size.max(MIN_BUFFER_SIZE)
    }

    /// Returns the bytes making up one level of indentation.
    pub fn indent_unit(&self) -> Vec<u8> {
        match self.indentation {
            Indentation::Tabs => b"\t".to_vec(),
            Indentation::Spaces => vec![b' '; self.tab_width.max(1)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = DocumentOptions::default();
        assert_eq!(options.buffer_size, 4096);
        assert_eq!(options.tab_width, 4);
        assert_eq!(options.indent_unit(), b"\t".to_vec());
    }

    #[test]
    fn test_small_buffer_size_is_clamped() {
        let options = DocumentOptions {
            buffer_size: 2,
            ..Default::default()
        };
        assert_eq!(options.effective_buffer_size(), MIN_BUFFER_SIZE);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: DocumentOptions =
            serde_json::from_str(r#"{"tab_width": 2, "indentation": "spaces"}"#).unwrap();
        assert_eq!(options.tab_width, 2);
        assert_eq!(options.indentation, Indentation::Spaces);
        assert_eq!(options.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(options.indent_unit(), b"  ".to_vec());
    }
}
