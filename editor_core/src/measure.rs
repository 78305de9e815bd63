//! Text measurement.
//!
//! The document keeps per-line widths so views can size scrollbars and find
//! the widest line. Measuring is delegated to a [`TextMeasure`], so a renderer
//! can plug in real glyph metrics.

use unicode_width::UnicodeWidthChar;

/// Measures the rendered width of a line of text.
pub trait TextMeasure: Send + Sync {
    /// Returns the width of `text`, which never contains a newline.
    fn measure(&self, text: &[u8]) -> f32;
}

/// Fixed-pitch measurement: every column has the same width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceMeasure {
    char_width: f32,
    tab_width: usize,
}

impl Default for MonospaceMeasure {
    fn default() -> Self {
        Self::new(1.0, 4)
    }
}

impl MonospaceMeasure {
    /// Creates a measure where a single column is `char_width` wide.
    pub fn new(char_width: f32, tab_width: usize) -> Self {
        Self {
            char_width,
            tab_width: tab_width.max(1),
        }
    }

    /// Returns the number of columns `text` occupies, expanding tabs.
    pub fn columns(&self, text: &[u8]) -> usize {
        let mut columns = 0;
        for chunk in text.utf8_chunks() {
            for ch in chunk.valid().chars() {
                columns += match ch {
                    '\t' => self.tab_width - columns % self.tab_width,
                    _ => ch.width().unwrap_or(0),
                };
            }
            // Each invalid byte renders as a replacement glyph.
            columns += chunk.invalid().len();
        }
        columns
    }
}

impl TextMeasure for MonospaceMeasure {
    fn measure(&self, text: &[u8]) -> f32 {
        self.columns(text) as f32 * self.char_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_columns() {
        let measure = MonospaceMeasure::default();
        assert_eq!(measure.columns(b"hello"), 5);
        assert_eq!(measure.measure(b""), 0.0);
    }

    #[test]
    fn test_tab_expansion() {
        let measure = MonospaceMeasure::new(2.0, 4);
        assert_eq!(measure.columns(b"\tx"), 5);
        assert_eq!(measure.columns(b"ab\tx"), 5);
        assert_eq!(measure.measure(b"ab\t"), 8.0);
    }

    #[test]
    fn test_wide_and_invalid() {
        let measure = MonospaceMeasure::default();
        assert_eq!(measure.columns("日本".as_bytes()), 4);
        assert_eq!(measure.columns(&[b'a', 0xff, b'b']), 3);
    }
}
