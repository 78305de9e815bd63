//! Splitting raw file contents into buffers.
//!
//! Line endings are normalized to `\n` while loading; the dominant ending of
//! the input is remembered so the text can be written back the same way.

use crate::buffer::Buffer;
use serde::{Deserialize, Serialize};

/// Line ending convention of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LineEnding {
    /// `\n`
    #[default]
    Unix,
    /// `\r\n`
    Windows,
    /// `\r`
    MacOs,
    /// More than one convention appears.
    Mixed,
    /// The text has a single line.
    Unknown,
}

impl LineEnding {
    /// Returns the bytes written for a line break.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            LineEnding::Windows => b"\r\n",
            LineEnding::MacOs => b"\r",
            _ => b"\n",
        }
    }

    fn detect(lf: usize, crlf: usize, cr: usize) -> Self {
        match (lf > 0, crlf > 0, cr > 0) {
            (false, false, false) => LineEnding::Unknown,
            (true, false, false) => LineEnding::Unix,
            (false, true, false) => LineEnding::Windows,
            (false, false, true) => LineEnding::MacOs,
            _ => LineEnding::Mixed,
        }
    }
}

/// Buffers produced from a file.
#[derive(Debug)]
pub(crate) struct Loaded {
    pub buffers: Vec<Buffer>,
    pub line_ending: LineEnding,
}

/// Splits `bytes` into buffers of whole lines.
///
/// `progress` is called with the number of input bytes consumed so far each
/// time a buffer is completed.
pub(crate) fn split_into_buffers(
    bytes: &[u8],
    buffer_size: usize,
    mut progress: impl FnMut(usize),
) -> Loaded {
    let mut buffers = Vec::new();
    let mut chunk: Vec<u8> = Vec::with_capacity(buffer_size);
    let (mut lf, mut crlf, mut cr) = (0, 0, 0);
    let mut consumed = 0;
    loop {
        let rest = &bytes[consumed..];
        let found = rest.iter().position(|&b| b == b'\n' || b == b'\r');
        let (line, step) = match found {
            Some(at) if rest[at] == b'\r' && rest.get(at + 1) == Some(&b'\n') => {
                crlf += 1;
                (&rest[..at], at + 2)
            }
            Some(at) if rest[at] == b'\r' => {
                cr += 1;
                (&rest[..at], at + 1)
            }
            Some(at) => {
                lf += 1;
                (&rest[..at], at + 1)
            }
            None => (rest, rest.len()),
        };
        if !chunk.is_empty() && chunk.len() + line.len() + 2 >= buffer_size {
            buffers.push(Buffer::new(&chunk, buffer_size));
            chunk.clear();
            progress(consumed);
        }
        chunk.extend_from_slice(line);
        chunk.push(b'\n');
        consumed += step;
        if found.is_none() {
            break;
        }
    }
    buffers.push(Buffer::new(&chunk, buffer_size));
    progress(bytes.len());

    log::debug!(
        "split {} bytes into {} buffers ({} lf, {} crlf, {} cr)",
        bytes.len(),
        buffers.len(),
        lf,
        crlf,
        cr
    );
    Loaded {
        buffers,
        line_ending: LineEnding::detect(lf, crlf, cr),
    }
}

/// Converts `\r\n` and lone `\r` to `\n`.
pub fn normalize_line_endings(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        match text[i] {
            b'\r' => {
                out.push(b'\n');
                if text.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    out
}

/// Replaces every `\n` with the bytes of `ending`.
pub fn apply_line_ending(text: &[u8], ending: LineEnding) -> Vec<u8> {
    let separator = ending.as_bytes();
    if separator == b"\n" {
        return text.to_vec();
    }
    let mut out = Vec::with_capacity(text.len());
    for (i, line) in text.split(|&b| b == b'\n').enumerate() {
        if i > 0 {
            out.extend_from_slice(separator);
        }
        out.extend_from_slice(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concat(loaded: &Loaded) -> Vec<u8> {
        loaded
            .buffers
            .iter()
            .flat_map(|b| b.bytes().iter().copied())
            .collect()
    }

    #[test]
    fn test_empty_input() {
        let loaded = split_into_buffers(b"", 64, |_| {});
        assert_eq!(loaded.buffers.len(), 1);
        assert_eq!(concat(&loaded), b"\n");
        assert_eq!(loaded.line_ending, LineEnding::Unknown);
    }

    #[test]
    fn test_trailing_newline_gives_empty_last_line() {
        let loaded = split_into_buffers(b"a\nb\n", 64, |_| {});
        assert_eq!(concat(&loaded), b"a\nb\n\n");
        assert_eq!(loaded.buffers[0].line_count(), 3);
        assert_eq!(loaded.line_ending, LineEnding::Unix);
    }

    #[test]
    fn test_line_endings_normalized() {
        let loaded = split_into_buffers(b"a\r\nb\r\nc", 64, |_| {});
        assert_eq!(concat(&loaded), b"a\nb\nc\n");
        assert_eq!(loaded.line_ending, LineEnding::Windows);

        let loaded = split_into_buffers(b"a\rb\nc", 64, |_| {});
        assert_eq!(concat(&loaded), b"a\nb\nc\n");
        assert_eq!(loaded.line_ending, LineEnding::Mixed);
    }

    #[test]
    fn test_chunks_respect_capacity() {
        let text = "line of text\n".repeat(50);
        let mut reports = Vec::new();
        let loaded = split_into_buffers(text.as_bytes(), 64, |n| reports.push(n));
        assert!(loaded.buffers.len() > 5);
        for buffer in &loaded.buffers {
            assert!(buffer.len() < buffer.capacity());
            assert!(buffer.verify().is_ok());
        }
        assert_eq!(reports.last(), Some(&text.len()));
        let mut expected = text.into_bytes();
        expected.push(b'\n');
        assert_eq!(concat(&loaded), expected);
    }

    #[test]
    fn test_long_line_gets_its_own_buffer() {
        let long = "x".repeat(200);
        let text = format!("a\n{}\nb", long);
        let loaded = split_into_buffers(text.as_bytes(), 32, |_| {});
        assert_eq!(loaded.buffers.len(), 3);
        assert_eq!(loaded.buffers[1].line(0), long.as_bytes());
    }

    #[test]
    fn test_normalize_and_apply() {
        assert_eq!(normalize_line_endings(b"a\r\nb\rc\n"), b"a\nb\nc\n");
        assert_eq!(apply_line_ending(b"a\nb", LineEnding::Windows), b"a\r\nb");
        assert_eq!(apply_line_ending(b"a\nb", LineEnding::Mixed), b"a\nb");
    }
}
