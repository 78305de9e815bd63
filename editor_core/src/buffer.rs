//! Text buffer: one contiguous chunk of a document.
//!
//! A document is split into a sequence of buffers, each holding whole lines.
//! Every buffer ends with `\n`; in the last buffer that final newline is a
//! sentinel that is not part of the document text. A line never spans two
//! buffers.

use crate::measure::TextMeasure;
use crate::syntax::{LineTokens, ParserState};
use crate::text::BufferId;

/// Marker for a cumulative width that must be recomputed.
pub const INVALID_WIDTH: f64 = -1.0;

/// A chunk of whole lines plus cached metadata about them.
#[derive(Debug, Clone)]
pub struct Buffer {
    data: Vec<u8>,
    capacity: usize,
    /// Offset of the first byte of every line except the first.
    line_starts: Vec<usize>,
    line_widths: Vec<f32>,
    widths_valid: bool,
    width: f64,
    max_line: usize,
    max_width: f32,
    pub(crate) start_line: usize,
    pub(crate) cumulative_width: f64,
    pub(crate) index: usize,
    pub(crate) prev: Option<BufferId>,
    pub(crate) next: Option<BufferId>,
    pub(crate) parsed: bool,
    pub(crate) syntax: Vec<LineTokens>,
    pub(crate) end_state: Option<ParserState>,
}

impl Buffer {
    /// Creates a buffer holding `text`, which must end with a newline.
    ///
    /// The capacity is `capacity_hint` when the text fits comfortably, and
    /// grows by a fifth of the text length otherwise.
    pub fn new(text: &[u8], capacity_hint: usize) -> Self {
        assert!(
            text.last() == Some(&b'\n'),
            "buffer text must end with a newline"
        );
        let capacity = if text.len() + 1 < capacity_hint {
            capacity_hint
        } else {
            text.len() + text.len() / 5 + 2
        };
        let mut data = Vec::with_capacity(capacity);
        data.extend_from_slice(text);
        let line_starts = newline_starts(text, 0)
            .filter(|&start| start < text.len())
            .collect();
        Self {
            data,
            capacity,
            line_starts,
            line_widths: Vec::new(),
            widths_valid: false,
            width: 0.0,
            max_line: 0,
            max_width: 0.0,
            start_line: 0,
            cumulative_width: INVALID_WIDTH,
            index: 0,
            prev: None,
            next: None,
            parsed: false,
            syntax: Vec::new(),
            end_state: None,
        }
    }

    /// Returns the number of bytes in use, including the final newline.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// A buffer always holds at least its final newline.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the raw bytes of the buffer.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the number of lines, which equals the number of newlines.
    pub fn line_count(&self) -> usize {
        self.line_starts.len() + 1
    }

    /// Returns the index of the first line of this buffer in the document.
    pub fn start_line(&self) -> usize {
        self.start_line
    }

    /// Returns the position of this buffer in document order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the offset of the first byte of local line `line`.
    pub fn line_start(&self, line: usize) -> usize {
        if line == 0 {
            0
        } else {
            self.line_starts[line - 1]
        }
    }

    /// Returns the offset of the newline terminating local line `line`.
    pub fn line_end(&self, line: usize) -> usize {
        if line + 1 < self.line_count() {
            self.line_starts[line] - 1
        } else {
            self.data.len() - 1
        }
    }

    /// Returns the contents of local line `line` without its newline.
    pub fn line(&self, line: usize) -> &[u8] {
        &self.data[self.line_start(line)..self.line_end(line)]
    }

    /// Returns the local line containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|&start| start <= offset)
    }

    /// Returns the byte at `offset`.
    pub fn byte_at(&self, offset: usize) -> u8 {
        self.data[offset]
    }

    /// Returns true if `extra` more bytes can be stored without growing.
    pub fn fits(&self, extra: usize) -> bool {
        self.data.len() + extra < self.capacity
    }

    /// Raises the capacity to `capacity`.
    pub fn extend(&mut self, capacity: usize) {
        assert!(capacity > self.capacity, "buffers only grow");
        self.data.reserve_exact(capacity - self.data.len());
        self.capacity = capacity;
    }

    /// Grows the capacity so that `extra` more bytes fit.
    pub fn grow_for(&mut self, extra: usize) {
        let capacity = (self.capacity + self.capacity / 5).max(self.data.len() + extra + 1);
        self.extend(capacity);
    }

    /// Inserts `text` before `offset`. The caller guarantees capacity.
    pub fn insert(&mut self, offset: usize, text: &[u8]) {
        assert!(offset < self.data.len(), "insert past the final newline");
        debug_assert!(self.fits(text.len()));
        let line = self.line_of(offset);
        for start in &mut self.line_starts[line..] {
            *start += text.len();
        }
        self.data.splice(offset..offset, text.iter().copied());
        let added: Vec<usize> = newline_starts(text, offset).collect();
        self.line_starts.splice(line..line, added);
        self.invalidate();
    }

    /// Removes the bytes in `start..end`. The final newline is never removed.
    pub fn delete(&mut self, start: usize, end: usize) {
        assert!(start <= end && end < self.data.len(), "invalid delete range");
        if start == end {
            return;
        }
        let first = self.line_of(start);
        let last = self.line_of(end);
        self.line_starts.drain(first..last);
        for line_start in &mut self.line_starts[first..] {
            *line_start -= end - start;
        }
        self.data.drain(start..end);
        self.invalidate();
    }

    /// Overwrites bytes in place. Neither side may contain a newline.
    pub fn overwrite(&mut self, offset: usize, text: &[u8]) {
        let target = &mut self.data[offset..offset + text.len()];
        debug_assert!(!target.contains(&b'\n') && !text.contains(&b'\n'));
        target.copy_from_slice(text);
        self.invalidate();
    }

    /// Returns the line start closest to the middle of the capacity, or
    /// `None` when the buffer holds a single line.
    pub fn split_point(&self) -> Option<usize> {
        let middle = self.capacity / 2;
        self.line_starts
            .iter()
            .copied()
            .min_by_key(|&start| start.abs_diff(middle))
    }

    /// Moves the lines starting at `at` into a new buffer.
    pub fn split_off(&mut self, at: usize, capacity_hint: usize) -> Buffer {
        debug_assert!(self.line_starts.contains(&at));
        let tail = Buffer::new(&self.data[at..], capacity_hint);
        let first_moved = self.line_of(at) - 1;
        self.line_starts.truncate(first_moved);
        self.data.truncate(at);
        self.invalidate();
        tail
    }

    /// Appends the contents of `other`, which follows this buffer.
    pub fn absorb(&mut self, other: Buffer) {
        let base = self.data.len();
        if !self.fits(other.len()) {
            self.grow_for(other.len());
        }
        self.line_starts.push(base);
        self.line_starts
            .extend(other.line_starts.iter().map(|start| start + base));
        self.data.extend_from_slice(&other.data);
        self.invalidate();
    }

    /// Drops cached widths and syntax after a content change.
    pub fn invalidate(&mut self) {
        self.widths_valid = false;
        self.cumulative_width = INVALID_WIDTH;
        self.parsed = false;
    }

    /// Returns true if the line widths reflect the current contents.
    pub fn widths_valid(&self) -> bool {
        self.widths_valid
    }

    /// Recomputes every line width with `measure`.
    pub fn measure_lines(&mut self, measure: &dyn TextMeasure) {
        let widths: Vec<f32> = (0..self.line_count())
            .map(|line| measure.measure(self.line(line)))
            .collect();
        self.width = widths.iter().map(|&w| w as f64).sum();
        let (max_line, max_width) = widths
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0.0f32), |best, (line, width)| {
                if width > best.1 {
                    (line, width)
                } else {
                    best
                }
            });
        self.max_line = max_line;
        self.max_width = max_width;
        self.line_widths = widths;
        self.widths_valid = true;
    }

    /// Returns the summed width of every line.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Returns the width of local line `line`, if measured.
    pub fn line_width(&self, line: usize) -> Option<f32> {
        if self.widths_valid {
            self.line_widths.get(line).copied()
        } else {
            None
        }
    }

    /// Returns the local index and width of the widest line.
    pub fn widest_line(&self) -> (usize, f32) {
        (self.max_line, self.max_width)
    }

    /// Returns the cumulative width of all preceding buffers, if current.
    pub fn cumulative_width(&self) -> Option<f64> {
        (self.cumulative_width >= 0.0).then_some(self.cumulative_width)
    }

    /// Returns the syntax tokens of local line `line`, if parsed.
    pub fn tokens(&self, line: usize) -> Option<&LineTokens> {
        if self.parsed {
            self.syntax.get(line)
        } else {
            None
        }
    }

    /// Returns true if the highlighter has parsed the current contents.
    pub fn is_parsed(&self) -> bool {
        self.parsed
    }

    /// Checks the structural invariants, describing the first violation.
    pub fn verify(&self) -> Result<(), String> {
        if self.data.last() != Some(&b'\n') {
            return Err("buffer does not end with a newline".to_string());
        }
        if self.data.len() > self.capacity {
            return Err(format!(
                "buffer uses {} bytes but has capacity {}",
                self.data.len(),
                self.capacity
            ));
        }
        let expected: Vec<usize> = newline_starts(&self.data, 0)
            .filter(|&start| start < self.data.len())
            .collect();
        if expected != self.line_starts {
            return Err(format!(
                "line starts {:?} do not match contents (expected {:?})",
                self.line_starts, expected
            ));
        }
        Ok(())
    }
}

/// Yields `base + i + 1` for every newline at index `i` of `text`.
fn newline_starts(text: &[u8], base: usize) -> impl Iterator<Item = usize> + '_ {
    text.iter()
        .enumerate()
        .filter(|(_, &b)| b == b'\n')
        .map(move |(i, _)| base + i + 1)
}
