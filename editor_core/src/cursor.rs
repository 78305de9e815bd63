//! Cursor and selection handling.
//!
//! A [`Cursor`] stores two buffer positions: the anchor (where a selection
//! started) and the caret. Positions point into buffers directly, so they
//! survive edits elsewhere in the document; structural edits move them through
//! [`Relocation`]s.

use crate::measure::TextMeasure;
use crate::text::{BufferList, Relocation, TextPosition};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Represents a position in the document as (line, byte column).
/// Both are 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// A span of the document in (line, column) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// A cursor in line/column form, used for snapshots and persisted settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CursorRange {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl CursorRange {
    /// A caret without selection.
    pub fn caret(line: usize, column: usize) -> Self {
        Self::new(line, column, line, column)
    }

    pub fn new(start_line: usize, start_column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Returns the anchor.
    pub fn start(&self) -> Position {
        Position::new(self.start_line, self.start_column)
    }

    /// Returns the caret.
    pub fn end(&self) -> Position {
        Position::new(self.end_line, self.end_column)
    }
}

/// Direction of a movement or deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
}

/// Unit by which a deletion extends an empty selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    Character,
    Word,
    Line,
}

/// A single cursor with an optional selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    pub(crate) anchor: TextPosition,
    pub(crate) caret: TextPosition,
    /// Horizontal position kept across vertical movement.
    pub(crate) desired_x: Option<f32>,
    /// Creation order; later cursors win direction conflicts when merging.
    pub(crate) serial: u64,
}

impl Cursor {
    /// Creates a cursor with no selection at `pos`.
    pub fn new(pos: TextPosition) -> Self {
        Self::with_selection(pos, pos)
    }

    /// Creates a cursor selecting from `anchor` to `caret`.
    pub fn with_selection(anchor: TextPosition, caret: TextPosition) -> Self {
        Self {
            anchor,
            caret,
            desired_x: None,
            serial: 0,
        }
    }

    /// Builds a cursor from line/column coordinates, clamped to the document.
    pub fn from_range(text: &BufferList, range: &CursorRange) -> Self {
        Self::with_selection(
            text.position_of(range.start_line, range.start_column),
            text.position_of(range.end_line, range.end_column),
        )
    }

    /// Converts the cursor to line/column coordinates.
    pub fn to_range(&self, text: &BufferList) -> CursorRange {
        let (start_line, start_column) = text.line_col(self.anchor);
        let (end_line, end_column) = text.line_col(self.caret);
        CursorRange::new(start_line, start_column, end_line, end_column)
    }

    pub fn anchor(&self) -> TextPosition {
        self.anchor
    }

    pub fn caret(&self) -> TextPosition {
        self.caret
    }

    /// Returns true if there's an active selection.
    pub fn has_selection(&self) -> bool {
        self.anchor != self.caret
    }

    /// Returns the earlier of anchor and caret.
    pub fn begin(&self, text: &BufferList) -> TextPosition {
        match text.compare(self.anchor, self.caret) {
            Ordering::Greater => self.caret,
            _ => self.anchor,
        }
    }

    /// Returns the later of anchor and caret.
    pub fn end(&self, text: &BufferList) -> TextPosition {
        match text.compare(self.anchor, self.caret) {
            Ordering::Greater => self.anchor,
            _ => self.caret,
        }
    }

    /// Returns true if the caret sits before the anchor.
    pub fn is_reversed(&self, text: &BufferList) -> bool {
        text.compare(self.caret, self.anchor) == Ordering::Less
    }

    /// Moves the caret to `pos`, dragging the anchor along unless `extend`.
    pub fn set_position(&mut self, pos: TextPosition, extend: bool) {
        self.caret = pos;
        if !extend {
            self.anchor = pos;
        }
    }

    /// Collapses the selection onto the caret.
    pub fn collapse_selection(&mut self) {
        self.anchor = self.caret;
    }

    pub(crate) fn relocate(&mut self, relocation: &Relocation) {
        relocation.apply(&mut self.anchor);
        relocation.apply(&mut self.caret);
    }

    /// Moves one character. Without `extend`, a selection collapses to the
    /// side it is moving towards instead.
    pub fn offset_character(&mut self, text: &BufferList, direction: Direction, extend: bool) {
        self.desired_x = None;
        if !extend && self.has_selection() {
            let pos = match direction {
                Direction::Left => self.begin(text),
                Direction::Right => self.end(text),
            };
            self.set_position(pos, false);
            return;
        }
        let next = match direction {
            Direction::Left => text.prev_char(self.caret),
            Direction::Right => text.next_char(self.caret),
        };
        if let Some(pos) = next {
            self.set_position(pos, extend);
        } else if !extend {
            self.collapse_selection();
        }
    }

    /// Moves to the next word boundary.
    pub fn offset_word(&mut self, text: &BufferList, direction: Direction, extend: bool) {
        self.desired_x = None;
        let pos = word_boundary(text, self.caret, direction);
        self.set_position(pos, extend);
    }

    /// Moves `delta` lines up (negative) or down, keeping the horizontal
    /// position. Moving past the first or last line goes to the document edge.
    pub fn offset_line(
        &mut self,
        text: &BufferList,
        measure: &dyn TextMeasure,
        delta: isize,
        extend: bool,
    ) {
        let (line, col) = text.line_col(self.caret);
        let x = self
            .desired_x
            .unwrap_or_else(|| measure.measure(&text.line(line)[..col]));
        let target = line as isize + delta;
        let pos = if target < 0 {
            text.start()
        } else if target as usize >= text.line_count() {
            text.end()
        } else {
            let target = target as usize;
            text.position_of(target, column_for_x(text.line(target), x, measure))
        };
        self.set_position(pos, extend);
        self.desired_x = Some(x);
    }

    /// Moves to the start of the current line.
    pub fn move_to_line_start(&mut self, text: &BufferList, extend: bool) {
        self.desired_x = None;
        self.set_position(text.line_start_of(self.caret), extend);
    }

    /// Moves to the end of the current line.
    pub fn move_to_line_end(&mut self, text: &BufferList, extend: bool) {
        self.desired_x = None;
        self.set_position(text.line_end_of(self.caret), extend);
    }

    /// Moves to the start of the document.
    pub fn move_to_start(&mut self, text: &BufferList, extend: bool) {
        self.desired_x = None;
        self.set_position(text.start(), extend);
    }

    /// Moves to the end of the document.
    pub fn move_to_end(&mut self, text: &BufferList, extend: bool) {
        self.desired_x = None;
        self.set_position(text.end(), extend);
    }

    /// Selects the word (or run of punctuation or whitespace) at the caret.
    pub fn select_word(&mut self, text: &BufferList) {
        self.desired_x = None;
        let caret = self.caret;
        let start = match text.prev_char(caret) {
            Some(prev) if text.char_at(prev).is_some() => {
                word_boundary(text, caret, Direction::Left)
            }
            _ => caret,
        };
        let end = match text.char_at(caret) {
            Some(_) => word_boundary(text, caret, Direction::Right),
            None => caret,
        };
        self.anchor = start;
        self.caret = end;
    }

    /// Selects the current lines, including the newline that ends them.
    pub fn select_line(&mut self, text: &BufferList) {
        self.desired_x = None;
        let start = text.line_start_of(self.begin(text));
        let line_end = text.line_end_of(self.end(text));
        self.anchor = start;
        self.caret = text.next_char(line_end).unwrap_or(line_end);
    }

    /// Grows an empty cursor by one unit of `granularity` for deletion.
    pub(crate) fn extend_for_deletion(
        &mut self,
        text: &BufferList,
        direction: Direction,
        granularity: Granularity,
    ) {
        match granularity {
            Granularity::Character => self.offset_character(text, direction, true),
            Granularity::Word => self.offset_word(text, direction, true),
            Granularity::Line => {
                let boundary = match direction {
                    Direction::Left => text.line_start_of(self.caret),
                    Direction::Right => text.line_end_of(self.caret),
                };
                if boundary == self.caret {
                    self.offset_character(text, direction, true);
                } else {
                    self.set_position(boundary, true);
                }
            }
        }
    }
}

/// Character classes used for word movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Whitespace,
    Word,
    Punctuation,
}

fn char_class(c: char) -> CharClass {
    if c.is_whitespace() {
        CharClass::Whitespace
    } else if c.is_alphanumeric() || c == '_' {
        CharClass::Word
    } else {
        CharClass::Punctuation
    }
}

/// Returns the next word boundary from `pos`. At a line edge the boundary is
/// the neighbouring line.
pub(crate) fn word_boundary(text: &BufferList, pos: TextPosition, direction: Direction) -> TextPosition {
    match direction {
        Direction::Right => {
            if text.char_at(pos).is_none() {
                return text.next_char(pos).unwrap_or(pos);
            }
            let mut pos = skip_class(text, pos, |c| c == CharClass::Whitespace, Direction::Right);
            if let Some(c) = text.char_at(pos) {
                let class = char_class(c);
                pos = skip_class(text, pos, |c| c == class, Direction::Right);
            }
            pos
        }
        Direction::Left => {
            let Some(prev) = text.prev_char(pos) else {
                return pos;
            };
            if text.char_at(prev).is_none() {
                return prev;
            }
            let mut pos = skip_class(text, pos, |c| c == CharClass::Whitespace, Direction::Left);
            if let Some(c) = text.prev_char(pos).and_then(|p| text.char_at(p)) {
                let class = char_class(c);
                pos = skip_class(text, pos, |c| c == class, Direction::Left);
            }
            pos
        }
    }
}

/// Moves over characters on the current line while `matches` holds.
fn skip_class(
    text: &BufferList,
    pos: TextPosition,
    matches: impl Fn(CharClass) -> bool,
    direction: Direction,
) -> TextPosition {
    let mut pos = pos;
    loop {
        let (probe, next) = match direction {
            Direction::Right => (Some(pos), text.next_char(pos)),
            Direction::Left => {
                let prev = text.prev_char(pos);
                (prev, prev)
            }
        };
        let class = probe.and_then(|p| text.char_at(p)).map(char_class);
        match (class, next) {
            (Some(class), Some(next)) if matches(class) => pos = next,
            _ => return pos,
        }
    }
}

/// Returns the byte column whose left edge is closest to `x`.
pub(crate) fn column_for_x(line: &[u8], x: f32, measure: &dyn TextMeasure) -> usize {
    let mut prev_col = 0;
    let mut prev_width = 0.0;
    let mut col = 0;
    while col < line.len() {
        col += crate::text::utf8_len(line[col]).min(line.len() - col);
        let width = measure.measure(&line[..col]);
        if width > x {
            return if width - x < x - prev_width { col } else { prev_col };
        }
        prev_col = col;
        prev_width = width;
    }
    line.len()
}

/// Manages multiple cursors for one view.
#[derive(Debug, Clone)]
pub struct MultiCursor {
    cursors: Vec<Cursor>,
    /// Index of the active cursor.
    primary_index: usize,
    next_serial: u64,
}

impl MultiCursor {
    /// Creates a single cursor at `pos`.
    pub fn new(pos: TextPosition) -> Self {
        let mut cursors = Self {
            cursors: Vec::new(),
            primary_index: 0,
            next_serial: 0,
        };
        cursors.reset(vec![Cursor::new(pos)]);
        cursors
    }

    /// Returns the number of cursors.
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    /// A view always has at least one cursor.
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Returns true if there's only one cursor.
    pub fn is_single(&self) -> bool {
        self.cursors.len() == 1
    }

    /// Returns the active cursor.
    pub fn primary(&self) -> &Cursor {
        &self.cursors[self.primary_index]
    }

    pub fn primary_index(&self) -> usize {
        self.primary_index
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cursor> {
        self.cursors.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Cursor> {
        self.cursors.iter_mut()
    }

    pub(crate) fn get(&self, index: usize) -> Cursor {
        self.cursors[index]
    }

    pub(crate) fn set(&mut self, index: usize, cursor: Cursor) {
        let serial = self.cursors[index].serial;
        self.cursors[index] = Cursor { serial, ..cursor };
    }

    /// Replaces every cursor; the last one becomes active.
    pub fn reset(&mut self, cursors: Vec<Cursor>) {
        assert!(!cursors.is_empty(), "a view needs at least one cursor");
        self.cursors = cursors;
        for cursor in &mut self.cursors {
            cursor.serial = self.next_serial;
            self.next_serial += 1;
        }
        self.primary_index = self.cursors.len() - 1;
    }

    /// Adds a cursor and makes it active.
    pub fn add_cursor(&mut self, cursor: Cursor) {
        let cursor = Cursor {
            serial: self.next_serial,
            ..cursor
        };
        self.next_serial += 1;
        self.cursors.push(cursor);
        self.primary_index = self.cursors.len() - 1;
    }

    /// Removes all cursors but the active one.
    pub fn collapse_to_primary(&mut self) {
        let primary = self.cursors[self.primary_index];
        self.cursors = vec![primary];
        self.primary_index = 0;
    }

    pub(crate) fn relocate(&mut self, relocation: &Relocation) {
        for cursor in &mut self.cursors {
            cursor.relocate(relocation);
        }
    }

    /// Snapshots every cursor as line/column ranges.
    pub fn ranges(&self, text: &BufferList) -> Vec<CursorRange> {
        self.cursors.iter().map(|c| c.to_range(text)).collect()
    }

    /// Restores cursors from a snapshot without normalizing.
    pub fn restore(&mut self, text: &BufferList, ranges: &[CursorRange]) {
        let cursors = ranges
            .iter()
            .map(|range| Cursor::from_range(text, range))
            .collect();
        self.reset(cursors);
    }

    /// Returns true if the cursors are ordered by their first position.
    pub fn is_sorted(&self, text: &BufferList) -> bool {
        self.cursors.windows(2).all(|pair| {
            text.compare(pair[0].begin(text), pair[1].begin(text)) != Ordering::Greater
        })
    }

    /// Clamps, sorts and merges overlapping or touching cursors.
    ///
    /// A merged cursor keeps the direction of the more recently created one,
    /// and the active cursor stays active (or the cursor it was merged into).
    pub fn normalize(&mut self, text: &BufferList) {
        for cursor in &mut self.cursors {
            cursor.anchor = text.clamp(cursor.anchor);
            cursor.caret = text.clamp(cursor.caret);
        }
        let mut primary_serial = self.cursors[self.primary_index].serial;

        self.cursors.sort_by(|a, b| {
            text.compare(a.begin(text), b.begin(text))
                .then(text.compare(a.end(text), b.end(text)))
        });

        let mut i = 0;
        while i + 1 < self.cursors.len() {
            let a = self.cursors[i];
            let b = self.cursors[i + 1];
            if text.compare(a.end(text), b.begin(text)) == Ordering::Less {
                i += 1;
                continue;
            }
            let begin = a.begin(text);
            let end = match text.compare(a.end(text), b.end(text)) {
                Ordering::Less => b.end(text),
                _ => a.end(text),
            };
            let later = if b.serial > a.serial { b } else { a };
            let (anchor, caret) = if later.is_reversed(text) {
                (end, begin)
            } else {
                (begin, end)
            };
            if primary_serial == a.serial || primary_serial == b.serial {
                primary_serial = later.serial;
            }
            self.cursors[i] = Cursor {
                anchor,
                caret,
                desired_x: later.desired_x,
                serial: later.serial,
            };
            self.cursors.remove(i + 1);
        }

        self.primary_index = self
            .cursors
            .iter()
            .position(|c| c.serial == primary_serial)
            .unwrap_or(self.cursors.len() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::measure::MonospaceMeasure;

    fn text(chunks: &[&str]) -> BufferList {
        let buffers = chunks
            .iter()
            .map(|chunk| Buffer::new(chunk.as_bytes(), 64))
            .collect();
        BufferList::from_buffers(buffers, 64)
    }

    fn at(text: &BufferList, line: usize, col: usize) -> TextPosition {
        text.position_of(line, col)
    }

    #[test]
    fn test_move_character_across_lines() {
        let text = text(&["ab\n", "cd\n"]);
        let mut cursor = Cursor::new(at(&text, 0, 2));
        cursor.offset_character(&text, Direction::Right, false);
        assert_eq!(text.line_col(cursor.caret()), (1, 0));
        cursor.offset_character(&text, Direction::Left, false);
        assert_eq!(text.line_col(cursor.caret()), (0, 2));
    }

    #[test]
    fn test_collapse_selection_when_moving() {
        let text = text(&["hello world\n"]);
        let mut cursor = Cursor::with_selection(at(&text, 0, 2), at(&text, 0, 5));
        cursor.offset_character(&text, Direction::Left, false);
        assert!(!cursor.has_selection());
        assert_eq!(text.line_col(cursor.caret()), (0, 2));
    }

    #[test]
    fn test_word_movement() {
        let text = text(&["foo  bar.baz\n"]);
        let mut cursor = Cursor::new(at(&text, 0, 0));
        cursor.offset_word(&text, Direction::Right, false);
        assert_eq!(text.line_col(cursor.caret()), (0, 3));
        cursor.offset_word(&text, Direction::Right, false);
        assert_eq!(text.line_col(cursor.caret()), (0, 8));
        cursor.offset_word(&text, Direction::Right, false);
        assert_eq!(text.line_col(cursor.caret()), (0, 9));
        cursor.offset_word(&text, Direction::Left, false);
        assert_eq!(text.line_col(cursor.caret()), (0, 8));
        cursor.offset_word(&text, Direction::Left, false);
        assert_eq!(text.line_col(cursor.caret()), (0, 5));
    }

    #[test]
    fn test_word_movement_crosses_lines() {
        let text = text(&["foo\nbar\n"]);
        let mut cursor = Cursor::new(at(&text, 0, 3));
        cursor.offset_word(&text, Direction::Right, false);
        assert_eq!(text.line_col(cursor.caret()), (1, 0));
        cursor.offset_word(&text, Direction::Left, false);
        assert_eq!(text.line_col(cursor.caret()), (0, 3));
    }

    #[test]
    fn test_vertical_movement_keeps_column() {
        let text = text(&["abcdef\nab\nabcdef\n"]);
        let measure = MonospaceMeasure::default();
        let mut cursor = Cursor::new(at(&text, 0, 5));
        cursor.offset_line(&text, &measure, 1, false);
        assert_eq!(text.line_col(cursor.caret()), (1, 2));
        cursor.offset_line(&text, &measure, 1, false);
        assert_eq!(text.line_col(cursor.caret()), (2, 5));
        cursor.offset_line(&text, &measure, 5, false);
        assert_eq!(cursor.caret(), text.end());
    }

    #[test]
    fn test_select_word_and_line() {
        let text = text(&["one two\nthree\n"]);
        let mut cursor = Cursor::new(at(&text, 0, 5));
        cursor.select_word(&text);
        assert_eq!(cursor.to_range(&text), CursorRange::new(0, 4, 0, 7));

        cursor.select_line(&text);
        assert_eq!(cursor.to_range(&text), CursorRange::new(0, 0, 1, 0));
    }

    #[test]
    fn test_line_deletion_extent() {
        let text = text(&["hello\nworld\n"]);
        let mut cursor = Cursor::new(at(&text, 1, 3));
        cursor.extend_for_deletion(&text, Direction::Left, Granularity::Line);
        assert_eq!(cursor.to_range(&text), CursorRange::new(1, 3, 1, 0));

        let mut cursor = Cursor::new(at(&text, 1, 0));
        cursor.extend_for_deletion(&text, Direction::Left, Granularity::Line);
        assert_eq!(cursor.to_range(&text), CursorRange::new(1, 0, 0, 5));
    }

    #[test]
    fn test_normalize_merges_overlapping() {
        let text = text(&["abcdefghij\n"]);
        let mut cursors = MultiCursor::new(at(&text, 0, 0));
        cursors.reset(vec![
            Cursor::with_selection(at(&text, 0, 6), at(&text, 0, 2)),
            Cursor::with_selection(at(&text, 0, 1), at(&text, 0, 4)),
            Cursor::new(at(&text, 0, 9)),
        ]);
        cursors.normalize(&text);
        assert_eq!(cursors.len(), 2);
        // The later cursor selected forwards, so the merged one does too.
        assert_eq!(
            cursors.ranges(&text)[0],
            CursorRange::new(0, 1, 0, 6)
        );
        assert_eq!(text.line_col(cursors.primary().caret()), (0, 9));

        let snapshot = cursors.ranges(&text);
        cursors.normalize(&text);
        assert_eq!(cursors.ranges(&text), snapshot);
    }

    #[test]
    fn test_normalize_merges_touching_and_tracks_primary() {
        let text = text(&["abcdefghij\n"]);
        let mut cursors = MultiCursor::new(at(&text, 0, 0));
        cursors.reset(vec![
            Cursor::new(at(&text, 0, 3)),
            Cursor::with_selection(at(&text, 0, 3), at(&text, 0, 1)),
        ]);
        cursors.add_cursor(Cursor::new(at(&text, 0, 7)));
        cursors.add_cursor(Cursor::new(at(&text, 0, 7)));
        cursors.normalize(&text);
        assert_eq!(cursors.len(), 2);
        assert_eq!(cursors.ranges(&text)[0], CursorRange::new(0, 3, 0, 1));
        assert_eq!(cursors.primary_index(), 1);
        assert!(cursors.is_sorted(&text));
    }

    #[test]
    fn test_column_for_x() {
        let measure = MonospaceMeasure::default();
        assert_eq!(column_for_x(b"abcdef", 2.0, &measure), 2);
        assert_eq!(column_for_x(b"abcdef", 2.4, &measure), 2);
        assert_eq!(column_for_x(b"abcdef", 2.6, &measure), 3);
        assert_eq!(column_for_x(b"ab", 9.0, &measure), 2);
    }
}
