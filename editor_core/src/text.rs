//! Ordered arena of text buffers.
//!
//! [`BufferList`] owns every [`Buffer`] of a document and keeps them in
//! document order. Buffers are addressed by generational [`BufferId`] handles,
//! so a position into a freed buffer fails a checked lookup instead of reading
//! another buffer's bytes.
//!
//! Structural edits (split, merge, deletions across buffers) are recorded as
//! [`Relocation`]s. The owner of the cursors drains them after every primitive
//! and applies them to each stored position.

use crate::buffer::Buffer;
use slotmap::{new_key_type, SlotMap};
use std::cmp::Ordering;

new_key_type! {
    /// Handle to a buffer in a [`BufferList`].
    pub struct BufferId;
}

/// A byte position inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextPosition {
    pub buffer: BufferId,
    pub offset: usize,
}

impl TextPosition {
    pub fn new(buffer: BufferId, offset: usize) -> Self {
        Self { buffer, offset }
    }
}

/// How stored positions must move after a structural edit.
#[derive(Debug, Clone, PartialEq)]
pub enum Relocation {
    /// `len` bytes were inserted at `at`.
    Insert {
        buffer: BufferId,
        at: usize,
        len: usize,
    },
    /// The bytes in `start..end` were removed from one buffer.
    Remove {
        buffer: BufferId,
        start: usize,
        end: usize,
    },
    /// Everything from `at` onwards moved to the new buffer `into`.
    Split {
        buffer: BufferId,
        at: usize,
        into: BufferId,
    },
    /// `from` was appended to `into` at offset `base` and freed.
    Merge {
        from: BufferId,
        into: BufferId,
        base: usize,
    },
    /// Text from `begin` to `end` was removed across buffers. The rest of the
    /// line containing `end` (through `tail_end`, its newline) was moved to
    /// `begin`, and the buffers in `removed` were freed.
    Join {
        begin: TextPosition,
        end: TextPosition,
        tail_end: usize,
        removed: Vec<BufferId>,
    },
}

impl Relocation {
    /// Moves `pos` so it refers to the same text after the edit.
    pub fn apply(&self, pos: &mut TextPosition) {
        match *self {
            Relocation::Insert { buffer, at, len } => {
                if pos.buffer == buffer && pos.offset >= at {
                    pos.offset += len;
                }
            }
            Relocation::Remove { buffer, start, end } => {
                if pos.buffer == buffer {
                    if pos.offset >= end {
                        pos.offset -= end - start;
                    } else if pos.offset > start {
                        pos.offset = start;
                    }
                }
            }
            Relocation::Split { buffer, at, into } => {
                if pos.buffer == buffer && pos.offset >= at {
                    *pos = TextPosition::new(into, pos.offset - at);
                }
            }
            Relocation::Merge { from, into, base } => {
                if pos.buffer == from {
                    *pos = TextPosition::new(into, pos.offset + base);
                }
            }
            Relocation::Join {
                begin,
                end,
                tail_end,
                ref removed,
            } => {
                if pos.buffer == begin.buffer {
                    if pos.offset > begin.offset {
                        *pos = begin;
                    }
                } else if removed.contains(&pos.buffer) {
                    *pos = begin;
                } else if pos.buffer == end.buffer {
                    if pos.offset < end.offset {
                        *pos = begin;
                    } else if pos.offset <= tail_end {
                        *pos = TextPosition::new(
                            begin.buffer,
                            begin.offset + pos.offset - end.offset,
                        );
                    } else {
                        pos.offset -= tail_end + 1;
                    }
                }
            }
        }
    }
}

/// The buffers of a document, in order.
#[derive(Debug, Clone)]
pub struct BufferList {
    arena: SlotMap<BufferId, Buffer>,
    order: Vec<BufferId>,
    buffer_size: usize,
    line_count: usize,
    relocations: Vec<Relocation>,
}

impl BufferList {
    /// Creates a list holding an empty document.
    pub fn new(buffer_size: usize) -> Self {
        Self::from_buffers(vec![Buffer::new(b"\n", buffer_size)], buffer_size)
    }

    /// Creates a list from buffers already in document order.
    pub fn from_buffers(buffers: Vec<Buffer>, buffer_size: usize) -> Self {
        assert!(!buffers.is_empty(), "a document has at least one buffer");
        let mut arena = SlotMap::with_capacity_and_key(buffers.len());
        let order: Vec<BufferId> = buffers.into_iter().map(|b| arena.insert(b)).collect();
        for (i, &id) in order.iter().enumerate() {
            let buffer = &mut arena[id];
            buffer.prev = i.checked_sub(1).map(|p| order[p]);
            buffer.next = order.get(i + 1).copied();
        }
        let mut list = Self {
            arena,
            order,
            buffer_size,
            line_count: 0,
            relocations: Vec::new(),
        };
        list.renumber(0);
        list
    }

    /// Returns the capacity new buffers are created with.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Returns the number of buffers.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// A list always holds at least one buffer.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns the number of lines in the document.
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Returns the buffer behind `id`.
    ///
    /// # Panics
    /// Panics if the buffer has been freed.
    pub fn buffer(&self, id: BufferId) -> &Buffer {
        match self.arena.get(id) {
            Some(buffer) => buffer,
            None => panic!("stale buffer handle {:?}", id),
        }
    }

    pub(crate) fn buffer_mut(&mut self, id: BufferId) -> &mut Buffer {
        match self.arena.get_mut(id) {
            Some(buffer) => buffer,
            None => panic!("stale buffer handle {:?}", id),
        }
    }

    /// Returns the buffer behind `id`, or `None` if it was freed.
    pub fn get(&self, id: BufferId) -> Option<&Buffer> {
        self.arena.get(id)
    }

    /// Returns the buffer ids in document order.
    pub fn ids(&self) -> &[BufferId] {
        &self.order
    }

    /// Iterates over the buffers in document order.
    pub fn iter(&self) -> impl Iterator<Item = (BufferId, &Buffer)> + '_ {
        self.order.iter().map(move |&id| (id, &self.arena[id]))
    }

    pub fn first(&self) -> BufferId {
        self.order[0]
    }

    pub fn last(&self) -> BufferId {
        self.order[self.order.len() - 1]
    }

    /// Returns the id of the buffer at `index` in document order.
    pub fn at(&self, index: usize) -> BufferId {
        self.order[index]
    }

    /// Returns the buffer containing document line `line`.
    pub fn buffer_for_line(&self, line: usize) -> BufferId {
        let line = line.min(self.line_count - 1);
        let idx = self
            .order
            .partition_point(|&id| self.arena[id].start_line <= line);
        self.order[idx - 1]
    }

    /// Returns the first position of the document.
    pub fn start(&self) -> TextPosition {
        TextPosition::new(self.first(), 0)
    }

    /// Returns the position just before the sentinel newline.
    pub fn end(&self) -> TextPosition {
        let last = self.last();
        TextPosition::new(last, self.buffer(last).len() - 1)
    }

    pub fn is_start(&self, pos: TextPosition) -> bool {
        pos.offset == 0 && self.buffer(pos.buffer).index == 0
    }

    pub fn is_end(&self, pos: TextPosition) -> bool {
        let buffer = self.buffer(pos.buffer);
        buffer.next.is_none() && pos.offset + 1 >= buffer.len()
    }

    /// Orders two positions by document order.
    pub fn compare(&self, a: TextPosition, b: TextPosition) -> Ordering {
        let ia = self.buffer(a.buffer).index;
        let ib = self.buffer(b.buffer).index;
        ia.cmp(&ib).then(a.offset.cmp(&b.offset))
    }

    /// Clamps a position to a valid spot; positions in freed buffers move to
    /// the end of the document.
    pub fn clamp(&self, pos: TextPosition) -> TextPosition {
        match self.arena.get(pos.buffer) {
            Some(buffer) => TextPosition::new(pos.buffer, pos.offset.min(buffer.len() - 1)),
            None => self.end(),
        }
    }

    /// Returns the position of (`line`, `column`), clamped to the document.
    pub fn position_of(&self, line: usize, column: usize) -> TextPosition {
        let line = line.min(self.line_count - 1);
        let id = self.buffer_for_line(line);
        let buffer = self.buffer(id);
        let local = line - buffer.start_line;
        let start = buffer.line_start(local);
        let end = buffer.line_end(local);
        TextPosition::new(id, (start + column).min(end))
    }

    /// Returns the (line, byte column) of `pos`.
    pub fn line_col(&self, pos: TextPosition) -> (usize, usize) {
        let buffer = self.buffer(pos.buffer);
        let local = buffer.line_of(pos.offset);
        (
            buffer.start_line + local,
            pos.offset - buffer.line_start(local),
        )
    }

    /// Returns document line `line` without its newline.
    pub fn line(&self, line: usize) -> &[u8] {
        let buffer = self.buffer(self.buffer_for_line(line));
        buffer.line(line - buffer.start_line)
    }

    pub fn byte_at(&self, pos: TextPosition) -> u8 {
        self.buffer(pos.buffer).byte_at(pos.offset)
    }

    /// Returns the start of the line containing `pos`.
    pub fn line_start_of(&self, pos: TextPosition) -> TextPosition {
        let buffer = self.buffer(pos.buffer);
        TextPosition::new(pos.buffer, buffer.line_start(buffer.line_of(pos.offset)))
    }

    /// Returns the newline ending the line containing `pos`.
    pub fn line_end_of(&self, pos: TextPosition) -> TextPosition {
        let buffer = self.buffer(pos.buffer);
        TextPosition::new(pos.buffer, buffer.line_end(buffer.line_of(pos.offset)))
    }

    /// Moves forward by `n` bytes, stopping at the end of the document.
    pub fn advance(&self, pos: TextPosition, n: usize) -> TextPosition {
        let mut pos = pos;
        let mut n = n;
        loop {
            let buffer = self.buffer(pos.buffer);
            let room = buffer.len() - pos.offset;
            if n < room {
                pos.offset += n;
                return pos;
            }
            match buffer.next {
                Some(next) => {
                    n -= room;
                    pos = TextPosition::new(next, 0);
                }
                None => return TextPosition::new(pos.buffer, buffer.len() - 1),
            }
        }
    }

    /// Moves backward by `n` bytes, stopping at the start of the document.
    pub fn retreat(&self, pos: TextPosition, n: usize) -> TextPosition {
        let mut pos = pos;
        let mut n = n;
        loop {
            if n <= pos.offset {
                pos.offset -= n;
                return pos;
            }
            match self.buffer(pos.buffer).prev {
                Some(prev) => {
                    n -= pos.offset + 1;
                    pos = TextPosition::new(prev, self.buffer(prev).len() - 1);
                }
                None => return TextPosition::new(pos.buffer, 0),
            }
        }
    }

    /// Returns the position one character after `pos`, if any.
    pub fn next_char(&self, pos: TextPosition) -> Option<TextPosition> {
        if self.is_end(pos) {
            return None;
        }
        let buffer = self.buffer(pos.buffer);
        let byte = buffer.byte_at(pos.offset);
        if byte == b'\n' {
            return Some(self.advance(pos, 1));
        }
        let line_end = buffer.line_end(buffer.line_of(pos.offset));
        let offset = (pos.offset + utf8_len(byte)).min(line_end);
        Some(TextPosition::new(pos.buffer, offset))
    }

    /// Returns the position one character before `pos`, if any.
    pub fn prev_char(&self, pos: TextPosition) -> Option<TextPosition> {
        if self.is_start(pos) {
            return None;
        }
        if pos.offset == 0 {
            return Some(self.retreat(pos, 1));
        }
        let buffer = self.buffer(pos.buffer);
        let mut offset = pos.offset - 1;
        if buffer.byte_at(offset) == b'\n' {
            return Some(TextPosition::new(pos.buffer, offset));
        }
        let line_start = buffer.line_start(buffer.line_of(offset));
        while offset > line_start && is_continuation(buffer.byte_at(offset)) {
            offset -= 1;
        }
        Some(TextPosition::new(pos.buffer, offset))
    }

    /// Decodes the character starting at `pos`. Newlines yield `None`.
    pub fn char_at(&self, pos: TextPosition) -> Option<char> {
        let buffer = self.buffer(pos.buffer);
        let line_end = buffer.line_end(buffer.line_of(pos.offset));
        let bytes = &buffer.bytes()[pos.offset..line_end];
        let len = bytes.first().map(|&b| utf8_len(b))?.min(bytes.len());
        Some(
            std::str::from_utf8(&bytes[..len])
                .ok()
                .and_then(|s| s.chars().next())
                .unwrap_or(char::REPLACEMENT_CHARACTER),
        )
    }

    /// Copies the bytes from `begin` to `end`.
    pub fn read_range(&self, begin: TextPosition, end: TextPosition) -> Vec<u8> {
        let mut out = Vec::new();
        let mut pos = begin;
        loop {
            let buffer = self.buffer(pos.buffer);
            if pos.buffer == end.buffer {
                out.extend_from_slice(&buffer.bytes()[pos.offset..end.offset]);
                return out;
            }
            out.extend_from_slice(&buffer.bytes()[pos.offset..]);
            match buffer.next {
                Some(next) => pos = TextPosition::new(next, 0),
                None => return out,
            }
        }
    }

    /// Returns the whole document text, without the sentinel newline.
    pub fn text(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (_, buffer) in self.iter() {
            out.extend_from_slice(buffer.bytes());
        }
        out.pop();
        out
    }

    /// Takes the relocations recorded since the last call.
    pub fn take_relocations(&mut self) -> Vec<Relocation> {
        std::mem::take(&mut self.relocations)
    }

    /// Inserts `text` at `pos` and returns the position after it.
    pub fn insert(&mut self, pos: TextPosition, text: &[u8]) -> TextPosition {
        let first_index = self.buffer(pos.buffer).index;
        let mut pos = pos;
        let mut segments = text.split(|&b| b == b'\n');
        if let Some(first) = segments.next() {
            if !first.is_empty() {
                pos = self.insert_piece(pos, first);
            }
        }
        for segment in segments {
            let mut piece = Vec::with_capacity(segment.len() + 1);
            piece.push(b'\n');
            piece.extend_from_slice(segment);
            pos = self.insert_piece(pos, &piece);
        }
        self.renumber(first_index);
        pos
    }

    /// Inserts a piece holding at most one newline, at its start.
    fn insert_piece(&mut self, pos: TextPosition, piece: &[u8]) -> TextPosition {
        let mut target = pos;
        let buffer = self.buffer(pos.buffer);
        if !buffer.fits(piece.len()) {
            if let Some(at) = buffer.split_point() {
                let into = self.split(pos.buffer, at);
                if target.offset >= at {
                    target = TextPosition::new(into, target.offset - at);
                }
            }
            let buffer = self.buffer_mut(target.buffer);
            if !buffer.fits(piece.len()) {
                buffer.grow_for(piece.len());
            }
        }
        self.buffer_mut(target.buffer).insert(target.offset, piece);
        self.relocations.push(Relocation::Insert {
            buffer: target.buffer,
            at: target.offset,
            len: piece.len(),
        });
        TextPosition::new(target.buffer, target.offset + piece.len())
    }

    /// Splits `id` at line start `at`, returning the new following buffer.
    fn split(&mut self, id: BufferId, at: usize) -> BufferId {
        let buffer_size = self.buffer_size;
        let buffer = self.buffer_mut(id);
        let index = buffer.index;
        let old_next = buffer.next;
        let mut tail = buffer.split_off(at, buffer_size);
        tail.prev = Some(id);
        tail.next = old_next;
        let into = self.arena.insert(tail);
        self.buffer_mut(id).next = Some(into);
        if let Some(next) = old_next {
            self.buffer_mut(next).prev = Some(into);
        }
        self.order.insert(index + 1, into);
        self.relocations.push(Relocation::Split {
            buffer: id,
            at,
            into,
        });
        self.renumber(index);
        log::trace!("split buffer {} at offset {}", index, at);
        into
    }

    /// Removes the text from `begin` to `end` and returns where `begin` ended up.
    pub fn delete(&mut self, begin: TextPosition, end: TextPosition) -> TextPosition {
        debug_assert!(self.compare(begin, end) != Ordering::Greater);
        let mark = self.relocations.len();
        let first_index = self.buffer(begin.buffer).index.saturating_sub(1);
        if begin.buffer == end.buffer {
            if begin.offset == end.offset {
                return begin;
            }
            self.buffer_mut(begin.buffer).delete(begin.offset, end.offset);
            self.relocations.push(Relocation::Remove {
                buffer: begin.buffer,
                start: begin.offset,
                end: end.offset,
            });
        } else {
            self.join(begin, end);
        }
        self.renumber(first_index);
        self.merge_around(begin.buffer);
        self.renumber(first_index);

        let mut pos = begin;
        for relocation in &self.relocations[mark..] {
            relocation.apply(&mut pos);
        }
        pos
    }

    /// Deletes across buffers, moving the remainder of the end line to `begin`.
    fn join(&mut self, begin: TextPosition, end: TextPosition) {
        let first = self.buffer(begin.buffer).index;
        let last = self.buffer(end.buffer).index;
        let removed: Vec<BufferId> = self.order[first + 1..last].to_vec();

        let end_buffer = self.buffer(end.buffer);
        let tail_end = end_buffer.line_end(end_buffer.line_of(end.offset));
        let tail = end_buffer.bytes()[end.offset..tail_end].to_vec();
        let end_consumed = tail_end + 1 == end_buffer.len();
        let after = end_buffer.next;

        self.relocations.push(Relocation::Join {
            begin,
            end,
            tail_end,
            removed: removed.clone(),
        });

        let head = self.buffer_mut(begin.buffer);
        let used = head.len();
        head.delete(begin.offset, used - 1);
        if !tail.is_empty() {
            if !head.fits(tail.len()) {
                head.grow_for(tail.len());
            }
            head.insert(begin.offset, &tail);
        }

        for id in removed {
            self.arena.remove(id);
        }
        let next = if end_consumed {
            self.arena.remove(end.buffer);
            after
        } else {
            self.buffer_mut(end.buffer).delete(0, tail_end + 1);
            Some(end.buffer)
        };
        self.buffer_mut(begin.buffer).next = next;
        if let Some(next) = next {
            self.buffer_mut(next).prev = Some(begin.buffer);
        }
        let drop_until = if end_consumed { last + 1 } else { last };
        self.order.drain(first + 1..drop_until);
        log::trace!(
            "joined buffers {}..={} ({} freed)",
            first,
            last,
            drop_until - first - 1
        );
    }

    /// Merges `id` with its neighbours while the result stays under capacity.
    fn merge_around(&mut self, id: BufferId) {
        let mut target = id;
        if let Some(prev) = self.buffer(id).prev {
            let prev_buffer = self.buffer(prev);
            if prev_buffer.len() + self.buffer(id).len() < prev_buffer.capacity() {
                self.merge_next_into(prev);
                target = prev;
            }
        }
        if let Some(next) = self.buffer(target).next {
            let buffer = self.buffer(target);
            if buffer.len() + self.buffer(next).len() < buffer.capacity() {
                self.merge_next_into(target);
            }
        }
    }

    /// Appends the buffer following `id` to it and frees the follower.
    fn merge_next_into(&mut self, id: BufferId) {
        let Some(from) = self.buffer(id).next else {
            return;
        };
        let Some(absorbed) = self.arena.remove(from) else {
            panic!("stale buffer handle {:?}", from);
        };
        let after = absorbed.next;
        let buffer = self.buffer_mut(id);
        let base = buffer.len();
        let index = buffer.index;
        buffer.absorb(absorbed);
        buffer.next = after;
        if let Some(next) = after {
            self.buffer_mut(next).prev = Some(id);
        }
        self.order.remove(index + 1);
        self.relocations.push(Relocation::Merge {
            from,
            into: id,
            base,
        });
        self.renumber(index);
        log::trace!("merged buffer {} into {}", index + 1, index);
    }

    /// Recomputes indices and start lines from `from` onwards.
    fn renumber(&mut self, from: usize) {
        let mut start_line = match from.checked_sub(1) {
            Some(prev) => {
                let buffer = &self.arena[self.order[prev]];
                buffer.start_line + buffer.line_count()
            }
            None => 0,
        };
        for index in from..self.order.len() {
            let buffer = &mut self.arena[self.order[index]];
            buffer.index = index;
            buffer.start_line = start_line;
            start_line += buffer.line_count();
        }
        self.line_count = start_line;
    }

    /// Returns the first buffer the highlighter has not parsed yet.
    pub(crate) fn first_unparsed(&self) -> Option<usize> {
        self.order.iter().position(|&id| !self.arena[id].parsed)
    }

    /// Checks the structural invariants of every buffer and of the links.
    pub fn verify(&self) -> Result<(), String> {
        let mut start_line = 0;
        for (index, &id) in self.order.iter().enumerate() {
            let buffer = self
                .arena
                .get(id)
                .ok_or_else(|| format!("buffer {} is not in the arena", index))?;
            buffer
                .verify()
                .map_err(|e| format!("buffer {}: {}", index, e))?;
            if buffer.index != index {
                return Err(format!("buffer {} has index {}", index, buffer.index));
            }
            if buffer.start_line != start_line {
                return Err(format!(
                    "buffer {} starts at line {} instead of {}",
                    index, buffer.start_line, start_line
                ));
            }
            let prev = index.checked_sub(1).map(|p| self.order[p]);
            let next = self.order.get(index + 1).copied();
            if buffer.prev != prev || buffer.next != next {
                return Err(format!("buffer {} has broken links", index));
            }
            start_line += buffer.line_count();
        }
        if self.arena.len() != self.order.len() {
            return Err(format!(
                "{} buffers allocated but {} in order",
                self.arena.len(),
                self.order.len()
            ));
        }
        if start_line != self.line_count {
            return Err(format!(
                "line count is {} but buffers hold {}",
                self.line_count, start_line
            ));
        }
        Ok(())
    }
}

/// Returns the length of the UTF-8 sequence introduced by `byte`.
pub(crate) fn utf8_len(byte: u8) -> usize {
    match byte {
        b if b < 0x80 => 1,
        b if b >> 5 == 0b110 => 2,
        b if b >> 4 == 0b1110 => 3,
        b if b >> 3 == 0b11110 => 4,
        _ => 1,
    }
}

fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_from(lines: &[&str], buffer_size: usize) -> BufferList {
        let buffers = lines
            .iter()
            .map(|chunk| Buffer::new(chunk.as_bytes(), buffer_size))
            .collect();
        BufferList::from_buffers(buffers, buffer_size)
    }

    #[test]
    fn test_empty_list() {
        let list = BufferList::new(64);
        assert_eq!(list.len(), 1);
        assert_eq!(list.line_count(), 1);
        assert_eq!(list.text(), b"");
        assert!(list.verify().is_ok());
    }

    #[test]
    fn test_positions_across_buffers() {
        let list = list_from(&["ab\ncd\n", "ef\n"], 64);
        assert_eq!(list.line_count(), 3);
        let pos = list.position_of(2, 1);
        assert_eq!(pos.buffer, list.at(1));
        assert_eq!(list.line_col(pos), (2, 1));
        assert_eq!(list.line(1), b"cd");
        // Columns clamp to the line length.
        assert_eq!(list.line_col(list.position_of(0, 10)), (0, 2));
        assert_eq!(list.text(), b"ab\ncd\nef");
    }

    #[test]
    fn test_advance_and_retreat() {
        let list = list_from(&["ab\n", "cd\n"], 64);
        let start = list.start();
        let pos = list.advance(start, 4);
        assert_eq!(pos, TextPosition::new(list.at(1), 1));
        assert_eq!(list.retreat(pos, 4), start);
        assert_eq!(list.retreat(pos, 2), TextPosition::new(list.at(0), 2));
        assert_eq!(list.advance(start, 100), list.end());
    }

    #[test]
    fn test_char_steps_utf8() {
        let list = list_from(&["aé\nb\n"], 64);
        let pos = list.next_char(list.start()).unwrap();
        assert_eq!(pos.offset, 1);
        let pos = list.next_char(pos).unwrap();
        assert_eq!(pos.offset, 3);
        assert_eq!(list.prev_char(pos).unwrap().offset, 1);
        assert_eq!(list.char_at(TextPosition::new(list.first(), 1)), Some('é'));
        assert_eq!(list.prev_char(list.start()), None);
        assert_eq!(list.next_char(list.end()), None);
    }

    #[test]
    fn test_insert_splits_full_buffer() {
        let mut list = list_from(&["aaaa\nbbbb\ncccc\n"], 17);
        let pos = list.position_of(2, 0);
        let after = list.insert(pos, b"xxxx");
        assert_eq!(list.len(), 2);
        assert_eq!(list.text(), b"aaaa\nbbbb\nxxxxcccc");
        assert_eq!(list.line_col(after), (2, 4));
        assert!(list.verify().is_ok());
    }

    #[test]
    fn test_insert_multiline_text() {
        let mut list = BufferList::new(16);
        let after = list.insert(list.start(), b"one\ntwo\nthree\nfour\nfive");
        assert_eq!(list.text(), b"one\ntwo\nthree\nfour\nfive");
        assert_eq!(list.line_count(), 5);
        assert_eq!(list.line_col(after), (4, 4));
        assert!(list.len() > 1);
        assert!(list.verify().is_ok());
    }

    #[test]
    fn test_delete_within_buffer() {
        let mut list = list_from(&["hello\nworld\n"], 64);
        let begin = list.position_of(0, 3);
        let end = list.position_of(1, 2);
        let pos = list.delete(begin, end);
        assert_eq!(list.text(), b"helrld");
        assert_eq!(list.line_col(pos), (0, 3));
        assert!(list.verify().is_ok());
    }

    #[test]
    fn test_delete_across_buffers_relocates() {
        let mut list = list_from(&["aaaaaa\nbbbbbb\n", "cccccc\n", "dddddd\neeeeee\n"], 16);
        let mut outside = list.position_of(4, 2);
        let mut inside = list.position_of(2, 3);
        let begin = list.position_of(0, 2);
        let end = list.position_of(3, 4);
        list.delete(begin, end);
        for relocation in list.take_relocations() {
            relocation.apply(&mut outside);
            relocation.apply(&mut inside);
        }
        assert_eq!(list.text(), b"aadd\neeeeee");
        assert_eq!(list.line_col(outside), (1, 2));
        assert_eq!(list.line_col(inside), (0, 2));
        assert!(list.verify().is_ok());
    }

    #[test]
    fn test_delete_merges_small_buffers() {
        let mut list = list_from(&["ab\ncd\n", "ef\n", "gh\n"], 16);
        let begin = list.position_of(1, 0);
        let end = list.position_of(1, 2);
        list.delete(begin, end);
        // Only the immediate neighbour is absorbed.
        assert_eq!(list.len(), 2);
        assert_eq!(list.text(), b"ab\n\nef\ngh");
        assert!(list.verify().is_ok());
    }

    #[test]
    fn test_delete_to_end_frees_last_buffer() {
        let mut list = list_from(&["aaaaaaaaaa\n", "bbbbbbbbbb\n"], 12);
        let begin = list.position_of(0, 5);
        let end = list.end();
        list.delete(begin, end);
        assert_eq!(list.len(), 1);
        assert_eq!(list.text(), b"aaaaa");
        assert!(list.verify().is_ok());
    }

    #[test]
    fn test_relocation_split() {
        let mut list = list_from(&["aaaa\nbbbb\ncccc\n"], 17);
        let mut pos = list.position_of(2, 2);
        list.insert(list.position_of(0, 0), b"zzzz");
        for relocation in list.take_relocations() {
            relocation.apply(&mut pos);
        }
        assert_eq!(list.line_col(pos), (2, 2));
        assert_eq!(list.byte_at(pos), b'c');
    }
}
