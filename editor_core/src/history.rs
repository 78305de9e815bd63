//! Undo/Redo history.
//!
//! Every edit is recorded as a [`Delta`]: a description of the operation plus
//! the data captured while applying it (removed text, cursor snapshots). The
//! document replays deltas forwards for redo and backwards for undo.

use crate::cursor::{CursorRange, Direction, Granularity};
use std::time::{Duration, Instant};

/// Text inserted by a [`ReplaceText`] delta.
#[derive(Debug, Clone, PartialEq)]
pub enum Insertion {
    /// The same text at every cursor.
    Uniform(Vec<u8>),
    /// One entry per cursor, in cursor order.
    PerCursor(Vec<Vec<u8>>),
}

impl Insertion {
    /// Returns the text inserted at cursor `index`.
    pub fn for_cursor(&self, index: usize) -> &[u8] {
        match self {
            Insertion::Uniform(text) => text,
            Insertion::PerCursor(texts) => &texts[index],
        }
    }

    /// Returns true if nothing is inserted anywhere.
    pub fn is_empty(&self) -> bool {
        match self {
            Insertion::Uniform(text) => text.is_empty(),
            Insertion::PerCursor(texts) => texts.iter().all(|t| t.is_empty()),
        }
    }
}

/// Replaces each cursor's selection with text.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceText {
    pub inserted: Insertion,
    /// Text each cursor's selection held before the edit.
    pub removed: Vec<Vec<u8>>,
    /// Cursors restored by undo.
    pub restore: Vec<CursorRange>,
    /// Selections that were replaced; redo starts from these.
    pub selections: Vec<CursorRange>,
    /// Per-cursor carets right after the edit, before normalization.
    pub after: Vec<CursorRange>,
}

impl ReplaceText {
    pub fn new(inserted: Insertion) -> Self {
        Self {
            inserted,
            removed: Vec::new(),
            restore: Vec::new(),
            selections: Vec::new(),
            after: Vec::new(),
        }
    }

    /// Returns true if this is a single character typed at a single caret.
    fn is_typing(&self) -> bool {
        let typed = match &self.inserted {
            Insertion::Uniform(text) => text.len() == 1 && text[0] != b'\n',
            Insertion::PerCursor(_) => false,
        };
        typed && self.removed.iter().all(|r| r.is_empty())
    }
}

/// An edit addressed by (line, column) rather than by cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionEdit {
    pub line: usize,
    pub column: usize,
    pub removed: Vec<u8>,
    pub inserted: Vec<u8>,
}

/// Edits at explicit positions, at most one per line.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionEdits {
    /// Sorted by descending line.
    pub edits: Vec<PositionEdit>,
    pub before: Vec<CursorRange>,
    pub after: Vec<CursorRange>,
}

impl PositionEdits {
    /// Creates the edit list, sorting it for application.
    pub fn new(mut edits: Vec<PositionEdit>) -> Self {
        edits.sort_by(|a, b| b.line.cmp(&a.line));
        debug_assert!(
            edits.windows(2).all(|pair| pair[0].line != pair[1].line),
            "at most one position edit per line"
        );
        Self {
            edits,
            before: Vec::new(),
            after: Vec::new(),
        }
    }
}

/// A recorded edit.
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    ReplaceText(ReplaceText),
    /// Deletes selections, first growing empty ones by `granularity`.
    RemoveSelection {
        direction: Direction,
        granularity: Granularity,
        before: Vec<CursorRange>,
        nested: Box<Delta>,
    },
    /// Opens an empty line before (`Left`) or after (`Right`) each caret line.
    InsertLineBefore {
        direction: Direction,
        before: Vec<CursorRange>,
        nested: Box<Delta>,
    },
    AddTextAtPositions(PositionEdits),
    RemoveTextAtPositions(PositionEdits),
    ReplaceTextAtPositions(PositionEdits),
    /// Deltas applied in order and undone in reverse.
    Composite(Vec<Delta>),
}

impl Delta {
    /// Wraps a plain text replacement.
    pub fn replace(inserted: Insertion) -> Self {
        Delta::ReplaceText(ReplaceText::new(inserted))
    }

    fn is_typing(&self) -> bool {
        matches!(self, Delta::ReplaceText(replace) if replace.is_typing())
    }
}

struct Entry {
    delta: Delta,
    typing: bool,
    at: Instant,
}

/// Manages undo/redo history.
pub struct History {
    /// Stack of deltas that can be undone.
    undo_stack: Vec<Entry>,
    /// Stack of deltas that can be redone.
    redo_stack: Vec<Delta>,
    /// Maximum number of undo levels (0 = unlimited).
    max_size: usize,
    /// Consecutive typing inside this window is undone as one step.
    coalesce_window: Option<Duration>,
    /// Undo depth matching the last save, if still reachable.
    saved_undo_count: Option<usize>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("undo", &self.undo_stack.len())
            .field("redo", &self.redo_stack.len())
            .field("saved_undo_count", &self.saved_undo_count)
            .finish()
    }
}

impl History {
    /// Creates a new history keeping at most `max_size` entries (0 = unlimited).
    pub fn new(max_size: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_size,
            coalesce_window: None,
            saved_undo_count: Some(0),
        }
    }

    /// Sets the typing coalesce window; `None` disables coalescing.
    pub fn set_coalesce_window(&mut self, window: Option<Duration>) {
        self.coalesce_window = window;
    }

    /// Records a freshly applied delta and clears the redo stack.
    pub fn push(&mut self, delta: Delta) {
        self.redo_stack.clear();
        if self.saved_undo_count.map_or(false, |saved| saved > self.undo_stack.len()) {
            self.saved_undo_count = None;
        }

        let typing = delta.is_typing();
        let now = Instant::now();
        if typing && self.saved_undo_count != Some(self.undo_stack.len()) {
            if let (Some(window), Some(last)) = (self.coalesce_window, self.undo_stack.last_mut()) {
                if last.typing && now.duration_since(last.at) <= window {
                    let previous = std::mem::replace(&mut last.delta, Delta::Composite(Vec::new()));
                    last.delta = match previous {
                        Delta::Composite(mut parts) => {
                            parts.push(delta);
                            Delta::Composite(parts)
                        }
                        single => Delta::Composite(vec![single, delta]),
                    };
                    last.at = now;
                    return;
                }
            }
        }

        self.undo_stack.push(Entry {
            delta,
            typing,
            at: now,
        });
        if self.max_size > 0 && self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
            self.saved_undo_count = match self.saved_undo_count {
                Some(0) | None => None,
                Some(saved) => Some(saved - 1),
            };
        }
    }

    /// Returns true if undo is available.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Returns true if redo is available.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Pops the most recent delta for undo.
    pub fn pop_undo(&mut self) -> Option<Delta> {
        self.undo_stack.pop().map(|entry| entry.delta)
    }

    /// Stores an undone delta so it can be redone.
    pub fn push_redo(&mut self, delta: Delta) {
        self.redo_stack.push(delta);
    }

    /// Pops the most recently undone delta.
    pub fn pop_redo(&mut self) -> Option<Delta> {
        self.redo_stack.pop()
    }

    /// Returns a redone delta to the undo stack, keeping the redo stack.
    pub fn push_redone(&mut self, delta: Delta) {
        self.undo_stack.push(Entry {
            delta,
            typing: false,
            at: Instant::now(),
        });
    }

    /// Returns the number of undoable entries.
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Returns the number of redoable entries.
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Records the current state as saved.
    pub fn mark_saved(&mut self) {
        self.saved_undo_count = Some(self.undo_stack.len());
    }

    /// Returns true if the document differs from the last save.
    pub fn has_unsaved_changes(&self) -> bool {
        self.saved_undo_count != Some(self.undo_stack.len())
    }

    /// Drops all history.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.saved_undo_count = Some(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(c: u8) -> Delta {
        Delta::replace(Insertion::Uniform(vec![c]))
    }

    #[test]
    fn test_push_clears_redo() {
        let mut history = History::new(0);
        history.push(typed(b'a'));
        let delta = history.pop_undo().unwrap();
        history.push_redo(delta);
        assert!(history.can_redo());
        history.push(typed(b'b'));
        assert!(!history.can_redo());
        assert_eq!(history.undo_count(), 1);
    }

    #[test]
    fn test_max_size() {
        let mut history = History::new(2);
        for c in b"abc" {
            history.push(typed(*c));
        }
        assert_eq!(history.undo_count(), 2);
        assert!(history.has_unsaved_changes());
    }

    #[test]
    fn test_saved_state_tracking() {
        let mut history = History::new(0);
        assert!(!history.has_unsaved_changes());
        history.push(typed(b'a'));
        assert!(history.has_unsaved_changes());
        history.mark_saved();
        assert!(!history.has_unsaved_changes());

        let delta = history.pop_undo().unwrap();
        history.push_redo(delta);
        assert!(history.has_unsaved_changes());
        let delta = history.pop_redo().unwrap();
        history.push_redone(delta);
        assert!(!history.has_unsaved_changes());
    }

    #[test]
    fn test_saved_state_lost_after_divergent_edit() {
        let mut history = History::new(0);
        history.push(typed(b'a'));
        history.push(typed(b'b'));
        history.mark_saved();
        history.pop_undo();
        history.pop_undo();
        history.push(typed(b'c'));
        history.push(typed(b'd'));
        assert!(history.has_unsaved_changes());
    }

    #[test]
    fn test_typing_coalesces_within_window() {
        let mut history = History::new(0);
        history.set_coalesce_window(Some(Duration::from_secs(60)));
        history.push(typed(b'a'));
        history.push(typed(b'b'));
        history.push(typed(b'c'));
        history.push(Delta::replace(Insertion::Uniform(b"\n".to_vec())));
        assert_eq!(history.undo_count(), 2);
        history.pop_undo();
        match history.pop_undo() {
            Some(Delta::Composite(parts)) => assert_eq!(parts.len(), 3),
            other => panic!("expected a composite, got {:?}", other),
        }
    }

    #[test]
    fn test_no_coalescing_by_default() {
        let mut history = History::default();
        history.push(typed(b'a'));
        history.push(typed(b'b'));
        assert_eq!(history.undo_count(), 2);
    }
}
