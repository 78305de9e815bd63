//! The shared document.
//!
//! A [`Document`] owns the text buffers, the cursors of every attached view,
//! the undo history and the cached line metrics. It is a cheap handle around
//! shared state: clones refer to the same document, and background tasks
//! (loading, highlighting) hold clones of their own.
//!
//! All state sits behind one reader/writer lock. Edits take the write lock
//! for the whole operation; readers can take a consistent snapshot with
//! [`Document::read`]. The background highlighter holds an upgradable read
//! lock while parsing a buffer and upgrades only to store the result.

use crate::cursor::{
    Cursor, CursorRange, Direction, Granularity, MultiCursor, Position, TextRange,
};
use crate::error::LoadError;
use crate::history::{
    Delta, History, Insertion, PositionEdit, PositionEdits, ReplaceText,
};
use crate::loader::{self, LineEnding};
use crate::measure::{MonospaceMeasure, TextMeasure};
use crate::options::{DocumentOptions, Indentation};
use crate::perf::DocumentPerf;
use crate::scheduler::Scheduler;
use crate::search::{self, Matcher};
use crate::syntax::{Highlighter, LineTokens};
use crate::text::{BufferId, BufferList, TextPosition};
use parking_lot::{Condvar, Mutex, RwLock, RwLockReadGuard, RwLockUpgradableReadGuard};
use slotmap::{new_key_type, SlotMap};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

new_key_type! {
    /// Handle to a view attached to a [`Document`].
    pub struct ViewId;
}

/// Per-view state stored in the document.
#[derive(Debug)]
struct ViewState {
    cursors: MultiCursor,
    /// Cursors to restore once loading finishes.
    pending: Option<Vec<CursorRange>>,
}

/// Everything guarded by the document lock.
pub struct DocumentState {
    text: BufferList,
    views: SlotMap<ViewId, ViewState>,
    history: History,
    options: DocumentOptions,
    measure: Arc<dyn TextMeasure>,
    highlighter: Option<Arc<dyn Highlighter>>,
    line_ending: LineEnding,
    total_width: f64,
    longest_line: Option<(BufferId, usize)>,
    max_line_width: f32,
    version: u64,
}

impl std::fmt::Debug for DocumentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentState")
            .field("lines", &self.text.line_count())
            .field("buffers", &self.text.len())
            .field("views", &self.views.len())
            .field("history", &self.history)
            .field("version", &self.version)
            .finish()
    }
}

impl DocumentState {
    fn new(
        text: BufferList,
        options: DocumentOptions,
        measure: Arc<dyn TextMeasure>,
        highlighter: Option<Arc<dyn Highlighter>>,
    ) -> Self {
        let mut history = History::new(options.max_undo);
        if options.coalesce_window_ms > 0 {
            history.set_coalesce_window(Some(Duration::from_millis(options.coalesce_window_ms)));
        }
        let mut state = Self {
            text,
            views: SlotMap::with_key(),
            history,
            options,
            measure,
            highlighter,
            line_ending: LineEnding::Unix,
            total_width: 0.0,
            longest_line: None,
            max_line_width: 0.0,
            version: 0,
        };
        state.refresh_widths();
        state
    }

    /// Returns the buffers holding the text.
    pub fn buffers(&self) -> &BufferList {
        &self.text
    }

    /// Returns the number of lines.
    pub fn line_count(&self) -> usize {
        self.text.line_count()
    }

    /// Returns line `line` without its newline.
    pub fn line(&self, line: usize) -> &[u8] {
        self.text.line(line)
    }

    /// Returns the syntax tokens of `line`, if it has been highlighted.
    pub fn line_tokens(&self, line: usize) -> Option<&LineTokens> {
        let buffer = self.text.buffer(self.text.buffer_for_line(line));
        buffer.tokens(line - buffer.start_line())
    }

    /// Returns the measured width of `line`.
    pub fn line_width(&self, line: usize) -> Option<f32> {
        let buffer = self.text.buffer(self.text.buffer_for_line(line));
        buffer.line_width(line - buffer.start_line())
    }

    /// Returns the sum of all line widths.
    pub fn total_width(&self) -> f64 {
        self.total_width
    }

    /// Returns the width of the widest line.
    pub fn max_line_width(&self) -> f32 {
        self.max_line_width
    }

    /// Returns the index of the widest line.
    pub fn longest_line(&self) -> Option<usize> {
        self.longest_line.map(|(id, local)| self.text.buffer(id).start_line() + local)
    }

    /// Returns a counter bumped by every change to the text.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn options(&self) -> &DocumentOptions {
        &self.options
    }

    /// Returns the cursors of `view` as line/column ranges.
    pub fn cursors(&self, view: ViewId) -> Vec<CursorRange> {
        self.snapshot(view)
    }

    /// Returns the index of the active cursor of `view`.
    pub fn active_cursor(&self, view: ViewId) -> usize {
        self.view(view).cursors.primary_index()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.history.has_unsaved_changes()
    }

    fn view(&self, view: ViewId) -> &ViewState {
        match self.views.get(view) {
            Some(state) => state,
            None => panic!("view {:?} is not attached to this document", view),
        }
    }

    fn cursors_mut(&mut self, view: ViewId) -> &mut MultiCursor {
        match self.views.get_mut(view) {
            Some(state) => &mut state.cursors,
            None => panic!("view {:?} is not attached to this document", view),
        }
    }

    fn snapshot(&self, view: ViewId) -> Vec<CursorRange> {
        self.view(view).cursors.ranges(&self.text)
    }

    fn restore_cursors(&mut self, view: ViewId, ranges: &[CursorRange]) {
        if ranges.is_empty() {
            return;
        }
        let text = &self.text;
        match self.views.get_mut(view) {
            Some(state) => state.cursors.restore(text, ranges),
            None => panic!("view {:?} is not attached to this document", view),
        }
    }

    fn normalize(&mut self, view: ViewId) {
        let text = &self.text;
        match self.views.get_mut(view) {
            Some(state) => state.cursors.normalize(text),
            None => panic!("view {:?} is not attached to this document", view),
        }
    }

    /// Applies the relocations of the last buffer primitive to every cursor.
    fn flush_relocations(&mut self) {
        let relocations = self.text.take_relocations();
        if relocations.is_empty() {
            return;
        }
        for (_, view) in self.views.iter_mut() {
            for relocation in &relocations {
                view.cursors.relocate(relocation);
            }
        }
    }

    /// Replaces the text from `begin` to `end` and returns the position after
    /// the new text.
    ///
    /// Bytes are overwritten in place while neither side has reached a
    /// newline; the rest of the selection is deleted and the rest of the
    /// replacement inserted.
    fn replace_range(&mut self, begin: TextPosition, end: TextPosition, text: &[u8]) -> TextPosition {
        let buffer = self.text.buffer(begin.buffer);
        let limit = if begin.buffer == end.buffer {
            end.offset
        } else {
            buffer.len() - 1
        };
        let bytes = buffer.bytes();
        let mut overwrite = 0;
        while overwrite < text.len()
            && begin.offset + overwrite < limit
            && text[overwrite] != b'\n'
            && bytes[begin.offset + overwrite] != b'\n'
        {
            overwrite += 1;
        }
        if overwrite > 0 {
            self.text
                .buffer_mut(begin.buffer)
                .overwrite(begin.offset, &text[..overwrite]);
        }

        let mut pos = TextPosition::new(begin.buffer, begin.offset + overwrite);
        if pos != end {
            pos = self.text.delete(pos, end);
            self.flush_relocations();
        }
        if overwrite < text.len() {
            pos = self.text.insert(pos, &text[overwrite..]);
            self.flush_relocations();
        }
        pos
    }

    /// Applies `delta` to `view`. With `redo`, cursor snapshots captured by a
    /// previous application are restored instead of captured.
    ///
    /// Returns false if the delta had nothing to do.
    fn perform(&mut self, view: ViewId, delta: &mut Delta, redo: bool) -> bool {
        match delta {
            Delta::ReplaceText(replace) => {
                self.perform_replace(view, replace, redo);
                true
            }
            Delta::RemoveSelection {
                direction,
                granularity,
                before,
                nested,
            } => {
                if !redo {
                    *before = self.snapshot(view);
                    let text = &self.text;
                    let cursors = match self.views.get_mut(view) {
                        Some(state) => &mut state.cursors,
                        None => panic!("view {:?} is not attached to this document", view),
                    };
                    if cursors.iter().all(|c| !c.has_selection()) {
                        for cursor in cursors.iter_mut() {
                            cursor.extend_for_deletion(text, *direction, *granularity);
                        }
                    }
                    if cursors.iter().all(|c| !c.has_selection()) {
                        return false;
                    }
                    cursors.normalize(text);
                    **nested = Delta::replace(Insertion::Uniform(Vec::new()));
                }
                self.perform(view, nested, redo)
            }
            Delta::InsertLineBefore {
                direction,
                before,
                nested,
            } => {
                let direction = *direction;
                if !redo {
                    *before = self.snapshot(view);
                    let text = &self.text;
                    if let Some(state) = self.views.get_mut(view) {
                        for cursor in state.cursors.iter_mut() {
                            match direction {
                                Direction::Left => cursor.move_to_line_start(text, false),
                                Direction::Right => cursor.move_to_line_end(text, false),
                            }
                        }
                        state.cursors.normalize(text);
                    }
                    **nested = Delta::replace(Insertion::Uniform(b"\n".to_vec()));
                }
                self.perform(view, nested, redo);
                if direction == Direction::Left {
                    let text = &self.text;
                    if let Some(state) = self.views.get_mut(view) {
                        for cursor in state.cursors.iter_mut() {
                            cursor.offset_character(text, Direction::Left, false);
                        }
                        state.cursors.normalize(text);
                    }
                }
                true
            }
            Delta::AddTextAtPositions(edits)
            | Delta::RemoveTextAtPositions(edits)
            | Delta::ReplaceTextAtPositions(edits) => {
                self.perform_positions(view, edits, redo);
                true
            }
            Delta::Composite(parts) => {
                let mut applied = false;
                for part in parts.iter_mut() {
                    applied |= self.perform(view, part, redo);
                }
                applied
            }
        }
    }

    fn perform_replace(&mut self, view: ViewId, replace: &mut ReplaceText, redo: bool) {
        if redo {
            self.restore_cursors(view, &replace.selections);
        } else {
            replace.selections = self.snapshot(view);
            if replace.restore.is_empty() {
                replace.restore = replace.selections.clone();
            }
            replace.removed.clear();
        }
        let count = self.view(view).cursors.len();
        if let Insertion::PerCursor(texts) = &replace.inserted {
            assert_eq!(
                texts.len(),
                count,
                "per-cursor insertion does not match the cursor count"
            );
        }
        for i in 0..count {
            let cursor = self.view(view).cursors.get(i);
            let begin = cursor.begin(&self.text);
            let end = cursor.end(&self.text);
            if !redo {
                replace.removed.push(self.text.read_range(begin, end));
            }
            let pos = self.replace_range(begin, end, replace.inserted.for_cursor(i));
            self.cursors_mut(view).set(i, Cursor::new(pos));
        }
        replace.after = self.snapshot(view);
        self.normalize(view);
    }

    fn perform_positions(&mut self, view: ViewId, edits: &mut PositionEdits, redo: bool) {
        if !redo {
            edits.before = self.snapshot(view);
        }
        for edit in &edits.edits {
            let begin = self.text.position_of(edit.line, edit.column);
            let end = self.text.advance(begin, edit.removed.len());
            self.replace_range(begin, end, &edit.inserted);
        }
        if redo {
            self.restore_cursors(view, &edits.after);
        }
        self.normalize(view);
        edits.after = self.snapshot(view);
    }

    /// Reverts `delta` and restores the cursors it recorded.
    fn revert(&mut self, view: ViewId, delta: &Delta) {
        match delta {
            Delta::ReplaceText(replace) => {
                self.restore_cursors(view, &replace.after);
                for i in 0..replace.after.len() {
                    let caret = self.view(view).cursors.get(i).caret();
                    let begin = self.text.retreat(caret, replace.inserted.for_cursor(i).len());
                    let pos = self.replace_range(begin, caret, &replace.removed[i]);
                    self.cursors_mut(view).set(i, Cursor::new(pos));
                }
                self.restore_cursors(view, &replace.restore);
            }
            Delta::RemoveSelection { before, nested, .. }
            | Delta::InsertLineBefore { before, nested, .. } => {
                self.revert(view, nested);
                self.restore_cursors(view, before);
            }
            Delta::AddTextAtPositions(edits)
            | Delta::RemoveTextAtPositions(edits)
            | Delta::ReplaceTextAtPositions(edits) => {
                for edit in &edits.edits {
                    let begin = self.text.position_of(edit.line, edit.column);
                    let end = self.text.advance(begin, edit.inserted.len());
                    self.replace_range(begin, end, &edit.removed);
                }
                self.restore_cursors(view, &edits.before);
            }
            Delta::Composite(parts) => {
                for part in parts.iter().rev() {
                    self.revert(view, part);
                }
            }
        }
        self.normalize(view);
    }

    /// Re-measures changed buffers and recomputes the running totals.
    fn refresh_widths(&mut self) {
        let measure = Arc::clone(&self.measure);
        let mut running = 0.0f64;
        let mut widest: Option<(BufferId, usize, f32)> = None;
        for index in 0..self.text.len() {
            let id = self.text.at(index);
            let buffer = self.text.buffer_mut(id);
            if !buffer.widths_valid() {
                buffer.measure_lines(measure.as_ref());
            }
            buffer.cumulative_width = running;
            running += buffer.width();
            let (line, width) = buffer.widest_line();
            if widest.map_or(true, |(_, _, best)| width > best) {
                widest = Some((id, line, width));
            }
        }
        self.total_width = running;
        self.longest_line = widest.map(|(id, line, _)| (id, line));
        self.max_line_width = widest.map_or(0.0, |(_, _, width)| width);
    }

    /// Normalizes every view and refreshes the caches. Relocations can leave
    /// other views with coinciding cursors.
    fn after_edit(&mut self) {
        let text = &self.text;
        for (_, view) in self.views.iter_mut() {
            view.cursors.normalize(text);
        }
        self.refresh_widths();
        self.version += 1;
    }

    /// Returns every line touched by a cursor of `view`. A selection ending
    /// at column 0 does not include that last line.
    fn cursor_lines(&self, view: ViewId) -> Vec<usize> {
        let mut lines = BTreeSet::new();
        for cursor in self.view(view).cursors.iter() {
            let (first, last) = self.line_span(cursor);
            lines.extend(first..=last);
        }
        lines.into_iter().collect()
    }

    fn line_span(&self, cursor: &Cursor) -> (usize, usize) {
        let (first, _) = self.text.line_col(cursor.begin(&self.text));
        let (last, column) = self.text.line_col(cursor.end(&self.text));
        if last > first && column == 0 {
            (first, last - 1)
        } else {
            (first, last)
        }
    }

    /// Returns the selected text, or whole cursor lines if nothing is selected.
    fn copy_selection(&self, view: ViewId) -> Vec<u8> {
        let cursors = &self.view(view).cursors;
        let mut out = Vec::new();
        if cursors.iter().all(|c| !c.has_selection()) {
            for line in self.cursor_lines(view) {
                out.extend_from_slice(self.text.line(line));
                out.push(b'\n');
            }
            return out;
        }
        for (i, cursor) in cursors.iter().filter(|c| c.has_selection()).enumerate() {
            if i > 0 {
                out.push(b'\n');
            }
            out.extend(self.text.read_range(cursor.begin(&self.text), cursor.end(&self.text)));
        }
        out
    }

    /// Selects the whole lines under each cursor, including one line break.
    fn select_whole_lines(&mut self, view: ViewId) {
        let line_count = self.text.line_count();
        let ranges: Vec<CursorRange> = self
            .view(view)
            .cursors
            .iter()
            .map(|cursor| {
                let (first, last) = self.line_span(cursor);
                let last_len = self.text.line(last).len();
                if last + 1 < line_count {
                    CursorRange::new(first, 0, last + 1, 0)
                } else if first > 0 {
                    CursorRange::new(first - 1, self.text.line(first - 1).len(), last, last_len)
                } else {
                    CursorRange::new(0, 0, last, last_len)
                }
            })
            .collect();
        self.restore_cursors(view, &ranges);
        self.normalize(view);
    }

    fn delete_lines_delta(&mut self, view: ViewId) -> Option<Delta> {
        let restore = self.snapshot(view);
        self.select_whole_lines(view);
        if self.view(view).cursors.iter().all(|c| !c.has_selection()) {
            self.restore_cursors(view, &restore);
            return None;
        }
        let mut replace = ReplaceText::new(Insertion::Uniform(Vec::new()));
        replace.restore = restore;
        Some(Delta::ReplaceText(replace))
    }

    fn indent_delta(&self, view: ViewId, direction: Direction) -> Option<Delta> {
        let unit = self.options.indent_unit();
        let tab_width = self.options.tab_width.max(1);
        let edits: Vec<PositionEdit> = self
            .cursor_lines(view)
            .into_iter()
            .filter_map(|line| {
                let bytes = self.text.line(line);
                match direction {
                    Direction::Right => Some(PositionEdit {
                        line,
                        column: 0,
                        removed: Vec::new(),
                        inserted: unit.clone(),
                    }),
                    Direction::Left => {
                        let n = if bytes.first() == Some(&b'\t') {
                            1
                        } else {
                            bytes.iter().take(tab_width).take_while(|&&b| b == b' ').count()
                        };
                        (n > 0).then(|| PositionEdit {
                            line,
                            column: 0,
                            removed: bytes[..n].to_vec(),
                            inserted: Vec::new(),
                        })
                    }
                }
            })
            .collect();
        if edits.is_empty() {
            return None;
        }
        let edits = PositionEdits::new(edits);
        Some(match direction {
            Direction::Right => Delta::AddTextAtPositions(edits),
            Direction::Left => Delta::RemoveTextAtPositions(edits),
        })
    }

    fn trailing_whitespace_delta(&self) -> Option<Delta> {
        let mut edits = Vec::new();
        for (_, buffer) in self.text.iter() {
            for local in 0..buffer.line_count() {
                let bytes = buffer.line(local);
                let kept = bytes
                    .iter()
                    .rposition(|&b| b != b' ' && b != b'\t')
                    .map_or(0, |i| i + 1);
                if kept < bytes.len() {
                    edits.push(PositionEdit {
                        line: buffer.start_line() + local,
                        column: kept,
                        removed: bytes[kept..].to_vec(),
                        inserted: Vec::new(),
                    });
                }
            }
        }
        (!edits.is_empty()).then(|| Delta::RemoveTextAtPositions(PositionEdits::new(edits)))
    }

    fn convert_indentation_delta(&self, indentation: Indentation) -> Option<Delta> {
        let tab_width = self.options.tab_width.max(1);
        let mut edits = Vec::new();
        for (_, buffer) in self.text.iter() {
            for local in 0..buffer.line_count() {
                let bytes = buffer.line(local);
                let leading = bytes
                    .iter()
                    .position(|&b| b != b' ' && b != b'\t')
                    .unwrap_or(bytes.len());
                let columns = bytes[..leading].iter().fold(0, |col, &b| match b {
                    b'\t' => (col / tab_width + 1) * tab_width,
                    _ => col + 1,
                });
                let replacement = match indentation {
                    Indentation::Tabs => {
                        let mut out = vec![b'\t'; columns / tab_width];
                        out.extend(std::iter::repeat(b' ').take(columns % tab_width));
                        out
                    }
                    Indentation::Spaces => vec![b' '; columns],
                };
                if replacement != bytes[..leading] {
                    edits.push(PositionEdit {
                        line: buffer.start_line() + local,
                        column: 0,
                        removed: bytes[..leading].to_vec(),
                        inserted: replacement,
                    });
                }
            }
        }
        (!edits.is_empty()).then(|| Delta::ReplaceTextAtPositions(PositionEdits::new(edits)))
    }

    fn regex_replace_delta(
        &self,
        view: ViewId,
        matcher: &dyn Matcher,
        template: &str,
    ) -> Option<Delta> {
        let mut changed = false;
        let texts = self
            .view(view)
            .cursors
            .iter()
            .map(|cursor| {
                let selected = self
                    .text
                    .read_range(cursor.begin(&self.text), cursor.end(&self.text));
                match matcher.expand(&selected, template) {
                    Some(expanded) if expanded != selected => {
                        changed = true;
                        expanded
                    }
                    _ => selected,
                }
            })
            .collect();
        changed.then(|| Delta::replace(Insertion::PerCursor(texts)))
    }

    /// Installs freshly loaded buffers and places every view's cursors.
    fn install(&mut self, text: BufferList, line_ending: LineEnding) {
        self.text = text;
        self.line_ending = line_ending;
        let start = self.text.start();
        let text = &self.text;
        for (_, view) in self.views.iter_mut() {
            match view.pending.take() {
                Some(ranges) if !ranges.is_empty() => view.cursors.restore(text, &ranges),
                _ => view.cursors.reset(vec![Cursor::new(start)]),
            }
            view.cursors.normalize(text);
        }
        self.history.clear();
        self.refresh_widths();
        self.version += 1;
    }

    /// Checks the buffer structure and every view's cursors.
    pub fn verify(&self) -> Result<(), String> {
        self.text.verify()?;
        for (id, view) in self.views.iter() {
            for cursor in view.cursors.iter() {
                for pos in [cursor.anchor(), cursor.caret()] {
                    let buffer = self
                        .text
                        .get(pos.buffer)
                        .ok_or_else(|| format!("view {:?} has a cursor in a freed buffer", id))?;
                    if pos.offset >= buffer.len() {
                        return Err(format!("view {:?} has a cursor past its buffer", id));
                    }
                }
            }
            if !view.cursors.is_sorted(&self.text) {
                return Err(format!("view {:?} has unsorted cursors", id));
            }
            let overlapping = view
                .cursors
                .iter()
                .zip(view.cursors.iter().skip(1))
                .any(|(a, b)| {
                    self.text.compare(a.end(&self.text), b.begin(&self.text))
                        != std::cmp::Ordering::Less
                });
            if overlapping {
                return Err(format!("view {:?} has overlapping cursors", id));
            }
        }
        Ok(())
    }
}

struct Shared {
    state: RwLock<DocumentState>,
    loaded: AtomicBool,
    load_progress: AtomicUsize,
    load_total: AtomicUsize,
    load_done: Mutex<bool>,
    load_signal: Condvar,
    highlight_generation: AtomicU64,
    scheduler: Option<Scheduler>,
    perf: Mutex<DocumentPerf>,
}

/// Builds a [`Document`].
pub struct DocumentBuilder {
    options: DocumentOptions,
    measure: Arc<dyn TextMeasure>,
    scheduler: Option<Scheduler>,
    highlighter: Option<Arc<dyn Highlighter>>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            options: DocumentOptions::default(),
            measure: Arc::new(MonospaceMeasure::default()),
            scheduler: None,
            highlighter: None,
        }
    }

    pub fn options(mut self, options: DocumentOptions) -> Self {
        self.options = options;
        self
    }

    pub fn measure(mut self, measure: Arc<dyn TextMeasure>) -> Self {
        self.measure = measure;
        self
    }

    /// Runs loading and highlighting on `scheduler` instead of inline.
    pub fn scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn highlighter(mut self, highlighter: Arc<dyn Highlighter>) -> Self {
        self.highlighter = Some(highlighter);
        self
    }

    /// Loads `bytes` on the calling thread.
    pub fn build(self, bytes: &[u8]) -> Document {
        let document = self.unloaded();
        document.finish_load(bytes);
        document
    }

    /// Loads `bytes` in the background when a scheduler is set. The document
    /// must not be edited until [`Document::is_loaded`] returns true.
    pub fn load(self, bytes: Vec<u8>) -> Document {
        let Some(scheduler) = self.scheduler.clone() else {
            return self.build(&bytes);
        };
        let document = self.unloaded();
        let task = document.clone();
        scheduler.spawn(move || task.finish_load(&bytes));
        document
    }

    /// Reads `path` and loads it like [`DocumentBuilder::load`].
    pub fn open(self, path: impl AsRef<Path>) -> Result<Document, LoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Opening {} ({} bytes)", path.display(), bytes.len());
        Ok(self.load(bytes))
    }

    fn unloaded(self) -> Document {
        let buffer_size = self.options.effective_buffer_size();
        let state = DocumentState::new(
            BufferList::new(buffer_size),
            self.options,
            self.measure,
            self.highlighter,
        );
        Document {
            shared: Arc::new(Shared {
                state: RwLock::new(state),
                loaded: AtomicBool::new(false),
                load_progress: AtomicUsize::new(0),
                load_total: AtomicUsize::new(0),
                load_done: Mutex::new(false),
                load_signal: Condvar::new(),
                highlight_generation: AtomicU64::new(0),
                scheduler: self.scheduler,
                perf: Mutex::new(DocumentPerf::default()),
            }),
        }
    }
}

/// Handle to a shared text document.
#[derive(Clone)]
pub struct Document {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("loaded", &self.is_loaded())
            .field("state", &*self.shared.state.read())
            .finish()
    }
}

impl Document {
    /// Creates an empty document.
    pub fn new(options: DocumentOptions) -> Self {
        DocumentBuilder::new().options(options).build(b"")
    }

    /// Creates a document holding `text`.
    pub fn from_text(text: &str, options: DocumentOptions) -> Self {
        DocumentBuilder::new().options(options).build(text.as_bytes())
    }

    /// Returns a builder for documents with a custom measure, scheduler or
    /// highlighter.
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::new()
    }

    fn finish_load(&self, bytes: &[u8]) {
        let started = Instant::now();
        let shared = &self.shared;
        shared.load_total.store(bytes.len(), Ordering::Relaxed);
        let buffer_size = shared.state.read().options.effective_buffer_size();
        let loaded = loader::split_into_buffers(bytes, buffer_size, |n| {
            shared.load_progress.store(n, Ordering::Relaxed);
        });
        let text = BufferList::from_buffers(loaded.buffers, buffer_size);
        let (lines, buffers) = (text.line_count(), text.len());
        {
            let mut state = shared.state.write();
            state.install(text, loaded.line_ending);
            // `set_cursors` reads the flag under this lock.
            shared.loaded.store(true, Ordering::Release);
        }

        let elapsed = started.elapsed();
        shared.perf.lock().load = Some(elapsed);
        {
            let mut done = shared.load_done.lock();
            *done = true;
            shared.load_signal.notify_all();
        }
        log::info!(
            "Loaded {} lines into {} buffers in {:.1}ms",
            lines,
            buffers,
            elapsed.as_secs_f64() * 1000.0
        );
        self.schedule_highlighting();
    }

    /// Returns true once the text has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.shared.loaded.load(Ordering::Acquire)
    }

    /// Returns how much of the input has been split into buffers, in percent.
    pub fn load_percentage(&self) -> f32 {
        if self.is_loaded() {
            return 100.0;
        }
        let total = self.shared.load_total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.shared.load_progress.load(Ordering::Relaxed) as f32 / total as f32 * 100.0
    }

    /// Blocks until loading finishes or `timeout` passes. Returns true if loaded.
    pub fn wait_until_loaded(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut done = self.shared.load_done.lock();
        while !*done {
            if self.shared.load_signal.wait_until(&mut done, deadline).timed_out() {
                return *done;
            }
        }
        true
    }

    /// Takes the read lock for a consistent view of the document.
    pub fn read(&self) -> RwLockReadGuard<'_, DocumentState> {
        self.shared.state.read()
    }

    /// Attaches a new view with a single cursor at the start.
    pub(crate) fn attach_view(&self) -> ViewId {
        let mut state = self.shared.state.write();
        let cursors = MultiCursor::new(state.text.start());
        state.views.insert(ViewState {
            cursors,
            pending: None,
        })
    }

    pub(crate) fn detach_view(&self, view: ViewId) {
        self.shared.state.write().views.remove(view);
    }

    fn assert_loaded(&self) {
        assert!(self.is_loaded(), "document edited before it finished loading");
    }

    /// Runs an edit: builds the delta, applies it, records it and refreshes
    /// the caches. Returns false if nothing changed.
    fn edit(
        &self,
        view: ViewId,
        build: impl FnOnce(&mut DocumentState, ViewId) -> Option<Delta>,
    ) -> bool {
        self.assert_loaded();
        let started = Instant::now();
        self.cancel_highlighting();
        let applied = {
            let mut guard = self.shared.state.write();
            let state = &mut *guard;
            debug_assert!(
                state.view(view).cursors.is_sorted(&state.text),
                "cursors must be sorted before an edit"
            );
            match build(state, view) {
                Some(mut delta) => {
                    let changed = state.perform(view, &mut delta, false);
                    if changed {
                        state.history.push(delta);
                        state.after_edit();
                    }
                    changed
                }
                None => false,
            }
        };
        self.shared.perf.lock().edits.record(started.elapsed());
        // The pass cancelled above may not have finished.
        self.schedule_highlighting();
        applied
    }

    /// Replaces every selection with `text`.
    pub fn insert_text(&self, view: ViewId, text: &str) -> bool {
        let bytes = loader::normalize_line_endings(text.as_bytes());
        self.edit(view, move |state, view| {
            let nothing_selected = state.view(view).cursors.iter().all(|c| !c.has_selection());
            if bytes.is_empty() && nothing_selected {
                return None;
            }
            Some(Delta::replace(Insertion::Uniform(bytes)))
        })
    }

    /// Inserts a line break at every cursor.
    pub fn add_new_line(&self, view: ViewId) -> bool {
        self.insert_text(view, "\n")
    }

    /// Opens an empty line above (`Left`) or below (`Right`) each cursor.
    pub fn add_empty_line(&self, view: ViewId, direction: Direction) -> bool {
        self.edit(view, |_, _| {
            Some(Delta::InsertLineBefore {
                direction,
                before: Vec::new(),
                nested: Box::new(Delta::Composite(Vec::new())),
            })
        })
    }

    fn remove_selection(&self, view: ViewId, direction: Direction, granularity: Granularity) -> bool {
        self.edit(view, |_, _| {
            Some(Delta::RemoveSelection {
                direction,
                granularity,
                before: Vec::new(),
                nested: Box::new(Delta::Composite(Vec::new())),
            })
        })
    }

    /// Deletes the selections, or one character at each empty cursor.
    pub fn delete_character(&self, view: ViewId, direction: Direction) -> bool {
        self.remove_selection(view, direction, Granularity::Character)
    }

    /// Deletes the selections, or up to the next word boundary.
    pub fn delete_word(&self, view: ViewId, direction: Direction) -> bool {
        self.remove_selection(view, direction, Granularity::Word)
    }

    /// Deletes the selections, or up to the start or end of the line.
    pub fn delete_line(&self, view: ViewId, direction: Direction) -> bool {
        self.remove_selection(view, direction, Granularity::Line)
    }

    /// Deletes every line touched by a cursor.
    pub fn delete_lines(&self, view: ViewId) -> bool {
        self.edit(view, |state, view| state.delete_lines_delta(view))
    }

    /// Returns the selected text joined by newlines, or the cursor lines when
    /// nothing is selected.
    pub fn copy_text(&self, view: ViewId) -> String {
        let state = self.read();
        String::from_utf8_lossy(&state.copy_selection(view)).into_owned()
    }

    /// Copies like [`Document::copy_text`] and removes what was copied.
    pub fn cut_text(&self, view: ViewId) -> String {
        let mut copied = Vec::new();
        let cut = self.edit(view, |state, view| {
            copied = state.copy_selection(view);
            if state.view(view).cursors.iter().all(|c| !c.has_selection()) {
                state.delete_lines_delta(view)
            } else {
                Some(Delta::replace(Insertion::Uniform(Vec::new())))
            }
        });
        if !cut {
            return String::new();
        }
        String::from_utf8_lossy(&copied).into_owned()
    }

    /// Pastes `text`. With several cursors and exactly one line per cursor,
    /// each cursor receives its own line.
    pub fn paste_text(&self, view: ViewId, text: &str) -> bool {
        let bytes = loader::normalize_line_endings(text.as_bytes());
        self.edit(view, move |state, view| {
            let cursors = &state.view(view).cursors;
            let lines: Vec<&[u8]> = bytes.split(|&b| b == b'\n').collect();
            let insertion = if cursors.len() > 1 && lines.len() == cursors.len() {
                Insertion::PerCursor(lines.into_iter().map(|l| l.to_vec()).collect())
            } else {
                Insertion::Uniform(bytes.clone())
            };
            if insertion.is_empty() && cursors.iter().all(|c| !c.has_selection()) {
                return None;
            }
            Some(Delta::replace(insertion))
        })
    }

    /// Indents (`Right`) or unindents (`Left`) every line touched by a cursor.
    pub fn indent_text(&self, view: ViewId, direction: Direction) -> bool {
        self.edit(view, |state, view| state.indent_delta(view, direction))
    }

    /// Strips spaces and tabs from the end of every line.
    pub fn remove_trailing_whitespace(&self, view: ViewId) -> bool {
        self.edit(view, |state, _| state.trailing_whitespace_delta())
    }

    /// Rewrites leading whitespace of every line using `indentation`.
    pub fn convert_indentation(&self, view: ViewId, indentation: Indentation) -> bool {
        self.edit(view, |state, _| state.convert_indentation_delta(indentation))
    }

    /// Replaces each selection with `template` expanded against it. Group
    /// references may be written `\N` or `$N`. Selections the matcher rejects
    /// are left as they are.
    pub fn regex_replace(&self, view: ViewId, matcher: &dyn Matcher, template: &str) -> bool {
        self.edit(view, |state, view| state.regex_replace_delta(view, matcher, template))
    }

    /// Undoes the most recent edit, restoring `view`'s cursors.
    pub fn undo(&self, view: ViewId) -> bool {
        self.assert_loaded();
        let started = Instant::now();
        self.cancel_highlighting();
        let undone = {
            let mut guard = self.shared.state.write();
            let state = &mut *guard;
            match state.history.pop_undo() {
                Some(delta) => {
                    state.revert(view, &delta);
                    state.history.push_redo(delta);
                    state.after_edit();
                    true
                }
                None => false,
            }
        };
        self.shared.perf.lock().history.record(started.elapsed());
        // The pass cancelled above may not have finished.
        self.schedule_highlighting();
        undone
    }

    /// Re-applies the most recently undone edit.
    pub fn redo(&self, view: ViewId) -> bool {
        self.assert_loaded();
        let started = Instant::now();
        self.cancel_highlighting();
        let redone = {
            let mut guard = self.shared.state.write();
            let state = &mut *guard;
            match state.history.pop_redo() {
                Some(mut delta) => {
                    state.perform(view, &mut delta, true);
                    state.history.push_redone(delta);
                    state.after_edit();
                    true
                }
                None => false,
            }
        };
        self.shared.perf.lock().history.record(started.elapsed());
        // The pass cancelled above may not have finished.
        self.schedule_highlighting();
        redone
    }

    pub fn can_undo(&self) -> bool {
        self.read().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.read().history.can_redo()
    }

    /// Returns true if the text differs from the last [`Document::mark_saved`].
    pub fn has_unsaved_changes(&self) -> bool {
        self.read().history.has_unsaved_changes()
    }

    /// Records the current text as saved.
    pub fn mark_saved(&self) {
        self.shared.state.write().history.mark_saved();
    }

    /// Runs `f` over the cursors of `view`, then normalizes them.
    fn with_cursors<R>(
        &self,
        view: ViewId,
        f: impl FnOnce(&BufferList, &dyn TextMeasure, &mut MultiCursor) -> R,
    ) -> R {
        let mut guard = self.shared.state.write();
        let state = &mut *guard;
        let measure = Arc::clone(&state.measure);
        let text = &state.text;
        let cursors = match state.views.get_mut(view) {
            Some(view) => &mut view.cursors,
            None => panic!("view {:?} is not attached to this document", view),
        };
        let result = f(text, measure.as_ref(), cursors);
        cursors.normalize(text);
        result
    }

    /// Moves every cursor one character.
    pub fn offset_character(&self, view: ViewId, direction: Direction, extend: bool) {
        self.with_cursors(view, |text, _, cursors| {
            for cursor in cursors.iter_mut() {
                cursor.offset_character(text, direction, extend);
            }
        });
    }

    /// Moves every cursor to the next word boundary.
    pub fn offset_word(&self, view: ViewId, direction: Direction, extend: bool) {
        self.with_cursors(view, |text, _, cursors| {
            for cursor in cursors.iter_mut() {
                cursor.offset_word(text, direction, extend);
            }
        });
    }

    /// Moves every cursor `delta` lines.
    pub fn offset_line(&self, view: ViewId, delta: isize, extend: bool) {
        self.with_cursors(view, |text, measure, cursors| {
            for cursor in cursors.iter_mut() {
                cursor.offset_line(text, measure, delta, extend);
            }
        });
    }

    pub fn offset_start_of_line(&self, view: ViewId, extend: bool) {
        self.with_cursors(view, |text, _, cursors| {
            for cursor in cursors.iter_mut() {
                cursor.move_to_line_start(text, extend);
            }
        });
    }

    pub fn offset_end_of_line(&self, view: ViewId, extend: bool) {
        self.with_cursors(view, |text, _, cursors| {
            for cursor in cursors.iter_mut() {
                cursor.move_to_line_end(text, extend);
            }
        });
    }

    /// Collapses to a single cursor at the start of the document.
    pub fn offset_start_of_file(&self, view: ViewId, extend: bool) {
        self.with_cursors(view, |text, _, cursors| {
            cursors.collapse_to_primary();
            for cursor in cursors.iter_mut() {
                cursor.move_to_start(text, extend);
            }
        });
    }

    /// Collapses to a single cursor at the end of the document.
    pub fn offset_end_of_file(&self, view: ViewId, extend: bool) {
        self.with_cursors(view, |text, _, cursors| {
            cursors.collapse_to_primary();
            for cursor in cursors.iter_mut() {
                cursor.move_to_end(text, extend);
            }
        });
    }

    pub fn select_word(&self, view: ViewId) {
        self.with_cursors(view, |text, _, cursors| {
            for cursor in cursors.iter_mut() {
                cursor.select_word(text);
            }
        });
    }

    pub fn select_line(&self, view: ViewId) {
        self.with_cursors(view, |text, _, cursors| {
            for cursor in cursors.iter_mut() {
                cursor.select_line(text);
            }
        });
    }

    /// Selects the whole document with a single cursor.
    pub fn select_everything(&self, view: ViewId) {
        self.with_cursors(view, |text, _, cursors| {
            cursors.reset(vec![Cursor::with_selection(text.start(), text.end())]);
        });
    }

    /// Adds a cursor at (`line`, `column`) and makes it active.
    pub fn add_new_cursor(&self, view: ViewId, line: usize, column: usize) {
        self.with_cursors(view, |text, _, cursors| {
            cursors.add_cursor(Cursor::new(text.position_of(line, column)));
        });
    }

    /// Keeps only the active cursor.
    pub fn clear_extra_cursors(&self, view: ViewId) {
        self.with_cursors(view, |_, _, cursors| cursors.collapse_to_primary());
    }

    /// Replaces all cursors with a single caret at (`line`, `column`).
    pub fn set_cursor_location(&self, view: ViewId, line: usize, column: usize) {
        self.with_cursors(view, |text, _, cursors| {
            cursors.reset(vec![Cursor::new(text.position_of(line, column))]);
        });
    }

    /// Replaces all cursors. Before loading completes the ranges are kept and
    /// applied once the text is in place.
    pub fn set_cursors(&self, view: ViewId, ranges: &[CursorRange]) {
        let mut guard = self.shared.state.write();
        let state = &mut *guard;
        if !self.is_loaded() {
            if let Some(view) = state.views.get_mut(view) {
                view.pending = Some(ranges.to_vec());
            }
            return;
        }
        let text = &state.text;
        let cursors = match state.views.get_mut(view) {
            Some(view) => &mut view.cursors,
            None => panic!("view {:?} is not attached to this document", view),
        };
        if ranges.is_empty() {
            cursors.reset(vec![Cursor::new(text.start())]);
        } else {
            cursors.restore(text, ranges);
        }
        cursors.normalize(text);
    }

    /// Returns the cursors of `view`.
    pub fn cursors(&self, view: ViewId) -> Vec<CursorRange> {
        self.read().cursors(view)
    }

    /// Returns the active cursor of `view`.
    pub fn active_cursor(&self, view: ViewId) -> CursorRange {
        let state = self.read();
        let cursors = &state.view(view).cursors;
        cursors.primary().to_range(&state.text)
    }

    pub fn line_count(&self) -> usize {
        self.read().line_count()
    }

    pub fn buffer_count(&self) -> usize {
        self.read().text.len()
    }

    /// Returns a copy of line `line` without its newline.
    pub fn line(&self, line: usize) -> Vec<u8> {
        self.read().line(line).to_vec()
    }

    /// Returns the syntax tokens of `line`, if highlighted.
    pub fn line_tokens(&self, line: usize) -> Option<LineTokens> {
        self.read().line_tokens(line).cloned()
    }

    /// Returns the whole text with `\n` line breaks.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.read().text.text()).into_owned()
    }

    /// Returns the whole text using the document's line ending.
    pub fn text_with_line_endings(&self) -> Vec<u8> {
        let state = self.read();
        loader::apply_line_ending(&state.text.text(), state.line_ending)
    }

    pub fn line_ending(&self) -> LineEnding {
        self.read().line_ending
    }

    /// Changes the line ending used by [`Document::text_with_line_endings`].
    /// Ignored until the document has loaded.
    pub fn set_line_ending(&self, line_ending: LineEnding) {
        if !self.is_loaded() {
            return;
        }
        self.shared.state.write().line_ending = line_ending;
    }

    pub fn total_width(&self) -> f64 {
        self.read().total_width
    }

    pub fn max_line_width(&self) -> f32 {
        self.read().max_line_width
    }

    /// Re-measures the widest line with `measure`.
    pub fn max_line_width_with(&self, measure: &dyn TextMeasure) -> f32 {
        let state = self.read();
        match state.longest_line {
            Some((id, local)) => measure.measure(state.text.buffer(id).line(local)),
            None => 0.0,
        }
    }

    pub fn version(&self) -> u64 {
        self.read().version
    }

    /// Returns the next match from `from`.
    pub fn find_match(
        &self,
        matcher: &dyn Matcher,
        direction: Direction,
        from: Position,
        wrap: bool,
    ) -> Option<TextRange> {
        search::find_match(&self.read().text, matcher, direction, from, wrap)
    }

    /// Returns every match in the document.
    pub fn find_all_matches(&self, matcher: &dyn Matcher) -> Vec<TextRange> {
        search::find_all(&self.read().text, matcher)
    }

    /// Returns a snapshot of the timing statistics.
    pub fn perf(&self) -> DocumentPerf {
        self.shared.perf.lock().clone()
    }

    /// Checks internal invariants, describing the first violation.
    pub fn verify(&self) -> Result<(), String> {
        self.read().verify()
    }

    /// Replaces the highlighter and re-highlights everything.
    pub fn set_highlighter(&self, highlighter: Option<Arc<dyn Highlighter>>) {
        self.cancel_highlighting();
        {
            let mut state = self.shared.state.write();
            state.highlighter = highlighter;
            for index in 0..state.text.len() {
                let id = state.text.at(index);
                let buffer = state.text.buffer_mut(id);
                buffer.parsed = false;
                buffer.end_state = None;
            }
        }
        self.schedule_highlighting();
    }

    fn cancel_highlighting(&self) {
        self.shared.highlight_generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Queues a highlighting pass on the scheduler, if there is one.
    pub fn schedule_highlighting(&self) {
        let Some(scheduler) = &self.shared.scheduler else {
            return;
        };
        if !self.is_loaded() || self.read().highlighter.is_none() {
            return;
        }
        let generation = self.shared.highlight_generation.load(Ordering::SeqCst);
        let document = self.clone();
        scheduler.spawn(move || {
            document.highlight_pass(generation);
        });
    }

    /// Highlights every unparsed buffer on the calling thread. Returns true if
    /// the whole document is highlighted.
    pub fn highlight_now(&self) -> bool {
        let generation = self.shared.highlight_generation.load(Ordering::SeqCst);
        self.highlight_pass(generation)
    }

    /// Returns true if every buffer has been highlighted.
    pub fn is_highlighted(&self) -> bool {
        self.read().text.first_unparsed().is_none()
    }

    /// Parses unparsed buffers one at a time until none are left, the pass is
    /// cancelled by a newer generation, or the highlighter fails.
    fn highlight_pass(&self, generation: u64) -> bool {
        loop {
            let state = self.shared.state.upgradable_read();
            if self.shared.highlight_generation.load(Ordering::SeqCst) != generation {
                log::trace!("Highlight pass {} cancelled", generation);
                return false;
            }
            let Some(highlighter) = state.highlighter.clone() else {
                return true;
            };
            let Some(index) = state.text.first_unparsed() else {
                return true;
            };
            let started = Instant::now();
            let id = state.text.at(index);
            let buffer = state.text.buffer(id);
            let mut parser_state = match buffer.prev {
                Some(prev) => state
                    .text
                    .buffer(prev)
                    .end_state
                    .unwrap_or_else(|| highlighter.default_state()),
                None => highlighter.default_state(),
            };
            let mut tokens = Vec::with_capacity(buffer.line_count());
            for line in 0..buffer.line_count() {
                match highlighter.parse_line(buffer.line(line), parser_state) {
                    Ok((line_tokens, next)) => {
                        tokens.push(line_tokens);
                        parser_state = next;
                    }
                    Err(e) => {
                        log::warn!(
                            "Highlighting stopped at line {}: {}",
                            buffer.start_line() + line,
                            e
                        );
                        return false;
                    }
                }
            }
            let previous_end = buffer.end_state;
            let next = buffer.next;

            let mut state = RwLockUpgradableReadGuard::upgrade(state);
            let buffer = state.text.buffer_mut(id);
            buffer.syntax = tokens;
            buffer.end_state = Some(parser_state);
            buffer.parsed = true;
            let unchanged = previous_end
                .map_or(false, |previous| highlighter.states_equivalent(previous, parser_state));
            if let (Some(next), false) = (next, unchanged) {
                state.text.buffer_mut(next).parsed = false;
            }
            drop(state);
            self.shared.perf.lock().highlight.record(started.elapsed());
        }
    }
}
