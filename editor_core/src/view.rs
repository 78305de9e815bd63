//! Views onto a shared document.
//!
//! A [`View`] owns what is specific to one window: scroll offsets, the word
//! wrap flag and the current search results. Its cursors live in the
//! [`Document`] so that edits made through any view keep every other view's
//! cursors in place. All editing is delegated to the document.

use crate::cursor::{CursorRange, Direction, Position, TextRange};
use crate::document::{Document, ViewId};
use crate::error::SettingsError;
use crate::options::Indentation;
use crate::search::{Matcher, Search};
use serde::{Deserialize, Serialize};

/// Vertical scroll position: a line plus the fraction of it scrolled past.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub line: usize,
    pub fraction: f32,
}

/// Persistable state of a view.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    pub xoffset: f32,
    pub yoffset: ScrollOffset,
    pub word_wrap: bool,
    pub cursors: Vec<CursorRange>,
}

impl ViewSettings {
    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A window onto a [`Document`]. Dropping the view detaches its cursors.
#[derive(Debug)]
pub struct View {
    document: Document,
    id: ViewId,
    xoffset: f32,
    yoffset: ScrollOffset,
    word_wrap: bool,
    search: Search,
}

impl View {
    /// Attaches a new view with one cursor at the start of `document`.
    pub fn new(document: &Document) -> Self {
        let id = document.attach_view();
        Self {
            document: document.clone(),
            id,
            xoffset: 0.0,
            yoffset: ScrollOffset::default(),
            word_wrap: false,
            search: Search::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    // Editing

    pub fn insert_text(&self, text: &str) -> bool {
        self.document.insert_text(self.id, text)
    }

    pub fn add_new_line(&self) -> bool {
        self.document.add_new_line(self.id)
    }

    pub fn add_empty_line(&self, direction: Direction) -> bool {
        self.document.add_empty_line(self.id, direction)
    }

    pub fn delete_character(&self, direction: Direction) -> bool {
        self.document.delete_character(self.id, direction)
    }

    pub fn delete_word(&self, direction: Direction) -> bool {
        self.document.delete_word(self.id, direction)
    }

    pub fn delete_line(&self, direction: Direction) -> bool {
        self.document.delete_line(self.id, direction)
    }

    pub fn delete_lines(&self) -> bool {
        self.document.delete_lines(self.id)
    }

    pub fn cut_text(&self) -> String {
        self.document.cut_text(self.id)
    }

    pub fn copy_text(&self) -> String {
        self.document.copy_text(self.id)
    }

    pub fn paste_text(&self, text: &str) -> bool {
        self.document.paste_text(self.id, text)
    }

    pub fn indent_text(&self, direction: Direction) -> bool {
        self.document.indent_text(self.id, direction)
    }

    pub fn regex_replace(&self, matcher: &dyn Matcher, template: &str) -> bool {
        self.document.regex_replace(self.id, matcher, template)
    }

    pub fn remove_trailing_whitespace(&self) -> bool {
        self.document.remove_trailing_whitespace(self.id)
    }

    pub fn convert_indentation(&self, indentation: Indentation) -> bool {
        self.document.convert_indentation(self.id, indentation)
    }

    pub fn undo(&self) -> bool {
        self.document.undo(self.id)
    }

    pub fn redo(&self) -> bool {
        self.document.redo(self.id)
    }

    // Cursors

    pub fn cursors(&self) -> Vec<CursorRange> {
        self.document.cursors(self.id)
    }

    pub fn active_cursor(&self) -> CursorRange {
        self.document.active_cursor(self.id)
    }

    pub fn set_cursors(&self, ranges: &[CursorRange]) {
        self.document.set_cursors(self.id, ranges);
    }

    pub fn set_cursor_location(&self, line: usize, column: usize) {
        self.document.set_cursor_location(self.id, line, column);
    }

    pub fn add_new_cursor(&self, line: usize, column: usize) {
        self.document.add_new_cursor(self.id, line, column);
    }

    pub fn clear_extra_cursors(&self) {
        self.document.clear_extra_cursors(self.id);
    }

    pub fn offset_character(&self, direction: Direction, extend: bool) {
        self.document.offset_character(self.id, direction, extend);
    }

    pub fn offset_word(&self, direction: Direction, extend: bool) {
        self.document.offset_word(self.id, direction, extend);
    }

    pub fn offset_line(&self, delta: isize, extend: bool) {
        self.document.offset_line(self.id, delta, extend);
    }

    pub fn offset_start_of_line(&self, extend: bool) {
        self.document.offset_start_of_line(self.id, extend);
    }

    pub fn offset_end_of_line(&self, extend: bool) {
        self.document.offset_end_of_line(self.id, extend);
    }

    pub fn offset_start_of_file(&self, extend: bool) {
        self.document.offset_start_of_file(self.id, extend);
    }

    pub fn offset_end_of_file(&self, extend: bool) {
        self.document.offset_end_of_file(self.id, extend);
    }

    pub fn select_word(&self) {
        self.document.select_word(self.id);
    }

    pub fn select_line(&self) {
        self.document.select_line(self.id);
    }

    pub fn select_everything(&self) {
        self.document.select_everything(self.id);
    }

    // Scrolling

    pub fn xoffset(&self) -> f32 {
        self.xoffset
    }

    pub fn set_xoffset(&mut self, xoffset: f32) {
        self.xoffset = xoffset.max(0.0);
    }

    pub fn yoffset(&self) -> ScrollOffset {
        self.yoffset
    }

    /// Sets the vertical offset, clamped to the document.
    pub fn set_yoffset(&mut self, offset: ScrollOffset) {
        let last = self.document.line_count().saturating_sub(1);
        self.yoffset = if offset.line > last {
            ScrollOffset {
                line: last,
                fraction: 0.0,
            }
        } else {
            ScrollOffset {
                line: offset.line,
                fraction: offset.fraction.clamp(0.0, 1.0),
            }
        };
    }

    pub fn word_wrap(&self) -> bool {
        self.word_wrap
    }

    pub fn set_word_wrap(&mut self, word_wrap: bool) {
        self.word_wrap = word_wrap;
        if word_wrap {
            self.xoffset = 0.0;
        } else {
            self.yoffset.fraction = 0.0;
        }
    }

    /// Scrolls so the active caret is inside a window of `visible_lines`.
    pub fn scroll_to_cursor(&mut self, visible_lines: usize) {
        let caret = self.active_cursor().end_line;
        let visible = visible_lines.max(1);
        if caret < self.yoffset.line {
            self.yoffset = ScrollOffset {
                line: caret,
                fraction: 0.0,
            };
        } else if caret >= self.yoffset.line + visible {
            self.yoffset = ScrollOffset {
                line: caret + 1 - visible,
                fraction: 0.0,
            };
        }
    }

    // Search

    pub fn search(&self) -> &Search {
        &self.search
    }

    /// Selects the next match after (or the previous match before) the
    /// active cursor and returns it.
    pub fn find_match(
        &mut self,
        matcher: &dyn Matcher,
        direction: Direction,
        wrap: bool,
    ) -> Option<TextRange> {
        let active = self.active_cursor();
        let (begin, end) = ordered(active.start(), active.end());
        let from = match direction {
            Direction::Right => end,
            Direction::Left => begin,
        };
        let found = self.document.find_match(matcher, direction, from, wrap)?;
        self.set_cursors(&[CursorRange::new(
            found.start.line,
            found.start.col,
            found.end.line,
            found.end.col,
        )]);
        self.search.select(found);
        Some(found)
    }

    /// Collects every match into the view's search results and returns how
    /// many there are.
    pub fn find_all_matches(&mut self, matcher: &dyn Matcher) -> usize {
        let matches = self.document.find_all_matches(matcher);
        self.search.set_matches(matches, self.document.version());
        self.search.match_count()
    }

    /// Turns the search results into one selection per match. Does nothing
    /// if there are no results or the text changed since they were found.
    pub fn select_matches(&self) -> bool {
        if !self.search.has_matches() || !self.search.is_current(self.document.version()) {
            return false;
        }
        let ranges: Vec<CursorRange> = self
            .search
            .matches()
            .iter()
            .map(|m| CursorRange::new(m.start.line, m.start.col, m.end.line, m.end.col))
            .collect();
        self.set_cursors(&ranges);
        true
    }

    pub fn clear_search(&mut self) {
        self.search.clear();
    }

    // Settings

    pub fn get_settings(&self) -> ViewSettings {
        ViewSettings {
            xoffset: self.xoffset,
            yoffset: self.yoffset,
            word_wrap: self.word_wrap,
            cursors: self.cursors(),
        }
    }

    /// Applies saved settings. Cursors are deferred until the document has
    /// loaded.
    pub fn apply_settings(&mut self, settings: &ViewSettings) {
        self.word_wrap = settings.word_wrap;
        self.xoffset = settings.xoffset.max(0.0);
        self.yoffset = settings.yoffset;
        self.set_cursors(&settings.cursors);
        if self.document.is_loaded() {
            self.set_yoffset(settings.yoffset);
        }
    }
}

impl Drop for View {
    fn drop(&mut self) {
        self.document.detach_view(self.id);
    }
}

fn ordered(a: Position, b: Position) -> (Position, Position) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DocumentOptions;
    use crate::search::RegexMatcher;

    fn view(text: &str) -> View {
        View::new(&Document::from_text(text, DocumentOptions::default()))
    }

    #[test]
    fn test_settings_round_trip() {
        let mut view = view("one\ntwo\nthree");
        view.set_cursors(&[CursorRange::new(0, 1, 0, 3), CursorRange::caret(2, 4)]);
        view.set_xoffset(12.5);
        view.set_yoffset(ScrollOffset {
            line: 1,
            fraction: 0.25,
        });
        let json = view.get_settings().to_json().unwrap();
        let settings = ViewSettings::from_json(&json).unwrap();
        assert_eq!(settings, view.get_settings());
        assert_eq!(settings.to_json().unwrap(), json);

        let document = view.document().clone();
        let mut other = View::new(&document);
        other.apply_settings(&settings);
        assert_eq!(other.get_settings(), settings);
    }

    #[test]
    fn test_settings_bad_json() {
        assert!(ViewSettings::from_json("{\"cursors\": 3}").is_err());
        assert_eq!(ViewSettings::from_json("{}").unwrap(), ViewSettings::default());
    }

    #[test]
    fn test_drop_detaches() {
        let document = Document::from_text("abc", DocumentOptions::default());
        let first = View::new(&document);
        {
            let second = View::new(&document);
            second.set_cursor_location(0, 2);
        }
        first.insert_text("x");
        document.verify().unwrap();
        assert_eq!(document.text(), "xabc");
    }

    #[test]
    fn test_find_match_selects() {
        let mut view = view("foo bar foo");
        let matcher = RegexMatcher::literal("foo").unwrap();
        view.find_all_matches(&matcher);
        let found = view.find_match(&matcher, Direction::Right, false).unwrap();
        assert_eq!(found.start, Position::new(0, 0));
        let found = view.find_match(&matcher, Direction::Right, false).unwrap();
        assert_eq!(found.start, Position::new(0, 8));
        assert_eq!(view.cursors(), vec![CursorRange::new(0, 8, 0, 11)]);
        assert_eq!(view.search().current_match_index(), Some(1));
        assert!(view.find_match(&matcher, Direction::Right, false).is_none());
        assert!(view.find_match(&matcher, Direction::Right, true).is_some());
    }

    #[test]
    fn test_select_matches_then_type() {
        let mut view = view("a-b-c");
        let matcher = RegexMatcher::literal("-").unwrap();
        assert_eq!(view.find_all_matches(&matcher), 2);
        assert!(view.select_matches());
        view.insert_text("+");
        assert_eq!(view.document().text(), "a+b+c");
        assert!(!view.select_matches());
    }

    #[test]
    fn test_scroll_to_cursor() {
        let mut view = view(&"line\n".repeat(50));
        view.set_cursor_location(30, 0);
        view.scroll_to_cursor(10);
        assert_eq!(view.yoffset().line, 21);
        view.set_cursor_location(5, 0);
        view.scroll_to_cursor(10);
        assert_eq!(view.yoffset().line, 5);
    }

    #[test]
    fn test_word_wrap_resets_offsets() {
        let mut view = view("x");
        view.set_xoffset(40.0);
        view.set_word_wrap(true);
        assert_eq!(view.xoffset(), 0.0);
        assert!(view.word_wrap());
    }
}
