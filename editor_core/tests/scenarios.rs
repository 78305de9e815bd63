//! End-to-end editing scenarios and undo/redo round trips.

use strata_core::{
    CursorRange, Direction, Document, DocumentOptions, Indentation, MatchOptions, RegexMatcher,
    View,
};

fn open(text: &str) -> View {
    View::new(&Document::from_text(text, DocumentOptions::default()))
}

fn open_small(text: &str, buffer_size: usize) -> View {
    let options = DocumentOptions {
        buffer_size,
        ..Default::default()
    };
    View::new(&Document::from_text(text, options))
}

#[test]
fn test_move_right_then_backspace() {
    let view = open("hello world");
    view.offset_character(Direction::Right, false);
    view.offset_character(Direction::Right, false);
    assert!(view.delete_character(Direction::Left));
    assert_eq!(view.document().text(), "hllo world");
    assert_eq!(view.cursors(), vec![CursorRange::caret(0, 1)]);
}

#[test]
fn test_delete_selection() {
    let view = open("hello world");
    view.set_cursors(&[CursorRange::new(0, 1, 0, 4)]);
    assert!(view.delete_character(Direction::Left));
    assert_eq!(view.document().text(), "ho world");
    assert_eq!(view.cursors(), vec![CursorRange::caret(0, 1)]);
}

#[test]
fn test_backspace_joins_lines() {
    let view = open("hello\n world");
    view.set_cursor_location(1, 0);
    assert!(view.delete_character(Direction::Left));
    assert_eq!(view.document().text(), "hello world");
    assert_eq!(view.document().line_count(), 1);
    assert_eq!(view.cursors(), vec![CursorRange::caret(0, 5)]);
}

#[test]
fn test_typing_at_two_cursors() {
    let view = open("hello world");
    view.set_cursor_location(0, 1);
    view.add_new_cursor(0, 7);
    assert!(view.insert_text("a"));
    assert_eq!(view.document().text(), "haello waorld");
    assert_eq!(
        view.cursors(),
        vec![CursorRange::caret(0, 2), CursorRange::caret(0, 9)]
    );
    view.document().verify().unwrap();
}

#[test]
fn test_split_then_undo_restores_buffers() {
    let view = open_small("abc\ndef\nghi", 32);
    let document = view.document().clone();
    let buffers = document.buffer_count();
    view.set_cursor_location(1, 1);
    view.insert_text(&"0123456789\n".repeat(4));
    assert!(document.buffer_count() > buffers);
    document.verify().unwrap();
    assert!(view.undo());
    assert_eq!(document.text(), "abc\ndef\nghi");
    assert_eq!(document.buffer_count(), buffers);
    document.verify().unwrap();
}

#[test]
fn test_copy_paste_undo_redo() {
    let view = open("first line\nsecond line\nthird");
    view.set_cursors(&[CursorRange::new(0, 6, 1, 6)]);
    let copied = view.copy_text();
    assert_eq!(copied, "line\nsecond");
    view.set_cursor_location(2, 5);
    assert!(view.paste_text(&copied));
    let pasted = view.document().text();
    assert_eq!(pasted, "first line\nsecond line\nthirdline\nsecond");
    let cursors = view.cursors();
    assert!(view.undo());
    assert_eq!(view.document().text(), "first line\nsecond line\nthird");
    assert!(view.redo());
    assert_eq!(view.document().text(), pasted);
    assert_eq!(view.cursors(), cursors);
}

/// Applies `edit`, then checks that undo restores text and cursors exactly
/// and that redo reproduces the edited state.
fn assert_round_trip(text: &str, cursors: &[CursorRange], edit: impl Fn(&View) -> bool) {
    for buffer_size in [16, 4096] {
        let view = open_small(text, buffer_size);
        let document = view.document().clone();
        view.set_cursors(cursors);
        let before_text = document.text();
        let before_cursors = view.cursors();

        assert!(edit(&view), "edit did nothing");
        document.verify().unwrap();
        let after_text = document.text();
        let after_cursors = view.cursors();
        assert_ne!(before_text, after_text);

        assert!(view.undo());
        document.verify().unwrap();
        assert_eq!(document.text(), before_text);
        assert_eq!(view.cursors(), before_cursors);

        assert!(view.redo());
        document.verify().unwrap();
        assert_eq!(document.text(), after_text);
        assert_eq!(view.cursors(), after_cursors);
    }
}

const SAMPLE: &str = "fn main() {\n    let alpha = 1;  \n\tlet beta = 2;\n}\n";

#[test]
fn test_round_trip_insert() {
    assert_round_trip(
        SAMPLE,
        &[CursorRange::caret(1, 4), CursorRange::new(2, 1, 2, 4)],
        |view| view.insert_text("x\ny"),
    );
}

#[test]
fn test_round_trip_delete_character() {
    assert_round_trip(
        SAMPLE,
        &[CursorRange::caret(1, 0), CursorRange::caret(3, 1)],
        |view| view.delete_character(Direction::Left),
    );
    assert_round_trip(SAMPLE, &[CursorRange::caret(0, 11)], |view| {
        view.delete_character(Direction::Right)
    });
}

#[test]
fn test_round_trip_delete_word() {
    assert_round_trip(
        SAMPLE,
        &[CursorRange::caret(1, 8), CursorRange::caret(2, 4)],
        |view| view.delete_word(Direction::Right),
    );
}

#[test]
fn test_round_trip_delete_line() {
    assert_round_trip(SAMPLE, &[CursorRange::caret(1, 9)], |view| {
        view.delete_line(Direction::Left)
    });
    assert_round_trip(SAMPLE, &[CursorRange::caret(0, 11)], |view| {
        view.delete_line(Direction::Right)
    });
}

#[test]
fn test_round_trip_delete_lines() {
    assert_round_trip(
        SAMPLE,
        &[CursorRange::caret(0, 3), CursorRange::new(1, 2, 2, 0)],
        |view| view.delete_lines(),
    );
}

#[test]
fn test_round_trip_multi_line_paste() {
    assert_round_trip(SAMPLE, &[CursorRange::new(1, 8, 1, 13)], |view| {
        view.paste_text("one\ntwo\nthree")
    });
    assert_round_trip(
        SAMPLE,
        &[CursorRange::caret(0, 0), CursorRange::caret(3, 1)],
        |view| view.paste_text("// a\n// b"),
    );
}

#[test]
fn test_round_trip_indent() {
    assert_round_trip(SAMPLE, &[CursorRange::new(0, 2, 3, 1)], |view| {
        view.indent_text(Direction::Right)
    });
    assert_round_trip(SAMPLE, &[CursorRange::new(1, 0, 2, 3)], |view| {
        view.indent_text(Direction::Left)
    });
}

#[test]
fn test_round_trip_regex_replace() {
    let matcher = RegexMatcher::new(r"let (\w+)", MatchOptions::default()).unwrap();
    assert_round_trip(
        SAMPLE,
        &[CursorRange::new(1, 4, 1, 13), CursorRange::new(2, 1, 2, 9)],
        |view| view.regex_replace(&matcher, "const $1"),
    );
}

#[test]
fn test_round_trip_add_empty_line() {
    assert_round_trip(
        SAMPLE,
        &[CursorRange::caret(1, 3), CursorRange::caret(3, 0)],
        |view| view.add_empty_line(Direction::Left),
    );
    assert_round_trip(SAMPLE, &[CursorRange::caret(0, 5)], |view| {
        view.add_empty_line(Direction::Right)
    });
}

#[test]
fn test_round_trip_whole_document_edits() {
    assert_round_trip(SAMPLE, &[CursorRange::caret(1, 16)], |view| {
        view.remove_trailing_whitespace()
    });
    assert_round_trip(SAMPLE, &[CursorRange::caret(1, 6)], |view| {
        view.convert_indentation(Indentation::Tabs)
    });
    assert_round_trip(SAMPLE, &[CursorRange::caret(2, 3)], |view| {
        view.convert_indentation(Indentation::Spaces)
    });
}

#[test]
fn test_delete_at_end_is_not_recorded() {
    let view = open("abc");
    view.offset_end_of_file(false);
    assert!(!view.delete_word(Direction::Right));
    assert!(!view.delete_character(Direction::Right));
    assert!(!view.document().can_undo());
}

#[test]
fn test_new_edit_clears_redo() {
    let view = open("abc");
    view.insert_text("x");
    view.undo();
    assert!(view.document().can_redo());
    view.insert_text("y");
    assert!(!view.document().can_redo());
    assert!(!view.redo());
}

#[test]
fn test_cursors_merge_when_deletions_meet() {
    let view = open("abcdef");
    view.set_cursor_location(0, 2);
    view.add_new_cursor(0, 3);
    view.delete_character(Direction::Left);
    assert_eq!(view.document().text(), "adef");
    assert_eq!(view.cursors(), vec![CursorRange::caret(0, 1)]);
}

#[test]
fn test_deletion_merges_cursors_of_other_views() {
    let first = open("abcdefgh");
    let document = first.document().clone();
    let second = View::new(&document);
    second.set_cursor_location(0, 2);
    second.add_new_cursor(0, 4);

    first.set_cursors(&[CursorRange::new(0, 1, 0, 6)]);
    assert!(first.delete_character(Direction::Left));
    assert_eq!(document.text(), "agh");
    assert_eq!(second.cursors(), vec![CursorRange::caret(0, 1)]);
    document.verify().unwrap();

    assert!(first.undo());
    assert_eq!(document.text(), "abcdefgh");
    document.verify().unwrap();
}
