//! Random edits checked against a rope.
//!
//! Documents use a tiny buffer size so that nearly every edit splits or
//! merges buffers.

use ropey::Rope;
use strata_core::{CursorRange, Direction, Document, DocumentOptions, View};

/// xorshift64*, deterministic across runs.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        self.0.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }

    fn text(&mut self, max_len: usize) -> String {
        const ALPHABET: &[u8] = b"abcde \n\n";
        let len = self.below(max_len + 1);
        (0..len)
            .map(|_| ALPHABET[self.below(ALPHABET.len())] as char)
            .collect()
    }
}

fn line_col(rope: &Rope, index: usize) -> (usize, usize) {
    let line = rope.char_to_line(index);
    (line, index - rope.line_to_char(line))
}

fn check(document: &Document, rope: &Rope, step: usize) {
    assert_eq!(document.text(), rope.to_string(), "text diverged at step {}", step);
    assert_eq!(document.line_count(), rope.len_lines(), "line count at step {}", step);
    if let Err(e) = document.verify() {
        panic!("invariant broken at step {}: {}", step, e);
    }
}

fn run(seed: u64, buffer_size: usize, steps: usize) {
    let initial = "first line\nsecond\n\nfourth line here\nlast";
    let options = DocumentOptions {
        buffer_size,
        ..Default::default()
    };
    let document = Document::from_text(initial, options);
    let view = View::new(&document);
    let mut rope = Rope::from_str(initial);
    let mut rng = Rng(seed);
    let mut history = vec![rope.clone()];

    for step in 0..steps {
        let len = rope.len_chars();
        let applied = match rng.below(4) {
            // Type or paste at a caret.
            0 => {
                let at = rng.below(len + 1);
                let text = rng.text(12);
                let (line, col) = line_col(&rope, at);
                view.set_cursor_location(line, col);
                rope.insert(at, &text);
                view.insert_text(&text)
            }
            // Delete a range.
            1 if len > 0 => {
                let a = rng.below(len);
                let b = a + 1 + rng.below((len - a).min(40));
                let (l1, c1) = line_col(&rope, a);
                let (l2, c2) = line_col(&rope, b);
                view.set_cursors(&[CursorRange::new(l1, c1, l2, c2)]);
                rope.remove(a..b);
                view.delete_character(Direction::Left)
            }
            // Replace a range.
            2 if len > 0 => {
                let a = rng.below(len);
                let b = a + 1 + rng.below((len - a).min(20));
                let text = rng.text(16);
                let (l1, c1) = line_col(&rope, a);
                let (l2, c2) = line_col(&rope, b);
                view.set_cursors(&[CursorRange::new(l2, c2, l1, c1)]);
                rope.remove(a..b);
                rope.insert(a, &text);
                view.insert_text(&text)
            }
            // Type at two cursors.
            _ => {
                let a = rng.below(len + 1);
                let b = rng.below(len + 1);
                let (a, b) = (a.min(b), a.max(b));
                let text = rng.text(4);
                let (l1, c1) = line_col(&rope, a);
                let (l2, c2) = line_col(&rope, b);
                view.set_cursor_location(l1, c1);
                view.add_new_cursor(l2, c2);
                rope.insert(b, &text);
                if a != b {
                    rope.insert(a, &text);
                }
                view.insert_text(&text)
            }
        };
        check(&document, &rope, step);
        if applied {
            history.push(rope.clone());
        }
    }

    let final_text = document.text();
    for expected in history.iter().rev().skip(1) {
        assert!(view.undo());
        assert_eq!(document.text(), expected.to_string());
        document.verify().unwrap();
    }
    assert!(!view.undo());
    assert_eq!(document.text(), initial);

    while view.redo() {}
    assert_eq!(document.text(), final_text);
    document.verify().unwrap();
}

#[test]
fn test_random_edits_tiny_buffers() {
    run(0x9E37_79B9_7F4A_7C15, 8, 400);
}

#[test]
fn test_random_edits_small_buffers() {
    run(42, 32, 400);
}

#[test]
fn test_random_edits_default_buffers() {
    run(7, 4096, 200);
}
