//! Source location model (spec §9: byte offsets are ground truth where the
//! parser gives us real ones; the `line * 80` legacy approximation is kept
//! only as an explicit fallback for tie-breaking, never for text slicing).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl Span {
    pub fn merge(a: &Span, b: &Span) -> Span {
        let (start, end) = if seq_key(a) <= seq_key(b) { (a, b) } else { (b, a) };
        Span {
            start_line: start.start_line,
            start_col: start.start_col,
            end_line: end.end_line,
            end_col: end.end_col,
            start_byte: start.start_byte.min(end.start_byte),
            end_byte: start.end_byte.max(end.end_byte),
        }
    }
}

fn seq_key(s: &Span) -> (usize, usize) {
    (s.start_line, s.start_col)
}

/// Stable total order over source positions, used for `seq_order` (spec §4.9).
pub fn position_key(s: &Span) -> (usize, usize, usize, usize) {
    (s.start_line, s.start_col, s.end_line, s.end_col)
}
