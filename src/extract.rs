//! Sequence Extractor (spec §4.1): walks every callable body and emits
//! sliding windows of statements.

use std::rc::Rc;

use crate::ast::TranslationUnit;
use crate::config::Options;
use crate::types::StatementSequence;

/// Emits every window the configured sliding-window contract admits for
/// `tu`. Abstract/bodyless callables were never registered as [`Callable`]
/// entries in the first place (spec §4.1's "Abstract callables are
/// skipped"), so nothing here needs to special-case them.
pub fn extract_sequences(
    tu_id: usize,
    tu: &Rc<TranslationUnit>,
    opts: &Options,
) -> Vec<StatementSequence> {
    let mut out = Vec::new();
    for (callable_idx, callable) in tu.callables.iter().enumerate() {
        if callable.is_test && !opts.include_tests {
            continue;
        }
        let (start, end) = callable.stmt_range;
        let n = end - start;
        if n < opts.min_lines {
            continue;
        }
        for window in windows_for(n, opts) {
            let seq_start = start + window.0;
            let seq_end = start + window.1;
            out.push(StatementSequence::new(
                tu_id,
                callable_idx,
                seq_start,
                seq_end,
                tu,
            ));
        }
    }
    out
}

/// Local-index `(start, end)` windows (both relative to the callable's
/// first statement) per spec §4.1's contract.
fn windows_for(n: usize, opts: &Options) -> Vec<(usize, usize)> {
    let min_lines = opts.min_lines;
    let growth = opts.max_window_growth;
    let mut windows = Vec::new();

    if n < min_lines {
        return windows;
    }

    for s in 0..=(n - min_lines) {
        let max_len = (min_lines + growth).min(n - s);
        if opts.maximal_only {
            windows.push((s, s + max_len));
        } else {
            for w in min_lines..=max_len {
                windows.push((s, s + w));
            }
        }
    }
    windows
}
