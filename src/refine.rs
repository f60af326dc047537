//! Boundary Refiner (spec §4.8): trims trailing "usage-only" statements
//! that contribute nothing but a spurious mismatch, re-scoring after every
//! trim and rolling back the moment the score would regress.
//!
//! Trimming is symmetric and lockstep: one trailing statement comes off
//! *both* sequences together, never one side alone. A one-sided trim would
//! leave the pair at unequal sizes, but every downstream consumer (the
//! kernel's positional `structural_similarity`, the cluster primary's
//! reported span) assumes a refined pair is a matched pair of equal
//! length, so the two sides only ever shrink in step.

use crate::config::Options;
use crate::errors::Result;
use crate::kernel;
use crate::normalize::NormalizeCache;
use crate::types::{SimilarityResult, StatementSequence};

/// `true` if statement `idx` (within `tu`, at position `idx` globally) is a
/// usage-only candidate whose referenced names were all already declared
/// earlier in the sequence `[seq_start, idx)` — spec §4.8's exact test for
/// "safe to trim from the tail".
pub fn is_usage_only(tu: &crate::ast::TranslationUnit, seq_start: usize, idx: usize) -> Result<bool> {
    if !crate::ast::is_usage_only_candidate(tu, idx)? {
        return Ok(false);
    }
    let declared_before = crate::ast::declared_names_in_range(tu, seq_start, idx)?;
    Ok(crate::ast::statement_roles(tu, idx)?
        .into_iter()
        .filter(|(_, role)| *role == crate::ast::Role::Referenced)
        .all(|(name, _)| declared_before.contains(&name)))
}

/// `false` both when the trailing statement genuinely isn't usage-only and
/// when its AST node no longer resolves (spec §7: `Error::Structural` is
/// locally fatal, so refinement simply stops trimming rather than aborting
/// the whole candidate pair).
fn trailing_usage_only(seq: &StatementSequence) -> bool {
    if seq.is_empty() {
        return false;
    }
    let last = seq.end_idx - 1;
    match is_usage_only(&seq.tu, seq.start_idx, last) {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(error = %err, "skipping boundary refinement for statement: {err}");
            false
        }
    }
}

fn shrink(seq: &StatementSequence) -> StatementSequence {
    StatementSequence::new(
        seq.tu_id,
        seq.callable_idx,
        seq.start_idx,
        seq.end_idx - 1,
        &seq.tu,
    )
}

/// Attempts lockstep trailing trims of `seq1`/`seq2` as long as both sides'
/// last statement is usage-only, neither side would drop below
/// `opts.min_lines`, and the re-scored pair's `overall` does not fall
/// below `opts.threshold`. The first trim that would violate any of these
/// is rejected and refinement stops, returning the last accepted state
/// (spec §4.8: "stop and keep the last state that still passed").
pub fn refine(
    seq1: &StatementSequence,
    seq2: &StatementSequence,
    result: &SimilarityResult,
    cache: &NormalizeCache,
    opts: &Options,
) -> (StatementSequence, StatementSequence, SimilarityResult) {
    let mut cur1 = seq1.clone();
    let mut cur2 = seq2.clone();
    let mut cur_result = result.clone();

    loop {
        if cur1.len() <= opts.min_lines || cur2.len() <= opts.min_lines {
            break;
        }
        if !trailing_usage_only(&cur1) || !trailing_usage_only(&cur2) {
            break;
        }

        let next1 = shrink(&cur1);
        let next2 = shrink(&cur2);
        let next_result = match kernel::compute(&next1, &next2, cache, opts) {
            Ok(r) => r,
            Err(err) => {
                tracing::warn!(error = %err, "stopping boundary refinement early: {err}");
                break;
            }
        };

        if next_result.overall < opts.threshold {
            break;
        }

        cur1 = next1;
        cur2 = next2;
        cur_result = next_result;
    }

    (cur1, cur2, cur_result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_translation_unit;
    use std::rc::Rc;

    fn tu(src: &str) -> Rc<crate::ast::TranslationUnit> {
        Rc::new(parse_translation_unit("T.java", src).unwrap())
    }

    // `user`/`repo` (resp. `account`/`repo`) are declared locally so the
    // trailing calls are genuine usage-only candidates per spec §4.8: their
    // referenced names are all already declared within the sequence.
    const SRC_A: &str = r#"
        class Widget {
            void apply() {
                User user = new User();
                Repo repo = new Repo();
                user.setActive(true);
                user.setDeleted(false);
                repo.save(user);
                user.getId();
            }
        }
    "#;

    const SRC_B: &str = r#"
        class Widget {
            void apply() {
                User account = new User();
                Repo repo = new Repo();
                account.setActive(true);
                account.setDeleted(false);
                repo.save(account);
                account.getId();
            }
        }
    "#;

    #[test]
    fn trims_trailing_extra_statement_symmetrically() {
        let a = tu(SRC_A);
        let b = tu(SRC_B);
        let seq1 = StatementSequence::new(0, 0, 0, 6, &a);
        let seq2 = StatementSequence::new(1, 0, 0, 6, &b);
        let cache = NormalizeCache::new();
        let opts = Options {
            min_lines: 3,
            ..Options::default()
        };
        let initial = kernel::compute(&seq1, &seq2, &cache, &opts).unwrap();
        let (r1, r2, refined) = refine(&seq1, &seq2, &initial, &cache, &opts);
        assert_eq!(r1.len(), r2.len());
        assert!(r1.len() < seq1.len(), "expected at least one trailing trim");
        assert!(refined.overall >= initial.overall);
    }

    #[test]
    fn never_trims_below_min_lines() {
        let a = tu(SRC_A);
        let b = tu(SRC_B);
        let seq1 = StatementSequence::new(0, 0, 0, 6, &a);
        let seq2 = StatementSequence::new(1, 0, 0, 6, &b);
        let cache = NormalizeCache::new();
        let opts = Options {
            min_lines: 4,
            ..Options::default()
        };
        let initial = kernel::compute(&seq1, &seq2, &cache, &opts).unwrap();
        let (r1, r2, _) = refine(&seq1, &seq2, &initial, &cache, &opts);
        assert!(r1.len() >= opts.min_lines);
        assert!(r2.len() >= opts.min_lines);
    }

    #[test]
    fn refinement_never_lengthens_a_sequence() {
        let a = tu(SRC_A);
        let b = tu(SRC_B);
        let seq1 = StatementSequence::new(0, 0, 0, 6, &a);
        let seq2 = StatementSequence::new(1, 0, 0, 6, &b);
        let cache = NormalizeCache::new();
        let opts = Options {
            min_lines: 3,
            ..Options::default()
        };
        let initial = kernel::compute(&seq1, &seq2, &cache, &opts).unwrap();
        let (r1, r2, _) = refine(&seq1, &seq2, &initial, &cache, &opts);
        assert!(r1.len() <= seq1.len());
        assert!(r2.len() <= seq2.len());
    }
}
