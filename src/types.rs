//! Core data model (spec §3) not already covered by [`crate::token`],
//! [`crate::normalize`], or [`crate::fingerprint`].

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::ast::TranslationUnit;
use crate::span::Span;
use crate::variation::VariationAnalysis;

/// A contiguous slice of statements drawn from one callable body (spec §3).
/// Holds indices into its owning [`TranslationUnit`], never a borrowed
/// `Node` — this is what lets overlapping windows share cache entries
/// keyed by `(tu_id, stmt_idx)` without fighting Rust's borrow checker.
#[derive(Clone)]
pub struct StatementSequence {
    pub tu_id: usize,
    pub tu: Rc<TranslationUnit>,
    pub callable_idx: usize,
    pub start_idx: usize,
    pub end_idx: usize,
    pub span: Span,
}

impl StatementSequence {
    pub fn new(
        tu_id: usize,
        callable_idx: usize,
        start_idx: usize,
        end_idx: usize,
        tu: &Rc<TranslationUnit>,
    ) -> Self {
        let first = tu.stmt_span(start_idx);
        let last = tu.stmt_span(end_idx - 1);
        Self {
            tu_id,
            tu: Rc::clone(tu),
            callable_idx,
            start_idx,
            end_idx,
            span: Span::merge(&first, &last),
        }
    }

    pub fn len(&self) -> usize {
        self.end_idx - self.start_idx
    }

    pub fn is_empty(&self) -> bool {
        self.start_idx == self.end_idx
    }

    pub fn statement_indices(&self) -> std::ops::Range<usize> {
        self.start_idx..self.end_idx
    }

    pub fn callable(&self) -> &crate::ast::Callable {
        &self.tu.callables[self.callable_idx]
    }

    /// Stable total order over sequences (spec §4.9 `seq_order`), used for
    /// pair canonicity and cluster-primary selection.
    pub fn seq_order(&self) -> (&str, usize, usize, usize, usize) {
        (
            self.tu.path.as_str(),
            self.span.start_line,
            self.span.start_col,
            self.span.end_line,
            self.span.end_col,
        )
    }
}

impl std::fmt::Debug for StatementSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementSequence")
            .field("path", &self.tu.path)
            .field("callable_idx", &self.callable_idx)
            .field("range", &(self.start_idx, self.end_idx))
            .field("span", &self.span)
            .finish()
    }
}

/// A serializable, self-contained projection of a [`StatementSequence`]
/// for the final report — no `Rc<TranslationUnit>`, no tree-sitter state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceSummary {
    pub source_path: String,
    pub callable_name: String,
    pub owner_path: Vec<String>,
    pub span: Span,
    pub size: usize,
}

impl From<&StatementSequence> for SequenceSummary {
    fn from(seq: &StatementSequence) -> Self {
        let callable = seq.callable();
        Self {
            source_path: seq.tu.path.clone(),
            callable_name: callable.name.clone(),
            owner_path: callable.owner_path.clone(),
            span: seq.span,
            size: seq.len(),
        }
    }
}

/// `{ overall, lcs, levenshtein, structural, size1, size2, variations,
/// type_compatibility, can_refactor }` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub overall: f64,
    pub lcs: f64,
    pub levenshtein: f64,
    pub structural: f64,
    pub size1: usize,
    pub size2: usize,
    pub variations: VariationAnalysis,
    /// `is_feasible` from the type-compatibility analysis (spec §4.7); the
    /// per-position candidate-type map is downstream-refactoring detail
    /// the detection core does not retain.
    pub type_compatibility: bool,
    pub can_refactor: bool,
}

/// `(seq1, seq2, result)` with `seq_order(seq1) < seq_order(seq2)` (spec
/// §3, tested by property 9 in §8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityPair {
    pub seq1: SequenceSummary,
    pub seq2: SequenceSummary,
    pub result: SimilarityResult,
}

/// `{ primary, duplicates[], recommendation?, estimated_loc_reduction }`
/// (spec §3, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateCluster {
    pub primary: SequenceSummary,
    pub duplicates: Vec<SequenceSummary>,
    pub recommendation: Option<String>,
    pub estimated_loc_reduction: i64,
}

/// Per-translation-unit aggregate (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub source_path: String,
    pub total_sequences_considered: usize,
    pub candidate_pairs_analyzed: usize,
    pub surviving_pairs: Vec<SimilarityPair>,
    pub clusters: Vec<DuplicateCluster>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_translation_unit;

    fn tu(src: &str) -> Rc<TranslationUnit> {
        Rc::new(parse_translation_unit("T.java", src).unwrap())
    }

    const SRC: &str = r#"
        class Widget {
            void apply() {
                int a = 1;
                int b = 2;
                int c = 3;
                int d = 4;
                int e = 5;
            }
        }
    "#;

    #[test]
    fn seq_order_reflects_position() {
        let unit = tu(SRC);
        let a = StatementSequence::new(0, 0, 0, 2, &unit);
        let b = StatementSequence::new(0, 0, 2, 4, &unit);
        assert!(a.seq_order() < b.seq_order());
    }

    #[test]
    fn len_matches_statement_count() {
        let unit = tu(SRC);
        let seq = StatementSequence::new(0, 0, 0, 3, &unit);
        assert_eq!(seq.len(), 3);
    }

    /// `Report` and its nested types derive `Serialize`/`Deserialize` so an
    /// external collaborator can emit JSON without this crate owning the
    /// export format (spec §9 Design Note); round-tripping through
    /// `serde_json` here guards that contract.
    #[test]
    fn report_round_trips_through_json() {
        let report = Report {
            source_path: "Widget.java".to_string(),
            total_sequences_considered: 4,
            candidate_pairs_analyzed: 2,
            surviving_pairs: vec![SimilarityPair {
                seq1: SequenceSummary {
                    source_path: "Widget.java".to_string(),
                    callable_name: "apply".to_string(),
                    owner_path: vec!["Widget".to_string()],
                    span: Span {
                        start_line: 1,
                        start_col: 0,
                        end_line: 3,
                        end_col: 1,
                        start_byte: 0,
                        end_byte: 40,
                    },
                    size: 3,
                },
                seq2: SequenceSummary {
                    source_path: "Widget.java".to_string(),
                    callable_name: "apply".to_string(),
                    owner_path: vec!["Widget".to_string()],
                    span: Span {
                        start_line: 5,
                        start_col: 0,
                        end_line: 7,
                        end_col: 1,
                        start_byte: 60,
                        end_byte: 100,
                    },
                    size: 3,
                },
                result: SimilarityResult {
                    overall: 0.97,
                    lcs: 1.0,
                    levenshtein: 0.95,
                    structural: 0.96,
                    size1: 3,
                    size2: 3,
                    variations: VariationAnalysis::default(),
                    type_compatibility: true,
                    can_refactor: true,
                },
            }],
            clusters: Vec::new(),
        };

        let encoded = serde_json::to_string(&report).expect("Report serializes to JSON");
        let decoded: Report = serde_json::from_str(&encoded).expect("Report deserializes from JSON");
        assert_eq!(decoded.source_path, report.source_path);
        assert_eq!(decoded.surviving_pairs.len(), 1);
        assert_eq!(decoded.surviving_pairs[0].result.overall, 0.97);
    }
}
