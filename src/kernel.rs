//! Similarity Kernel (spec §4.6): LCS, Levenshtein, and structural
//! alignment over the fuzzy `NormalizedNode` sequence, combined into a
//! weighted composite score, plus the variation/type analysis and
//! refactorability gate of spec §4.7.

use crate::config::{Options, Weights};
use crate::errors::Result;
use crate::normalize::{NormalizeCache, NormalizedNode};
use crate::types::{SimilarityResult, StatementSequence};
use crate::variation;

/// `O(1)` node equality via the cached hash of the normalized node (spec
/// §4.6): the hash is checked first and is the only comparison the DP
/// inner loops perform; the full string is consulted solely to rule out a
/// hash collision, never as the primary comparison.
fn node_eq(a: &NormalizedNode, b: &NormalizedNode) -> bool {
    a.fuzzy_hash == b.fuzzy_hash && a.fuzzy == b.fuzzy
}

fn fuzzy_nodes(seq: &StatementSequence, cache: &NormalizeCache) -> Result<Vec<NormalizedNode>> {
    seq.statement_indices()
        .map(|idx| cache.get(seq.tu_id, &seq.tu, idx))
        .collect()
}

/// spec §4.6 LCS similarity: `|LCS(A,B)| / max(|A|,|B|)`, space-optimized
/// to `O(min(|A|,|B|))` with two rolling rows.
pub fn lcs_similarity(a: &[NormalizedNode], b: &[NormalizedNode]) -> f64 {
    let denom = a.len().max(b.len());
    if denom == 0 {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut prev = vec![0usize; short.len() + 1];
    let mut curr = vec![0usize; short.len() + 1];
    for lv in long {
        for (j, sv) in short.iter().enumerate() {
            curr[j + 1] = if node_eq(lv, sv) {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[short.len()] as f64 / denom as f64
}

/// spec §4.6 Levenshtein similarity: `1 - edit_distance / max(|A|,|B|)`.
/// The shorter side always drives row width, per the mandatory swap in
/// spec §4.6.
pub fn levenshtein_similarity(a: &[NormalizedNode], b: &[NormalizedNode]) -> f64 {
    let denom = a.len().max(b.len());
    if denom == 0 {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut prev: Vec<usize> = (0..=short.len()).collect();
    let mut curr = vec![0usize; short.len() + 1];
    for (i, lv) in long.iter().enumerate() {
        curr[0] = i + 1;
        for (j, sv) in short.iter().enumerate() {
            curr[j + 1] = if node_eq(lv, sv) {
                prev[j]
            } else {
                1 + prev[j].min(prev[j + 1]).min(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let distance = prev[short.len()];
    1.0 - (distance as f64 / denom as f64)
}

/// spec §4.6 structural similarity: positional match rate,
/// `matches / max(|A|,|B|)`.
pub fn structural_similarity(a: &[NormalizedNode], b: &[NormalizedNode]) -> f64 {
    let denom = a.len().max(b.len());
    if denom == 0 {
        return 1.0;
    }
    let matches = a.iter().zip(b.iter()).filter(|(x, y)| node_eq(x, y)).count();
    matches as f64 / denom as f64
}

/// spec §4.6 composite score: `w_lcs*lcs + w_lev*lev + w_struct*struct`.
/// `Options::validate` already guarantees the weights sum to 1.0.
pub fn composite(lcs: f64, levenshtein: f64, structural: f64, weights: &Weights) -> f64 {
    weights.lcs * lcs + weights.levenshtein * levenshtein + weights.structural * structural
}

fn semantic_token_stream(seq: &StatementSequence) -> Result<Vec<crate::token::Token>> {
    let mut tokens = Vec::new();
    for idx in seq.statement_indices() {
        tokens.extend(crate::normalize::semantic_tokens(&seq.tu, idx)?);
    }
    Ok(tokens)
}

/// Full similarity computation for a candidate pair: the three kernel
/// scores, their weighted composite, the variation/type analysis of spec
/// §4.7, and the `can_refactor` gate (spec §4.7: `overall >= threshold ∧
/// ¬has_control_flow_differences ∧ is_feasible`).
pub fn compute(
    seq1: &StatementSequence,
    seq2: &StatementSequence,
    cache: &NormalizeCache,
    opts: &Options,
) -> Result<SimilarityResult> {
    let nodes1 = fuzzy_nodes(seq1, cache)?;
    let nodes2 = fuzzy_nodes(seq2, cache)?;

    let lcs = lcs_similarity(&nodes1, &nodes2);
    let levenshtein = levenshtein_similarity(&nodes1, &nodes2);
    let structural = structural_similarity(&nodes1, &nodes2);
    let overall = composite(lcs, levenshtein, structural, &opts.weights);

    let tokens1 = semantic_token_stream(seq1)?;
    let tokens2 = semantic_token_stream(seq2)?;
    let variations = variation::analyze(&tokens1, &tokens2);
    let type_compat = variation::type_compatibility(&variations);

    let can_refactor = overall >= opts.threshold
        && !variations.has_control_flow_differences
        && type_compat.is_feasible;

    Ok(SimilarityResult {
        overall,
        lcs,
        levenshtein,
        structural,
        size1: seq1.len(),
        size2: seq2.len(),
        variations,
        type_compatibility: type_compat.is_feasible,
        can_refactor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_translation_unit;
    use std::rc::Rc;

    fn tu(src: &str) -> Rc<crate::ast::TranslationUnit> {
        Rc::new(parse_translation_unit("T.java", src).unwrap())
    }

    const TWIN_A: &str = r#"
        class Widget {
            void apply() {
                user.setActive(true);
                user.setDeleted(false);
                repo.save(user);
                log.info("saved");
                counter++;
            }
        }
    "#;

    const TWIN_B: &str = r#"
        class Widget {
            void apply() {
                account.setActive(true);
                account.setDeleted(false);
                repo.save(account);
                log.info("persisted");
                counter++;
            }
        }
    "#;

    #[test]
    fn near_identical_sequences_score_high_and_are_refactorable() {
        let a = tu(TWIN_A);
        let b = tu(TWIN_B);
        let seq1 = StatementSequence::new(0, 0, 0, 5, &a);
        let seq2 = StatementSequence::new(1, 0, 0, 5, &b);
        let cache = NormalizeCache::new();
        let result = compute(&seq1, &seq2, &cache, &Options::default()).unwrap();
        assert!(result.overall >= 0.95, "overall={}", result.overall);
        assert!(!result.variations.has_control_flow_differences);
        assert!(result.can_refactor);
    }

    #[test]
    fn identity_similarity_is_one() {
        let a = tu(TWIN_A);
        let seq = StatementSequence::new(0, 0, 0, 5, &a);
        let cache = NormalizeCache::new();
        let result = compute(&seq, &seq, &cache, &Options::default()).unwrap();
        assert_eq!(result.overall, 1.0);
        assert_eq!(result.lcs, 1.0);
        assert_eq!(result.levenshtein, 1.0);
        assert_eq!(result.structural, 1.0);
    }

    #[test]
    fn kernel_scores_are_symmetric() {
        let a = tu(TWIN_A);
        let b = tu(TWIN_B);
        let seq1 = StatementSequence::new(0, 0, 0, 5, &a);
        let seq2 = StatementSequence::new(1, 0, 0, 5, &b);
        let cache = NormalizeCache::new();
        let forward = compute(&seq1, &seq2, &cache, &Options::default()).unwrap();
        let backward = compute(&seq2, &seq1, &cache, &Options::default()).unwrap();
        assert_eq!(forward.overall, backward.overall);
        assert_eq!(forward.lcs, backward.lcs);
        assert_eq!(forward.levenshtein, backward.levenshtein);
        assert_eq!(forward.structural, backward.structural);
    }

    #[test]
    fn control_flow_wrapping_drops_can_refactor() {
        const IF_SRC: &str = r#"
            class Widget {
                void apply() {
                    if (x > 0) {
                        repo.save(user);
                        log.info("ok");
                        counter++;
                        user.setActive(true);
                        user.setDeleted(false);
                    }
                }
            }
        "#;
        const WHILE_SRC: &str = r#"
            class Widget {
                void apply() {
                    while (x > 0) {
                        repo.save(user);
                        log.info("ok");
                        counter++;
                        user.setActive(true);
                        user.setDeleted(false);
                    }
                }
            }
        "#;
        let a = tu(IF_SRC);
        let b = tu(WHILE_SRC);
        let seq1 = StatementSequence::new(0, 0, 0, 1, &a);
        let seq2 = StatementSequence::new(1, 0, 0, 1, &b);
        let cache = NormalizeCache::new();
        let result = compute(&seq1, &seq2, &cache, &Options::default()).unwrap();
        assert!(result.variations.has_control_flow_differences);
        assert!(!result.can_refactor);
    }
}
