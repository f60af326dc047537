//! Pre-Filter Chain (spec §4.5): cheap, order-preserving, short-circuiting
//! rejects applied before the expensive similarity kernel runs.

use crate::config::FilterOptions;
use crate::errors::Result;
use crate::normalize::NormalizeCache;
use crate::types::StatementSequence;

/// `true` iff the pair survives both filters.
pub fn passes(
    a: &StatementSequence,
    b: &StatementSequence,
    cache: &NormalizeCache,
    opts: &FilterOptions,
) -> Result<bool> {
    Ok(size_filter(a.len(), b.len(), opts.max_size_ratio)
        && structural_filter(a, b, cache, opts.min_structural_jaccard)?)
}

/// spec §4.5 step 1: reject if `|size1 - size2| / max(size1, size2) >
/// max_size_ratio`.
fn size_filter(size1: usize, size2: usize, max_size_ratio: f64) -> bool {
    let max = size1.max(size2);
    if max == 0 {
        return true;
    }
    let diff = size1.abs_diff(size2);
    (diff as f64 / max as f64) <= max_size_ratio
}

/// spec §4.5 step 2: Jaccard of the two fuzzy-normalized node multisets,
/// using each statement's cached fuzzy serialization as the multiset
/// element.
fn structural_filter(
    a: &StatementSequence,
    b: &StatementSequence,
    cache: &NormalizeCache,
    min_structural_jaccard: f64,
) -> Result<bool> {
    Ok(jaccard_multiset(a, b, cache)? >= min_structural_jaccard)
}

fn jaccard_multiset(a: &StatementSequence, b: &StatementSequence, cache: &NormalizeCache) -> Result<f64> {
    use std::collections::HashMap;

    let mut a_counts: HashMap<std::rc::Rc<str>, i64> = HashMap::new();
    for idx in a.statement_indices() {
        *a_counts.entry(cache.get(a.tu_id, &a.tu, idx)?.fuzzy).or_insert(0) += 1;
    }
    let mut b_counts: HashMap<std::rc::Rc<str>, i64> = HashMap::new();
    for idx in b.statement_indices() {
        *b_counts.entry(cache.get(b.tu_id, &b.tu, idx)?.fuzzy).or_insert(0) += 1;
    }

    let mut intersection = 0i64;
    for (key, &count_a) in &a_counts {
        if let Some(&count_b) = b_counts.get(key) {
            intersection += count_a.min(count_b);
        }
    }
    let total_a: i64 = a_counts.values().sum();
    let total_b: i64 = b_counts.values().sum();
    let union = total_a + total_b - intersection;
    if union == 0 {
        return Ok(1.0);
    }
    Ok(intersection as f64 / union as f64)
}
