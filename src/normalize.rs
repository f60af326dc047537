//! Normalizer: builds the two serialized views of a `NormalizedNode` (spec
//! §3, §4.2) and caches them per statement.
//!
//! Caching is keyed by `(translation unit identity, statement index)`, not
//! by serialized text — two distinct statements that happen to normalize
//! to identical text must stay distinct cache entries (spec §9 Design
//! Note), and two overlapping windows that share a statement should hit
//! the same entry rather than recompute it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{self, NormalizeMode, TranslationUnit};
use crate::errors::Result;
use crate::types::StatementSequence;
use crate::token::Token;

/// One statement's normalized pair (spec §3 `NormalizedNode`): the literal-
/// only serialization preserves identifier spellings, the fuzzy
/// serialization additionally anonymizes variable/field identifiers.
/// Method and type names are preserved in both.
#[derive(Debug, Clone)]
pub struct NormalizedNode {
    pub literal_only: Rc<str>,
    pub fuzzy: Rc<str>,
    pub fuzzy_hash: u64,
}

#[derive(Default)]
pub struct NormalizeCache {
    entries: RefCell<HashMap<(usize, usize), NormalizedNode>>,
}

impl NormalizeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `tu_id` is a caller-assigned stable identity for the translation
    /// unit (its index in the analysis run's translation-unit list), kept
    /// separate from any text-based hash so identical files at different
    /// positions never alias each other's cache entries.
    ///
    /// `Err(Error::Structural(_))` if `stmt_idx`'s source range no longer
    /// resolves (spec §7); the caller skips the statement/sequence rather
    /// than aborting the run.
    pub fn get(&self, tu_id: usize, tu: &TranslationUnit, stmt_idx: usize) -> Result<NormalizedNode> {
        if let Some(existing) = self.entries.borrow().get(&(tu_id, stmt_idx)) {
            return Ok(existing.clone());
        }
        let node = compute(tu, stmt_idx)?;
        self.entries
            .borrow_mut()
            .insert((tu_id, stmt_idx), node.clone());
        Ok(node)
    }
}

fn compute(tu: &TranslationUnit, stmt_idx: usize) -> Result<NormalizedNode> {
    let node = tu.stmt_node(stmt_idx)?;
    let mut literal_only = String::new();
    ast::serialize(node, &tu.source, NormalizeMode::LiteralOnly, &mut literal_only);
    let mut fuzzy = String::new();
    ast::serialize(node, &tu.source, NormalizeMode::Fuzzy, &mut fuzzy);
    let fuzzy_hash = fnv1a(fuzzy.as_bytes());
    Ok(NormalizedNode {
        literal_only: Rc::from(literal_only),
        fuzzy: Rc::from(fuzzy),
        fuzzy_hash,
    })
}

/// FNV-1a, used here purely as a cheap content fingerprint for equality
/// short-circuiting — never as a substitute for the serialized-string
/// equality check itself (two different strings can share a hash).
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// The semantic-token view for one statement (spec §4.2): built from the
/// literal-only normalized tree, so method/type/variable names keep their
/// spelling and only literals collapse to kind placeholders.
pub fn semantic_tokens(tu: &TranslationUnit, stmt_idx: usize) -> Result<Vec<Token>> {
    let node = tu.stmt_node(stmt_idx)?;
    let mut tokens = Vec::new();
    ast::flatten_tokens(node, &tu.source, NormalizeMode::LiteralOnly, &mut tokens, None);
    Ok(tokens)
}

/// The fuzzy token stream for one statement (spec §4.3): identifiers are
/// anonymized, so only literal kinds, control structure, and callable/type
/// names carry discriminating weight for shingling.
pub fn fuzzy_tokens(tu: &TranslationUnit, stmt_idx: usize) -> Result<Vec<Token>> {
    let node = tu.stmt_node(stmt_idx)?;
    let mut tokens = Vec::new();
    ast::flatten_tokens(node, &tu.source, NormalizeMode::Fuzzy, &mut tokens, None);
    Ok(tokens)
}

/// The statement-level fuzzy-token cache (spec §5): shared between MinHash
/// signature computation and the LSH index, keyed by statement node
/// identity exactly like [`NormalizeCache`]. `clear()` lets a caller bound
/// memory between projects.
#[derive(Default)]
pub struct FuzzyTokenCache {
    entries: RefCell<HashMap<(usize, usize), Rc<Vec<Token>>>>,
}

impl FuzzyTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tu_id: usize, tu: &TranslationUnit, stmt_idx: usize) -> Result<Rc<Vec<Token>>> {
        if let Some(existing) = self.entries.borrow().get(&(tu_id, stmt_idx)) {
            return Ok(Rc::clone(existing));
        }
        let tokens = Rc::new(fuzzy_tokens(tu, stmt_idx)?);
        self.entries
            .borrow_mut()
            .insert((tu_id, stmt_idx), Rc::clone(&tokens));
        Ok(tokens)
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// Concatenates a sequence's per-statement fuzzy token streams, in
/// statement order, via the shared [`FuzzyTokenCache`]. This is the stream
/// MinHash shingles and the LSH index bucket (spec §4.3, §4.4).
pub fn sequence_fuzzy_tokens(seq: &StatementSequence, cache: &FuzzyTokenCache) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    for idx in seq.statement_indices() {
        tokens.extend(cache.get(seq.tu_id, &seq.tu, idx)?.iter().cloned());
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_translation_unit;

    fn first_stmt(src: &str) -> (TranslationUnit, usize) {
        let tu = parse_translation_unit("T.java", src).unwrap();
        assert!(!tu.statements.is_empty(), "expected at least one statement");
        (tu, 0)
    }

    const SAMPLE: &str = r#"
        class Widget {
            void apply() {
                int total = 1;
                System.out.println("hi");
            }
        }
    "#;

    #[test]
    fn fuzzy_anonymizes_identifiers_literal_only_preserves_them() {
        let (tu, idx) = first_stmt(SAMPLE);
        let cache = NormalizeCache::new();
        let node = cache.get(0, &tu, idx).unwrap();
        assert!(node.literal_only.contains("total"));
        assert!(!node.fuzzy.contains("total"));
        assert!(node.fuzzy.contains("VAR"));
    }

    #[test]
    fn cache_is_stable_across_repeated_lookups() {
        let (tu, idx) = first_stmt(SAMPLE);
        let cache = NormalizeCache::new();
        let a = cache.get(0, &tu, idx).unwrap();
        let b = cache.get(0, &tu, idx).unwrap();
        assert_eq!(a.fuzzy_hash, b.fuzzy_hash);
        assert_eq!(a.fuzzy, b.fuzzy);
    }

    #[test]
    fn distinct_tu_ids_never_collide_even_with_identical_text() {
        let (tu, idx) = first_stmt(SAMPLE);
        let cache = NormalizeCache::new();
        let a = cache.get(0, &tu, idx).unwrap();
        let b = cache.get(1, &tu, idx).unwrap();
        // Same text, different identity: both entries are cached
        // independently even though their content is equal.
        assert_eq!(a.fuzzy, b.fuzzy);
        assert_eq!(cache.entries.borrow().len(), 2);
    }

    #[test]
    fn fuzzy_token_cache_is_stable_and_clearable() {
        let (tu, idx) = first_stmt(SAMPLE);
        let cache = FuzzyTokenCache::new();
        let a = cache.get(0, &tu, idx).unwrap();
        let b = cache.get(0, &tu, idx).unwrap();
        assert_eq!(*a, *b);
        cache.clear();
        assert!(cache.entries.borrow().is_empty());
    }

    #[test]
    fn sequence_fuzzy_tokens_concatenates_in_order() {
        use crate::types::StatementSequence;
        use std::rc::Rc;

        let tu = Rc::new(parse_translation_unit("T.java", SAMPLE).unwrap());
        let seq = StatementSequence::new(0, 0, 0, 2, &tu);
        let cache = FuzzyTokenCache::new();
        let tokens = sequence_fuzzy_tokens(&seq, &cache).unwrap();
        let expected_len = fuzzy_tokens(&tu, 0).unwrap().len() + fuzzy_tokens(&tu, 1).unwrap().len();
        assert_eq!(tokens.len(), expected_len);
    }
}
