//! MinHash signatures over a sequence's fuzzy token stream (spec §4.3).

use crate::config::LshOptions;
use crate::token::Token;

/// Fixed-length vector of 32-bit integers produced from a sequence's token
/// stream (spec §3 `MinHashSignature`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinHashSignature(pub Vec<u32>);

impl MinHashSignature {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fraction of equal rows; an unbiased estimator of shingle-set Jaccard
    /// similarity with standard error `≈ 1/√H` (spec §4.3).
    pub fn estimated_jaccard(&self, other: &MinHashSignature) -> f64 {
        if self.0.is_empty() || self.0.len() != other.0.len() {
            return 0.0;
        }
        let equal = self
            .0
            .iter()
            .zip(other.0.iter())
            .filter(|(a, b)| a == b)
            .count();
        equal as f64 / self.0.len() as f64
    }
}

/// Deterministic per-token hash: a token's kind tag and normalized spelling
/// are the only inputs, so two tokens that `Token::matches` always hash
/// identically under fuzzy normalization.
fn token_hash(token: &Token) -> u32 {
    let mut h: u64 = 0xcbf29ce484222325;
    for byte in tag_bytes(token) {
        h ^= byte as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    (h >> 32) as u32
}

fn tag_bytes(token: &Token) -> Vec<u8> {
    format!("{:?}:{}", token.kind, token.normalized).into_bytes()
}

/// Rolling polynomial hash over one shingle: `h = 31*h + token_hash`.
fn shingle_hash(shingle: &[Token]) -> u32 {
    let mut h: u32 = 0;
    for tok in shingle {
        h = h.wrapping_mul(31).wrapping_add(token_hash(tok));
    }
    h
}

/// Contiguous k-grams of `tokens`; if `tokens` is shorter than `k`, the
/// whole stream is the single shingle (spec §4.3).
fn shingles(tokens: &[Token], k: usize) -> Vec<&[Token]> {
    if tokens.is_empty() {
        return Vec::new();
    }
    if tokens.len() < k {
        return vec![tokens];
    }
    (0..=tokens.len() - k).map(|i| &tokens[i..i + k]).collect()
}

/// 64-bit seed for signature row `i` (spec §4.3).
fn seed(i: usize) -> u64 {
    (i as u64)
        .wrapping_mul(2654435761)
        .wrapping_add(0x9e3779b9)
}

/// SplitMix/MurmurHash3-style 64→32 finalizer: two xor-shift/multiply
/// rounds, returning the high 32 bits of the mixed state.
fn mix(x: u64, seed: u64) -> u32 {
    let mut z = x ^ seed;
    z ^= z >> 33;
    z = z.wrapping_mul(0xff51afd7ed558ccd);
    z ^= z >> 33;
    z = z.wrapping_mul(0xc4ceb9fe1a85ec53);
    z ^= z >> 33;
    (z >> 32) as u32
}

/// Builds a sequence's signature from its fuzzy token stream.
pub fn signature(fuzzy_tokens: &[Token], opts: &LshOptions) -> MinHashSignature {
    let shingle_hashes: Vec<u32> = shingles(fuzzy_tokens, opts.shingle_size)
        .iter()
        .map(|s| shingle_hash(s))
        .collect();

    if shingle_hashes.is_empty() {
        return MinHashSignature(vec![0; opts.num_hash_functions]);
    }

    let rows = (0..opts.num_hash_functions)
        .map(|i| {
            let seed_i = seed(i);
            shingle_hashes
                .iter()
                .map(|&h| mix(h as u64, seed_i))
                .min()
                .expect("shingle_hashes is non-empty")
        })
        .collect();
    MinHashSignature(rows)
}
