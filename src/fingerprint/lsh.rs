//! Banded LSH index (spec §4.4): narrows the quadratic pair space to a
//! candidate set via bucket collisions on signature bands.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::config::LshOptions;
use crate::fingerprint::minhash::MinHashSignature;

pub type SeqId = usize;

const AVALANCHE: u64 = 0x9e3779b97f4a7c15;

/// Mixes a band's `R` signature rows together with an avalanche constant,
/// keeping only the low 56 bits (spec §4.4 `hash56`).
fn hash56(rows: &[u32]) -> u64 {
    let mut h: u64 = 0;
    for &row in rows {
        h ^= (row as u64).wrapping_mul(AVALANCHE);
        h = h.rotate_left(13).wrapping_add(row as u64);
    }
    h & 0x00ff_ffff_ffff_ffff
}

/// A single 64-bit bucket key: `(band_index << 56) | hash56(segment)`.
/// Never a `String` — allocation in this inner loop is explicitly
/// prohibited by spec §4.4.
fn bucket_key(band_index: usize, rows: &[u32]) -> u64 {
    ((band_index as u64) << 56) | hash56(rows)
}

/// Banded LSH index over [`MinHashSignature`]s. Guarded by a single
/// `RwLock` (spec §5's shared-resource note) rather than partitioned per
/// band, since lookups always touch every band for a query signature.
pub struct LshIndex {
    rows_per_band: usize,
    num_bands: usize,
    buckets: RwLock<HashMap<u64, Vec<SeqId>>>,
}

impl LshIndex {
    pub fn new(opts: &LshOptions) -> Self {
        Self {
            rows_per_band: opts.rows_per_band(),
            num_bands: opts.num_bands,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    fn bands<'a>(&self, sig: &'a MinHashSignature) -> impl Iterator<Item = (usize, &'a [u32])> {
        let rows_per_band = self.rows_per_band;
        (0..self.num_bands).map(move |b| {
            let start = b * rows_per_band;
            (b, &sig.0[start..start + rows_per_band])
        })
    }

    pub fn add(&self, id: SeqId, sig: &MinHashSignature) {
        let mut buckets = self.buckets.write().expect("lsh buckets lock poisoned");
        for (band, rows) in self.bands(sig) {
            buckets.entry(bucket_key(band, rows)).or_default().push(id);
        }
    }

    /// Sequences sharing at least one band-bucket with `sig`, deduplicated.
    pub fn query(&self, sig: &MinHashSignature) -> Vec<SeqId> {
        let buckets = self.buckets.read().expect("lsh buckets lock poisoned");
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for (band, rows) in self.bands(sig) {
            if let Some(ids) = buckets.get(&bucket_key(band, rows)) {
                for &id in ids {
                    if seen.insert(id) {
                        out.push(id);
                    }
                }
            }
        }
        out
    }

    /// Queries for existing candidates, then inserts `id` — so pairs are
    /// only ever emitted once, in insertion order, with no self-match.
    pub fn query_and_add(&self, id: SeqId, sig: &MinHashSignature) -> Vec<SeqId> {
        let candidates = self.query(sig);
        self.add(id, sig);
        candidates
    }

    pub fn clear(&self) {
        self.buckets
            .write()
            .expect("lsh buckets lock poisoned")
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig_of(rows: Vec<u32>) -> MinHashSignature {
        MinHashSignature(rows)
    }

    #[test]
    fn identical_signatures_collide_in_every_band() {
        let opts = LshOptions {
            num_hash_functions: 20,
            num_bands: 4,
            shingle_size: 3,
        };
        let index = LshIndex::new(&opts);
        let sig = sig_of((0..20).collect());
        index.add(1, &sig);
        assert_eq!(index.query(&sig), vec![1]);
    }

    #[test]
    fn one_shared_band_is_enough_to_retrieve_a_candidate() {
        let opts = LshOptions {
            num_hash_functions: 20,
            num_bands: 4,
            shingle_size: 3,
        };
        let index = LshIndex::new(&opts);
        let rows_a: Vec<u32> = (0..20).collect();
        let mut rows_b = rows_a.clone();
        // Disturb every band except the first.
        for r in rows_b.iter_mut().skip(5) {
            *r = r.wrapping_add(999);
        }
        index.add(1, &sig_of(rows_a));
        let hits = index.query(&sig_of(rows_b));
        assert_eq!(hits, vec![1]);
    }

    #[test]
    fn completely_disjoint_signatures_rarely_collide() {
        let opts = LshOptions {
            num_hash_functions: 20,
            num_bands: 4,
            shingle_size: 3,
        };
        let index = LshIndex::new(&opts);
        index.add(1, &sig_of((0..20).collect()));
        let far = sig_of((1000..1020).collect());
        assert!(index.query(&far).is_empty());
    }

    #[test]
    fn query_and_add_never_returns_self() {
        let opts = LshOptions {
            num_hash_functions: 20,
            num_bands: 4,
            shingle_size: 3,
        };
        let index = LshIndex::new(&opts);
        let sig = sig_of((0..20).collect());
        let first = index.query_and_add(1, &sig);
        assert!(first.is_empty());
        let second = index.query_and_add(2, &sig);
        assert_eq!(second, vec![1]);
    }

    #[test]
    fn clear_empties_the_index() {
        let opts = LshOptions {
            num_hash_functions: 20,
            num_bands: 4,
            shingle_size: 3,
        };
        let index = LshIndex::new(&opts);
        let sig = sig_of((0..20).collect());
        index.add(1, &sig);
        index.clear();
        assert!(index.query(&sig).is_empty());
    }
}
