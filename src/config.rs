//! Pipeline configuration (spec §6).
//!
//! A single immutable [`Options`] value is threaded through the pipeline —
//! there is no process-wide settings store (Design Note, spec §9). Reading
//! options from a file or the command line is an external collaborator's
//! job; this module only defines the recognized keys, their defaults, the
//! named presets, and construction-time validation.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};

/// Composite-score weights for the similarity kernel (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub lcs: f64,
    pub levenshtein: f64,
    pub structural: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            lcs: 0.40,
            levenshtein: 0.40,
            structural: 0.20,
        }
    }
}

/// LSH-specific configuration (spec §4.3, §4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LshOptions {
    pub num_hash_functions: usize,
    pub num_bands: usize,
    pub shingle_size: usize,
}

impl Default for LshOptions {
    fn default() -> Self {
        Self {
            num_hash_functions: 100,
            num_bands: 20,
            shingle_size: 3,
        }
    }
}

impl LshOptions {
    /// Rows per band; `H` must be evenly divisible by `B`.
    pub fn rows_per_band(&self) -> usize {
        self.num_hash_functions / self.num_bands
    }
}

/// Pre-filter thresholds (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub max_size_ratio: f64,
    pub min_structural_jaccard: f64,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            max_size_ratio: 0.30,
            min_structural_jaccard: 0.50,
        }
    }
}

/// Top-level pipeline options (spec §6's key table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Options {
    pub min_lines: usize,
    pub threshold: f64,
    pub weights: Weights,
    pub include_tests: bool,
    pub exclude_patterns: Vec<String>,
    pub max_window_growth: usize,
    pub maximal_only: bool,
    pub enable_lsh: bool,
    pub enable_boundary_refinement: bool,
    pub lsh: LshOptions,
    pub filter: FilterOptions,
    /// Clustering equivalence threshold (spec §4.9); distinct from
    /// `threshold`, which gates reporting of a pair.
    pub clustering_threshold: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            min_lines: 5,
            threshold: 0.75,
            weights: Weights::default(),
            include_tests: false,
            exclude_patterns: crate::glob::default_excludes(),
            max_window_growth: 5,
            maximal_only: true,
            enable_lsh: true,
            enable_boundary_refinement: true,
            lsh: LshOptions::default(),
            filter: FilterOptions::default(),
            clustering_threshold: 0.85,
        }
    }
}

impl Options {
    /// `thr 0.90, min 7` per spec §6.
    pub fn strict() -> Self {
        Self {
            threshold: 0.90,
            min_lines: 7,
            ..Self::default()
        }
    }

    /// `thr 0.60, min 3` per spec §6.
    pub fn lenient() -> Self {
        Self {
            threshold: 0.60,
            min_lines: 3,
            ..Self::default()
        }
    }

    /// Same thresholds as `moderate` (the default), but used as the named
    /// identity preset so callers can always refer to a preset by name.
    pub fn moderate() -> Self {
        Self::default()
    }

    /// Widens retrieval for exploratory runs and includes test callables.
    pub fn aggressive() -> Self {
        Self {
            threshold: 0.65,
            filter: FilterOptions {
                max_size_ratio: 0.45,
                min_structural_jaccard: 0.35,
            },
            include_tests: true,
            ..Self::default()
        }
    }

    /// Tuned for JUnit/Mockito setup-method duplication; includes tests.
    pub fn test_setup() -> Self {
        Self {
            min_lines: 3,
            threshold: 0.70,
            include_tests: true,
            ..Self::default()
        }
    }

    /// Construction-time validation (spec §7 `ConfigurationError`).
    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        let sum = w.lcs + w.levenshtein + w.structural;
        if (sum - 1.0).abs() > 1e-3 {
            return Err(Error::Configuration(format!(
                "weights must sum to 1.0 within 1e-3, got {sum}"
            )));
        }
        if w.lcs < 0.0 || w.levenshtein < 0.0 || w.structural < 0.0 {
            return Err(Error::Configuration(
                "weights must be non-negative".to_string(),
            ));
        }
        if self.max_window_growth == usize::MAX {
            // usize can't go negative; this guards against an overflowed
            // subtraction upstream slipping in as a sentinel.
            return Err(Error::Configuration(
                "max_window_growth is not a valid size".to_string(),
            ));
        }
        for (name, v) in [
            ("threshold", self.threshold),
            ("clustering_threshold", self.clustering_threshold),
            ("filter.max_size_ratio", self.filter.max_size_ratio),
            (
                "filter.min_structural_jaccard",
                self.filter.min_structural_jaccard,
            ),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::Configuration(format!(
                    "{name} must be within [0, 1], got {v}"
                )));
            }
        }
        if self.lsh.num_bands == 0 {
            return Err(Error::Configuration(
                "lsh.num_bands must be greater than 0".to_string(),
            ));
        }
        if self.lsh.num_hash_functions % self.lsh.num_bands != 0 {
            return Err(Error::Configuration(format!(
                "lsh.num_hash_functions ({}) must be divisible by lsh.num_bands ({})",
                self.lsh.num_hash_functions, self.lsh.num_bands
            )));
        }
        if self.lsh.shingle_size == 0 {
            return Err(Error::Configuration(
                "lsh.shingle_size must be greater than 0".to_string(),
            ));
        }
        if self.min_lines == 0 {
            return Err(Error::Configuration(
                "min_lines must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_valid() {
        assert!(Options::default().validate().is_ok());
    }

    #[test]
    fn all_presets_are_valid() {
        for opts in [
            Options::moderate(),
            Options::strict(),
            Options::lenient(),
            Options::aggressive(),
            Options::test_setup(),
        ] {
            assert!(opts.validate().is_ok());
        }
    }

    #[test]
    fn weights_not_summing_to_one_is_rejected() {
        let opts = Options {
            weights: Weights {
                lcs: 0.5,
                levenshtein: 0.5,
                structural: 0.1,
            },
            ..Options::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn mismatched_bands_and_hashes_is_rejected() {
        let opts = Options {
            lsh: LshOptions {
                num_hash_functions: 101,
                num_bands: 20,
                shingle_size: 3,
            },
            ..Options::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        let opts = Options {
            threshold: 1.5,
            ..Options::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn aggressive_and_test_setup_include_tests_others_dont() {
        assert!(Options::aggressive().include_tests);
        assert!(Options::test_setup().include_tests);
        assert!(!Options::moderate().include_tests);
        assert!(!Options::strict().include_tests);
        assert!(!Options::lenient().include_tests);
    }
}
