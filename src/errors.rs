//! Error taxonomy for the detection core.
//!
//! `ConfigurationError` and `InternalInvariantViolation` are fatal: the
//! former is surfaced at construction, the latter aborts a run that hit a
//! bug. Every other variant is recoverable at the call site and is expected
//! to be aggregated into a per-file [`crate::types::Report`] rather than
//! propagated across the pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("structural error: {0}")]
    Structural(String),

    #[error("internal invariant violation: {0}")]
    InternalInvariantViolation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tree-sitter language error")]
    TreeSitterLanguage,

    #[error("tree-sitter parse error: {0}")]
    TreeSitterParse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
