// src/error.rs

use thiserror::Error;

/// Why a single receipt document was dropped from the batch.
///
/// Absent fields are never errors; a field whose label did not match is
/// simply `None` on the record. Only a document whose bytes cannot be read
/// as text ends up here.
#[derive(Debug, Error)]
#[error("document {name} ({fingerprint}): {kind}")]
pub struct DocumentError {
    /// Caller-supplied document name (usually the file name).
    pub name: String,
    /// SHA-256 fingerprint of the raw bytes, so a retry can identify the
    /// exact payload that failed.
    pub fingerprint: String,
    pub kind: DocumentErrorKind,
}

#[derive(Debug, Error)]
pub enum DocumentErrorKind {
    #[error("not valid UTF-8: {0}")]
    Decode(#[from] std::str::Utf8Error),
}

/// Batch-level failures. These are terminal for the run and carry the
/// artifact path so the caller can retry.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to persist aggregate dataset to {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to read aggregate dataset from {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to write insight report to {path}: {source}")]
    Report {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Insight(#[from] InsightError),
}

/// Cell-level failures during insight computation. Whether these abort the
/// report or skip the offending row is decided by the configured
/// `NumericParsePolicy`; they are never silently coerced to zero.
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("column {column:?}: value {value:?} does not match \"<number> EUR\"")]
    NumericParse { column: &'static str, value: String },
    #[error("column {column:?}: value {value:?} is not an integer quantity")]
    QuantityParse { column: &'static str, value: String },
    #[error("unparseable order timestamp {value:?}")]
    DateParse { value: String },
}
