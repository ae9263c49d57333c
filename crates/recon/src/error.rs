use thiserror::Error;

use crate::path::FieldPath;

/// Field path parse and addressing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("field path is empty")]
    Empty,
    #[error("field path '{0}' contains an empty segment")]
    EmptySegment(String),
    /// An intermediate segment holds a scalar, so the path cannot descend.
    #[error("cannot descend into '{segment}' of '{path}': parent is not an object")]
    NotAContainer { path: String, segment: String },
    /// A sequence was addressed with a non-numeric or out-of-range segment.
    #[error("segment '{segment}' of '{path}' is not a valid index into a sequence of {len}")]
    IndexOutOfRange {
        path: String,
        segment: String,
        len: usize,
    },
}

/// Failure reported by the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// Network or model failure.
    #[error("extraction call failed: {0}")]
    Failed(String),
    /// The collaborator answered, but not with a batch.
    #[error("extraction response could not be parsed: {0}")]
    Malformed(String),
}

/// Persistence collaborator errors. Never fatal to the session.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stored state is corrupt: {0}")]
    Corrupt(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ReconError {
    #[error(transparent)]
    Path(#[from] PathError),
    /// Batch JSON did not have the expected shape.
    #[error("malformed extraction batch: {0}")]
    MalformedBatch(String),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("no candidate {index} for '{path}' ({available} available)")]
    CandidateOutOfRange {
        path: FieldPath,
        index: usize,
        available: usize,
    },
    /// TOML parse / deserialization error in a policy table.
    #[error("policy table parse error: {0}")]
    PolicyParse(String),
}
