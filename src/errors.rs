use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::SourceId;

/// Error type for collaborator, checkpoint, and configuration failures.
#[derive(Debug, Error)]
pub enum MinerError {
    /// Retryable upstream failure: network, rate limit, or 5xx.
    #[error("source '{source_id}' is unavailable: {reason}")]
    SourceUnavailable {
        /// Collaborator that failed.
        source_id: SourceId,
        /// Transport or status description.
        reason: String,
    },
    /// Non-retryable client error from the search collaborator.
    #[error("source '{source_id}' rejected the request with status {status}: {details}")]
    SourceRejected {
        /// Collaborator that rejected the request.
        source_id: SourceId,
        /// HTTP status.
        status: u16,
        /// Response body excerpt.
        details: String,
    },
    /// The text generator was unreachable or answered with an error.
    #[error("text generation failed: {0}")]
    Generation(String),
    /// The embedder failed or returned mismatched vectors.
    #[error("embedding failed: {0}")]
    Embedding(String),
    /// A stage input file does not exist.
    #[error("required input '{}' not found", .0.display())]
    MissingInput(PathBuf),
    /// A checkpoint could not be read back consistently.
    #[error("checkpoint failure: {0}")]
    Checkpoint(String),
    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Delimited-file encoding failure.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// JSON encoding or decoding failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// A grammar or rescue pattern failed to compile.
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

impl MinerError {
    /// True when the failure came from a retryable upstream condition.
    pub fn is_transient(&self) -> bool {
        matches!(self, MinerError::SourceUnavailable { .. })
    }
}
