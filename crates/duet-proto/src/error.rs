//! Error types for envelope decoding.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Errors produced while decoding an inbound frame.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The frame exceeded [`crate::MAX_ENVELOPE_LEN`].
    #[error("envelope too long: {actual} bytes (limit: {limit})")]
    TooLong {
        /// Actual frame length.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// The frame was not valid JSON or did not match the tagged schema.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Static label for metrics and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TooLong { .. } => "too_long",
            Self::Malformed(_) => "malformed",
        }
    }
}
