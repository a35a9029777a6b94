//! Error taxonomy for the recorder and its transport boundary.

use thiserror::Error;

/// Fatal session-level failures, raised at the `release`/`shutdown`
/// checkpoints rather than at the point of detection so that a single
/// session can accumulate multiple diagnostics.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Entries were consumed in a different relative order than recorded.
    #[error("Out of Order Recordings: {0}")]
    OutOfOrder(String),

    /// Cassette entries remained unmatched when the session was released.
    #[error("Unmatched Recordings: {0}")]
    Unmatched(String),

    /// The cassette folder contains files no session accounted for.
    #[error("Unexpected file(s) in cassette folder: {0}")]
    UnexpectedFiles(String),

    /// The recorder was configured with conflicting or invalid options.
    #[error("invalid recorder configuration: {0}")]
    Config(String),

    /// The cassette file could not be read, parsed, or written.
    #[error("cassette store failure: {0}")]
    Store(String),
}

/// Failures surfaced to the code under test through the transport seam.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// No pending cassette entry matched the outbound request.
    #[error("no match for request {key}")]
    NoMatch {
        /// Composite `method scope+path` key of the unmatched request.
        key: String,
    },

    /// The underlying HTTP client failed.
    #[error("http transport failure: {0}")]
    Http(String),
}

impl TransportError {
    /// Status code this failure maps to at the transport boundary.
    ///
    /// A missing recording is reported as a server-class failure instead of
    /// 404 so it cannot be confused with a legitimately absent resource on
    /// the real API.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::NoMatch { .. } => 500,
            Self::Http(_) => 502,
        }
    }
}
