use thiserror::Error;

/// Errors returned by Weights API operations.
#[derive(Error, Debug)]
pub enum WeightsError {
    /// The health probe or the transport layer failed. Always carries the
    /// text of the underlying failure.
    #[error("Weights API is not reachable at {endpoint}: {cause}")]
    Unreachable { endpoint: String, cause: String },

    /// The server returned a non-success HTTP status.
    #[error("Weights API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response was missing expected fields.
    #[error("{0}")]
    InvalidResponse(String),

    /// The server reported a terminal FAILED status while polling.
    #[error("Image generation failed: {0}")]
    GenerationFailed(String),

    /// The polling deadline elapsed before a terminal status was observed.
    #[error("Timed out waiting for generation to complete")]
    Timeout,

    /// The caller raised the cancellation flag while polling.
    #[error("Generation was cancelled")]
    Cancelled,

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, WeightsError>;
