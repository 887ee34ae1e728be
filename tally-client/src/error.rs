use thiserror::Error;

/// Failure classes callers handle differently (see tally-cli pipelines).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Remote dependency still failing after all retries. The caller must
    /// abort the run with no side effects, never treat it as "no data".
    #[error("{service} unavailable after {attempts} attempt(s): {message}")]
    ServiceUnavailable {
        service: &'static str,
        attempts: u32,
        message: String,
    },

    /// A category name doesn't resolve against the budget's set. Callers
    /// fall back to the default category; never fatal.
    #[error("category '{0}' is not in the budget's category set")]
    InvalidCategory(String),

    /// The model answered, but not in the expected schema. The affected
    /// batch degrades to low-confidence fallback and the run continues.
    #[error("malformed model response: {0}")]
    MalformedModelResponse(String),

    /// The channel post failed. State is persisted first, so the batch
    /// survives for a notification retry.
    #[error("channel post failed: {0}")]
    NotifyFailed(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
