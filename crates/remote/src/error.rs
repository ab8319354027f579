use thiserror::Error;

/// Errors returned by a `CartBackend`.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The collaborator understood the request and refused it with a reason
    /// (invalid coupon, insufficient stock, empty cart, ...).
    #[error("Rejected by collaborator: {0}")]
    Rejected(String),

    /// Non-2xx response that is not a business rejection: any 5xx, or a
    /// 4xx without a parseable reason.
    #[error("Unexpected response status {status}")]
    Status { status: u16 },

    /// The requested record does not exist.
    #[error("Not found")]
    NotFound,

    /// The response parsed but violates a pricing invariant.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The collaborator could not be reached.
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    /// An HTTP client error occurred (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RemoteError {
    /// Returns true for a well-formed business rejection.
    pub fn is_rejection(&self) -> bool {
        matches!(self, RemoteError::Rejected(_))
    }
}

/// Result type for collaborator operations.
pub type Result<T> = std::result::Result<T, RemoteError>;
