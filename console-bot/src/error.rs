//! Error taxonomy for the console command workflow.

/// Result type for console workflow operations.
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Console workflow error type.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// Login rejected, or the login request never completed.
    #[error("Dashboard login failed: {0}")]
    Auth(String),

    /// A resource endpoint answered with a non-200 or non-"ok" response,
    /// or the request failed in transit (`status` is `None`).
    #[error("{operation} failed (status {status:?}): {detail}")]
    Remote {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },

    /// The response body did not have the expected shape.
    #[error("{operation} returned a malformed response: {detail}")]
    Decode {
        operation: &'static str,
        detail: String,
    },

    /// Listing never produced an empty page within the page bound.
    #[error("Conversation listing did not end within {max_pages} pages")]
    PaginationLimit { max_pages: u32 },

    /// Bulk deletion stopped at the first failing record.
    #[error("Bulk deletion aborted after {deleted} deletions: {source}")]
    BulkAborted {
        deleted: usize,
        #[source]
        source: Box<ConsoleError>,
    },

    /// Bad user input or a missing precondition.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Restart notification could not be delivered.
    #[error("Notification to {address} failed after {attempts} attempts")]
    Delivery { address: String, attempts: u32 },

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),
    /// Persisted state could not be read or written.
    #[error("State store error: {0}")]
    Store(#[from] std::io::Error),
}

impl ConsoleError {
    pub(crate) fn remote(operation: &'static str, status: Option<u16>, detail: impl Into<String>) -> Self {
        Self::Remote {
            operation,
            status,
            detail: detail.into(),
        }
    }

    pub(crate) fn decode(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Decode {
            operation,
            detail: detail.into(),
        }
    }

    /// Whether the dashboard rejected the bearer token.
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Remote { status: Some(401), .. })
    }

    /// Whether this is a user input problem rather than a remote failure.
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
