use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("page unavailable: {0}")]
    PageUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl WatchError {
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn page_unavailable(msg: impl Into<String>) -> Self {
        Self::PageUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<&'static str>,
    pub retryable: bool,
}

impl From<&WatchError> for ErrorResponse {
    fn from(err: &WatchError) -> Self {
        let (code, suggestion, retryable) = match err {
            WatchError::Auth(_) => (
                "AUTH_ERROR",
                Some("Set GMAIL_ACCESS_TOKEN or the GOOGLE_* refresh-token variables"),
                false,
            ),
            WatchError::NotFound(_) => (
                "NOT_FOUND",
                Some("Check the vendor address or the thread subject"),
                false,
            ),
            WatchError::Network(_) => (
                "NETWORK_ERROR",
                Some("Check internet connection and try again"),
                true,
            ),
            WatchError::Api(_) => ("API_ERROR", None, false),
            WatchError::MalformedResponse(_) => ("MALFORMED_RESPONSE", None, false),
            WatchError::InvalidInput(_) => ("INVALID_INPUT", None, false),
            WatchError::Storage(_) => (
                "STORAGE_ERROR",
                Some("Check that VENDORWATCH_DATA_DIR is writable"),
                false,
            ),
            WatchError::PageUnavailable(_) => (
                "PAGE_UNAVAILABLE",
                Some("Set VENDORWATCH_PAGE_HTML or pass a subject explicitly"),
                false,
            ),
            WatchError::Internal(_) => ("INTERNAL_ERROR", Some("Unexpected error"), true),
        };
        Self {
            code,
            message: err.to_string(),
            suggestion,
            retryable,
        }
    }
}

impl ErrorResponse {
    pub fn to_compact(&self) -> String {
        let mut parts = vec![format!("[{}] {}", self.code, self.message)];
        if let Some(s) = self.suggestion {
            parts.push(format!("Suggestion: {s}"));
        }
        if self.retryable {
            parts.push("(retryable)".to_string());
        }
        parts.join(" | ")
    }
}
