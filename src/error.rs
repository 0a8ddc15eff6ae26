use thiserror::Error;

pub type Result<T> = std::result::Result<T, GmailError>;

/// Everything that can go wrong while inventorying a mailbox
///
/// Only [`GmailError::is_transient`] errors are worth another attempt; the
/// rest are reported once and the affected message or step is skipped.
#[derive(Error, Debug)]
pub enum GmailError {
    /// A Gmail response no other variant covers
    #[error("Gmail API error: {0}")]
    ApiError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// HTTP 429
    #[error("Rate limited by Gmail: {0}")]
    RateLimitExceeded(String),

    /// Connection reset, TLS handshake failure, timeout
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The response body ended early or did not decode
    #[error("Incomplete response: {0}")]
    IncompleteResponse(String),

    #[error("Gmail server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// The message was deleted between listing and fetching
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Request rejected: {0}")]
    BadRequest(String),

    /// Usually a missing `gmail.readonly` scope
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cache error: {0}")]
    CacheError(String),
}

impl GmailError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GmailError::RateLimitExceeded(_)
                | GmailError::ServerError { .. }
                | GmailError::NetworkError(_)
                | GmailError::IncompleteResponse(_)
        )
    }

    /// Map a non-success HTTP status onto a variant
    pub fn from_status(code: u16, reason: &str) -> Self {
        let message = format!("HTTP {} {}", code, reason);
        match code {
            400 => GmailError::BadRequest(message),
            403 => GmailError::Forbidden(message),
            404 => GmailError::MessageNotFound(message),
            429 => GmailError::RateLimitExceeded(message),
            500..=599 => GmailError::ServerError {
                status: code,
                message: reason.to_string(),
            },
            _ => GmailError::ApiError(message),
        }
    }
}

impl From<google_gmail1::Error> for GmailError {
    fn from(error: google_gmail1::Error) -> Self {
        use google_gmail1::Error as Api;

        match error {
            Api::Failure(response) => {
                let status = response.status();
                GmailError::from_status(
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("unknown status"),
                )
            }
            Api::BadRequest(body) => GmailError::BadRequest(body.to_string()),
            Api::HttpError(e) => GmailError::NetworkError(e.to_string()),
            Api::Io(e) => GmailError::NetworkError(e.to_string()),
            Api::JsonDecodeError(body, e) => GmailError::IncompleteResponse(format!(
                "{} after {} bytes",
                e,
                body.len()
            )),
            Api::MissingToken(e) => GmailError::AuthError(e.to_string()),
            other => GmailError::ApiError(other.to_string()),
        }
    }
}
