//! Error types for data-API requests
//!
//! Distinguishes the remote's application-level rejections (`Remote`,
//! with its machine-readable reason/message) from wire-contract
//! violations (`Protocol`), and keeps the post-refresh authorization
//! failure (`Authorization`) separate so callers can tell "key could not
//! be made to work" from an ordinary rejected request.

/// Errors from data-API operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed caller input, e.g. conflicting pagination markers.
    /// Raised before any request is issued.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The API rejected the request with 403 even after a key refresh.
    /// Fatal: the dispatcher never retries more than once.
    #[error("authorization rejected after key refresh: {0}")]
    Authorization(String),

    /// Application-level rejection (4xx/5xx) with the remote's reason and
    /// message fields intact.
    #[error("api rejected request ({status}): {reason}: {message}")]
    Remote {
        status: u16,
        reason: String,
        message: String,
    },

    /// Success status with an empty or unparseable body, or a payload
    /// that doesn't match the expected domain shape — a contract
    /// violation, not a remote rejection.
    #[error("malformed api response: {0}")]
    Protocol(String),

    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Token acquisition or refresh failed.
    #[error(transparent)]
    Token(#[from] brawl_auth::Error),
}

/// Result alias for data-API operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_carries_machine_readable_fields() {
        let err = Error::Remote {
            status: 404,
            reason: "notFound".into(),
            message: "Not found with tag undefined".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("404"), "got: {msg}");
        assert!(msg.contains("notFound"), "got: {msg}");
    }

    #[test]
    fn token_errors_convert_transparently() {
        let err: Error = brawl_auth::Error::Authentication("bad credentials".into()).into();
        assert!(matches!(err, Error::Token(_)));
        assert!(err.to_string().contains("bad credentials"));
    }
}
