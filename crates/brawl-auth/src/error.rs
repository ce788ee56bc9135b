//! Error types for portal and key-lifecycle operations
//!
//! The taxonomy follows the retry rules: `Validation` and `Authentication`
//! are never retried, `Remote` carries the portal's application-level
//! rejection, `Protocol` flags a success-status body that violated the
//! wire contract, and `Acquisition` wraps any of these with the lifecycle
//! step that failed plus the manager's cached state for diagnosis.

use std::net::Ipv4Addr;

/// Errors from portal-session and token-lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed caller input (bad IP format, empty key id). Raised before
    /// any network I/O.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Portal login failed — credentials missing/wrong or no session
    /// cookie returned. Aborts the whole call chain.
    #[error("portal login failed: {0}")]
    Authentication(String),

    /// The portal responded but refused the operation.
    #[error("portal rejected request: {0}")]
    Remote(String),

    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// A success-status response whose body was empty or unparseable.
    #[error("malformed portal response: {0}")]
    Protocol(String),

    /// A token-acquisition attempt failed. Identifies the sub-step
    /// (login vs ip-discovery vs list-keys vs create-key) plus the
    /// binding being replaced and the address involved, to aid diagnosis
    /// of partial failures.
    #[error(
        "token acquisition failed at {step} (prior key: {key_id:?}, address: {address:?}): {source}"
    )]
    Acquisition {
        step: &'static str,
        key_id: Option<String>,
        address: Option<Ipv4Addr>,
        #[source]
        source: Box<Error>,
    },
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
