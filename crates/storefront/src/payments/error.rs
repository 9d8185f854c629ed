//! Payment provider error types.

use thiserror::Error;

/// Errors that can occur when talking to the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a provider response or event.
    #[error("parse error: {0}")]
    Parse(String),

    /// Signature header is malformed.
    #[error("invalid signature header: {0}")]
    InvalidSignatureHeader(String),

    /// Client misconfigured (bad key or URL).
    #[error("configuration error: {0}")]
    Config(String),
}
