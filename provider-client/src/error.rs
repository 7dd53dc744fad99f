//! Error types for the provider client

use thiserror::Error;

use crate::signer::SignerError;

/// Provider client error
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider does not advertise the named service route
    #[error("Provider does not support route: {route}")]
    RouteNotSupported { route: String },

    /// HTTP request failed before a response arrived
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("Provider error {status}: {message}")]
    Server {
        status: u16,
        message: String,
        /// Parsed JSON error body, when the provider sent one
        body: Option<serde_json::Value>,
    },

    /// Provider answered successfully but the body could not be parsed
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Request body could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Signing capability failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Provider URL could not be parsed
    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),

    /// Caller supplied arguments the protocol cannot express
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Build a server error from a status code and raw response body.
    ///
    /// A JSON body is kept verbatim; its `error` (or `message`) field becomes
    /// the display message when present.
    pub fn from_response_body(status: u16, text: &str) -> Self {
        let body = serde_json::from_str::<serde_json::Value>(text).ok();
        let message = body
            .as_ref()
            .and_then(|b| b.get("error").or_else(|| b.get("message")))
            .and_then(|m| m.as_str())
            .map(String::from)
            .unwrap_or_else(|| text.to_string());

        ProviderError::Server {
            status,
            message,
            body,
        }
    }

    /// Whether this error is the caller's own cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProviderError::Cancelled)
    }

    /// Parsed provider error body, if any.
    pub fn server_body(&self) -> Option<&serde_json::Value> {
        match self {
            ProviderError::Server { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}

impl From<SignerError> for ProviderError {
    fn from(e: SignerError) -> Self {
        ProviderError::Signing(e.to_string())
    }
}

impl From<url::ParseError> for ProviderError {
    fn from(e: url::ParseError) -> Self {
        ProviderError::InvalidUrl(e.to_string())
    }
}

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;
