//! Error types for the nowbridge SDK.
//!
//! [`TransportError`] is internal to a single request. Public client
//! operations convert it into a [`NowError`] with the operation's kind.

use nowbridge_core::{ErrorKind, NowError};
use std::time::Duration;

/// Errors raised by the request engine.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The platform answered with a non-success status, or the
    /// authenticator failed. Already classified.
    #[error(transparent)]
    Api(#[from] NowError),

    /// Network-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The attempt exceeded the configured timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// A response body that is not valid JSON, e.g. the HTML page of a
    /// hibernating instance.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl TransportError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api(err) => err.is_retryable(),
            Self::Http(_) | Self::Timeout(_) | Self::Json(_) => true,
            Self::InvalidUrl(_) => false,
        }
    }

    /// Convert into the public error type.
    ///
    /// Errors that already carry a kind pass through unchanged; anything
    /// else is wrapped as `fallback` with `context` prefixed to the message.
    pub fn into_now_error(self, fallback: ErrorKind, context: &str) -> NowError {
        match self {
            Self::Api(err) => err,
            other => NowError::new(fallback, format!("{}: {}", context, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_errors_pass_through() {
        let err = TransportError::Api(NowError::not_found("Record not found"));
        let converted = err.into_now_error(ErrorKind::QueryFailed, "Failed to query incident");

        assert_eq!(converted.kind(), ErrorKind::NotFound);
        assert_eq!(converted.message(), "Record not found");
    }

    #[test]
    fn test_untyped_errors_are_wrapped() {
        let err = TransportError::Timeout(Duration::from_secs(30));
        let converted = err.into_now_error(ErrorKind::CreateFailed, "Failed to create incident");

        assert_eq!(converted.kind(), ErrorKind::CreateFailed);
        assert_eq!(
            converted.message(),
            "Failed to create incident: Request timed out after 30s"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(TransportError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(TransportError::Api(NowError::new(ErrorKind::ApiError, "HTTP 503")).is_retryable());
        assert!(!TransportError::Api(NowError::authentication("expired")).is_retryable());

        let html = serde_json::from_str::<serde_json::Value>("<html></html>").unwrap_err();
        assert!(TransportError::Json(html).is_retryable());
        assert!(!TransportError::InvalidUrl(url::ParseError::EmptyHost).is_retryable());
    }
}
