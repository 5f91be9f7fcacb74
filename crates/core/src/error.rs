//! Error taxonomy shared by the client and the tool router.
//!
//! Every failure surfaced by nowbridge is a [`NowError`] carrying a
//! machine-readable [`ErrorKind`], so callers can branch on the kind
//! without parsing message text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for nowbridge operations.
pub type NowResult<T> = Result<T, NowError>;

/// Machine-readable error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    AuthenticationFailed,
    InvalidRequest,
    NotFound,
    InsufficientPrivileges,
    ApiError,
    QueryFailed,
    CreateFailed,
    UpdateFailed,
    DeleteFailed,
    WriteNotEnabled,
    CmdbWriteNotEnabled,
    ScriptingNotEnabled,
    NowAssistNotEnabled,
    AtfNotEnabled,
    UnknownTool,
    NotImplemented,
}

impl ErrorKind {
    /// Wire name of the kind, e.g. `AUTHENTICATION_FAILED`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::InsufficientPrivileges => "INSUFFICIENT_PRIVILEGES",
            Self::ApiError => "API_ERROR",
            Self::QueryFailed => "QUERY_FAILED",
            Self::CreateFailed => "CREATE_FAILED",
            Self::UpdateFailed => "UPDATE_FAILED",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::WriteNotEnabled => "WRITE_NOT_ENABLED",
            Self::CmdbWriteNotEnabled => "CMDB_WRITE_NOT_ENABLED",
            Self::ScriptingNotEnabled => "SCRIPTING_NOT_ENABLED",
            Self::NowAssistNotEnabled => "NOW_ASSIST_NOT_ENABLED",
            Self::AtfNotEnabled => "ATF_NOT_ENABLED",
            Self::UnknownTool => "UNKNOWN_TOOL",
            Self::NotImplemented => "NOT_IMPLEMENTED",
        }
    }

    /// Map a non-success HTTP status to an error kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidRequest,
            401 => Self::AuthenticationFailed,
            403 => Self::InsufficientPrivileges,
            404 => Self::NotFound,
            _ => Self::ApiError,
        }
    }

    /// Kinds that indicate a caller or configuration problem. Requests
    /// failing with one of these are never retried.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed | Self::InvalidRequest | Self::NotFound
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single error type of the system.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct NowError {
    kind: ErrorKind,
    message: String,
}

impl NowError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        !self.kind.is_terminal()
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthenticationFailed, message)
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::new(ErrorKind::UnknownTool, format!("Unknown tool: {}", name))
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorKind::from_status(400), ErrorKind::InvalidRequest);
        assert_eq!(ErrorKind::from_status(401), ErrorKind::AuthenticationFailed);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::InsufficientPrivileges);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_status(500), ErrorKind::ApiError);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::ApiError);
    }

    #[test]
    fn test_terminal_kinds_are_not_retryable() {
        assert!(!NowError::authentication("bad creds").is_retryable());
        assert!(!NowError::invalid_request("bad query").is_retryable());
        assert!(!NowError::not_found("gone").is_retryable());

        assert!(NowError::new(ErrorKind::ApiError, "boom").is_retryable());
        assert!(NowError::new(ErrorKind::InsufficientPrivileges, "acl").is_retryable());
    }

    #[test]
    fn test_kind_serializes_as_wire_name() {
        let json = serde_json::to_string(&ErrorKind::CmdbWriteNotEnabled).unwrap();
        assert_eq!(json, "\"CMDB_WRITE_NOT_ENABLED\"");

        let kind: ErrorKind = serde_json::from_str("\"UNKNOWN_TOOL\"").unwrap();
        assert_eq!(kind, ErrorKind::UnknownTool);
        assert_eq!(kind.to_string(), "UNKNOWN_TOOL");
    }

    #[test]
    fn test_display_is_message() {
        let err = NowError::unknown_tool("frobnicate");
        assert_eq!(err.to_string(), "Unknown tool: frobnicate");
        assert_eq!(err.kind(), ErrorKind::UnknownTool);
    }
}
