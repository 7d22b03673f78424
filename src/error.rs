//! Error types for wordpress-connect

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Failure category reported to callers of a connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The URL does not host a WordPress site
    NotWordPress,
    /// DNS lookup failed or the connection was refused
    SiteUnreachable,
    /// The remote site did not answer within the configured timeout
    Timeout,
    /// Credentials were rejected
    AuthenticationFailed,
    /// Credentials were accepted but the user lacks the required capability
    InsufficientPermissions,
    /// The REST API is disabled, blocked, or answered unexpectedly
    ApiUnavailable,
    /// The remote site answered with a 5xx status
    RemoteServerError,
    /// Required credential fields are missing or malformed
    InvalidCredentials,
    /// The authentication method is not recognized
    UnsupportedMethod,
    /// The caller cancelled the attempt
    Cancelled,
}

impl ErrorKind {
    /// Stable snake_case name, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotWordPress => "not_wordpress",
            Self::SiteUnreachable => "site_unreachable",
            Self::Timeout => "timeout",
            Self::AuthenticationFailed => "authentication_failed",
            Self::InsufficientPermissions => "insufficient_permissions",
            Self::ApiUnavailable => "api_unavailable",
            Self::RemoteServerError => "remote_server_error",
            Self::InvalidCredentials => "invalid_credentials",
            Self::UnsupportedMethod => "unsupported_method",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while connecting to or inspecting a WordPress site
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid URL provided
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to create HTTP client
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),

    /// HTTP request failed for a reason other than connect or timeout
    #[error("HTTP request failed: {0}")]
    HttpRequest(String),

    /// HTTP response error status
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),

    /// Response body could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// DNS failure or refused connection
    #[error("website not found or not accessible: {0}")]
    SiteUnreachable(String),

    /// Request exceeded the configured timeout
    #[error("connection timeout: {0} may be slow or unreachable")]
    Timeout(String),

    /// Site does not appear to be WordPress
    #[error("site does not appear to be WordPress")]
    NotWordPress,

    /// Credentials rejected by the remote site
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Authenticated user lacks a required capability
    #[error("access forbidden: {0}")]
    InsufficientPermissions(String),

    /// REST API endpoint missing or disabled
    #[error("WordPress REST API unavailable: {0}")]
    ApiUnavailable(String),

    /// Remote site answered with a server error
    #[error("WordPress site server error: status {0}")]
    RemoteServerError(u16),

    /// Missing or malformed credentials for the chosen method
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Unknown authentication method name
    #[error(
        "unsupported authentication method: '{0}' (valid: application_password, jwt_token, oauth, api_key, cookie_auth, custom_token, session_auth)"
    )]
    UnsupportedMethod(String),

    /// Attempt cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid output format specified
    #[error("invalid output format: '{0}' (valid: human, json, none)")]
    InvalidOutputFormat(String),

    /// Invalid output sort order specified
    #[error("invalid output sort: '{0}' (valid: name, status)")]
    InvalidOutputSort(String),

    /// Output operation failed
    #[error("output failed: {0}")]
    OutputFailed(#[source] std::io::Error),

    /// JSON serialization failed
    #[error("JSON serialization failed")]
    SerializationFailed(#[from] serde_json::Error),
}

impl Error {
    /// Failure category for errors that can end a connection attempt
    ///
    /// Configuration and output errors have no category: they are raised
    /// before or after an attempt, never from inside one.
    pub fn kind(&self) -> Option<ErrorKind> {
        let kind = match self {
            Self::HttpRequest(_) | Self::SiteUnreachable(_) => ErrorKind::SiteUnreachable,
            Self::HttpStatus(status) | Self::RemoteServerError(status) if *status >= 500 => {
                ErrorKind::RemoteServerError
            }
            Self::HttpStatus(_) | Self::RemoteServerError(_) => ErrorKind::ApiUnavailable,
            Self::InvalidResponse(_) | Self::ApiUnavailable(_) => ErrorKind::ApiUnavailable,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::NotWordPress => ErrorKind::NotWordPress,
            Self::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            Self::InsufficientPermissions(_) => ErrorKind::InsufficientPermissions,
            Self::InvalidCredentials(_) => ErrorKind::InvalidCredentials,
            Self::UnsupportedMethod(_) => ErrorKind::UnsupportedMethod,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::InvalidUrl(_)
            | Self::HttpClient(_)
            | Self::InvalidOutputFormat(_)
            | Self::InvalidOutputSort(_)
            | Self::OutputFailed(_)
            | Self::SerializationFailed(_) => return None,
        };
        Some(kind)
    }
}
