//! Structured error types for Shellwise
//!
//! Transport and configuration failures are typed so the session engine can
//! turn them into a single readable line for the user.

use thiserror::Error;

/// Primary error type for Shellwise operations
#[derive(Error, Debug)]
pub enum ShellwiseError {
    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Could not reach the inference endpoint at all
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,

    /// Provider answered with a non-success status
    #[error("provider error: {status} - {message}")]
    ProviderError { status: u16, message: String },

    /// The response stream broke off or could not be read
    #[error("stream disconnected: {reason}")]
    StreamDisconnected { reason: String },

    /// The response stream carried something that is not the provider's framing
    #[error("malformed stream: {reason}")]
    MalformedStream { reason: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("unknown provider: {name}")]
    UnknownProvider { name: String },

    // =========================================================================
    // External Error Wrappers
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ShellwiseError {
    /// Check if error is transient
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. }
            | Self::Timeout
            | Self::StreamDisconnected { .. } => true,

            Self::ProviderError { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),

            Self::Io(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),

            Self::MalformedStream { .. }
            | Self::InvalidConfig { .. }
            | Self::UnknownProvider { .. }
            | Self::Json(_) => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::ConnectionFailed { message } => {
                format!("Could not reach the model endpoint ({}).", message)
            }
            Self::Timeout => "The model did not answer in time.".to_string(),
            Self::ProviderError { status: 401, .. } | Self::ProviderError { status: 403, .. } => {
                "Authentication failed. Please check your API key.".to_string()
            }
            Self::ProviderError { status: 404, message } => {
                format!("Model or endpoint not found: {}", message)
            }
            Self::ProviderError { status, message } => {
                format!("The model endpoint returned {}: {}", status, message)
            }
            Self::StreamDisconnected { reason } => {
                format!("The response stream was interrupted: {}", reason)
            }
            _ => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for ShellwiseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        if err.is_connect() {
            return Self::ConnectionFailed {
                message: root_cause(&err),
            };
        }
        if let Some(status) = err.status() {
            return Self::ProviderError {
                status: status.as_u16(),
                message: err.to_string(),
            };
        }
        if err.is_body() || err.is_decode() {
            return Self::StreamDisconnected {
                reason: root_cause(&err),
            };
        }
        Self::ConnectionFailed {
            message: root_cause(&err),
        }
    }
}

/// Innermost error message; reqwest wraps "connection refused" several levels deep.
fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

/// Result type alias using ShellwiseError
pub type Result<T> = std::result::Result<T, ShellwiseError>;
