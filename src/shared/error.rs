//! Shared Error Types
//!
//! This module defines the error taxonomy used at every network and storage
//! boundary of the client. Each failure that can reach a user is classified
//! into exactly one of the categories below.
//!
//! # Error Categories
//!
//! - `Transport` - no response was received (DNS, refused connection, timeout)
//! - `Unauthorized` - HTTP 401/403, the only signal that a token is dead
//! - `Status` - any other non-2xx response
//! - `Rejected` - 2xx response carrying `success: false`
//! - `Malformed` - 2xx response whose body is not valid JSON
//!
//! # Usage
//!
//! ```rust
//! use gavel::shared::error::ApiError;
//!
//! let error = ApiError::status(500, Some("Database unavailable".to_string()));
//! assert_eq!(error.user_message(), "Database unavailable");
//! assert!(!error.is_auth_failure());
//! ```
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync` and can be safely shared across task boundaries.
use thiserror::Error;

/// User-facing text for transport failures.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please try again.";

/// User-facing text for bodies that fail to parse.
pub const MALFORMED_RESPONSE_MESSAGE: &str = "Server returned a malformed response.";

/// Failure of a single request against the remote API
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No response was received
    #[error("transport error: {message}")]
    Transport {
        /// Underlying client error, for diagnostics only
        message: String,
    },

    /// The server refused the bearer token (401/403)
    #[error("authentication rejected with status {status}")]
    Unauthorized {
        /// HTTP status code
        status: u16,
    },

    /// Non-2xx response other than 401/403
    #[error("server returned {status}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Server-provided `message`, when the body carried one
        message: Option<String>,
    },

    /// 2xx response that reported `success: false`
    #[error("request rejected: {}", .message.as_deref().unwrap_or("no message"))]
    Rejected {
        /// Server-provided `message`
        message: Option<String>,
    },

    /// 2xx response whose body could not be parsed
    #[error("malformed response: {message}")]
    Malformed {
        /// Parser error, for diagnostics only
        message: String,
    },
}

impl ApiError {
    /// Create a new transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a new status error
    pub fn status(status: u16, message: Option<String>) -> Self {
        Self::Status { status, message }
    }

    /// Create a new malformed-body error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Whether this failure must tear the session down.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Text shown to the user for this failure.
    ///
    /// Server messages are passed through verbatim; everything else maps to a
    /// fixed sentence per category.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport { .. } => NETWORK_ERROR_MESSAGE.to_string(),
            Self::Unauthorized { .. } => {
                "Your session has expired. Please sign in again.".to_string()
            }
            Self::Status {
                message: Some(message),
                ..
            } if !message.is_empty() => message.clone(),
            Self::Status { status, .. } => format!("Server returned {status}. Please try again later."),
            Self::Rejected {
                message: Some(message),
            } if !message.is_empty() => message.clone(),
            Self::Rejected { .. } => "The request could not be completed.".to_string(),
            Self::Malformed { .. } => MALFORMED_RESPONSE_MESSAGE.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::transport(err.to_string())
    }
}

/// Failure of the durable key-value medium
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted document could not be encoded or decoded
    #[error("storage serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store refused the write
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a user-initiated session operation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Form input rejected before any request was sent
    #[error("invalid input: {0}")]
    Validation(String),

    /// The step needs a successful email verification first
    #[error("verification required: {0}")]
    VerificationRequired(String),

    #[error("not signed in")]
    NotAuthenticated,

    /// The user declined a confirmation prompt
    #[error("cancelled")]
    Cancelled,
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            Self::Validation(message) | Self::VerificationRequired(message) => message.clone(),
            Self::NotAuthenticated => "Please sign in first.".to_string(),
            Self::Cancelled => "Cancelled.".to_string(),
        }
    }
}
