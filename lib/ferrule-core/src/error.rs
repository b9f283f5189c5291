//! Error types for ferrule.

use std::time::Duration;

use derive_more::{Display, Error, From};

/// Main error type for ferrule operations.
///
/// The three dispatch outcomes that callers usually branch on are kept
/// apart: [`Error::Network`], [`Error::Timeout`] and [`Error::Cancelled`].
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// Bad middleware registration or configuration shape.
    #[display("configuration error: {_0}")]
    #[from(skip)]
    Configuration(#[error(not(source))] String),

    /// A pipeline contract was broken, e.g. `next` invoked twice.
    #[display("invariant violation: {_0}")]
    #[from(skip)]
    InvariantViolation(#[error(not(source))] String),

    /// An argument given to the client was rejected.
    #[display("invalid argument: {_0}")]
    #[from(skip)]
    InvalidArgument(#[error(not(source))] String),

    /// Transport-level failure (connection refused, reset, TLS, ...).
    #[display("network error: {_0}")]
    #[from(skip)]
    Network(#[error(not(source))] String),

    /// The configured timeout elapsed before the transport settled.
    #[display("timeout of {}ms exceeded", duration.as_millis())]
    #[from(skip)]
    Timeout {
        /// Configured timeout.
        duration: Duration,
    },

    /// The request was cancelled through its cancel token.
    #[display("request cancelled: {reason}")]
    #[from(skip)]
    Cancelled {
        /// Reason given to [`crate::CancelSource::cancel`].
        reason: String,
    },

    /// The response body could not be decoded per the declared response type.
    #[display("response parse error at '{path}': {message}")]
    #[from(skip)]
    ResponseParse {
        /// JSON path to the error (e.g. "user.address.city"), `.` for the root.
        path: String,
        /// Error message.
        message: String,
    },

    /// The status code was rejected by the status validator.
    #[display("HTTP error {status}: {message}")]
    #[from(skip)]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
        /// Response body, if available.
        #[error(not(source))]
        body: Option<bytes::Bytes>,
    },

    /// No transport could be resolved for the call.
    #[display("no transport adapter available")]
    #[from(skip)]
    NoAdapterAvailable,

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// Form URL-encoded serialization error.
    #[display("form serialization error: {_0}")]
    #[from]
    FormSerialization(serde_urlencoded::ser::Error),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an invariant violation.
    #[must_use]
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Create a timeout error for the given duration.
    #[must_use]
    pub const fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Create a cancellation error.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Create a response parse error with path context.
    #[must_use]
    pub fn response_parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResponseParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP error with body.
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>, body: Option<bytes::Bytes>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            body,
        }
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if this is a cancellation error.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns `true` if this is a network error.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Returns `true` if this is an invariant violation.
    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }

    /// Returns the HTTP status code if this is an HTTP error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the response body if this is an HTTP error with a body.
    #[must_use]
    pub fn body(&self) -> Option<&bytes::Bytes> {
        match self {
            Self::Http { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}
