//! Error types for classifier API calls.
//!
//! Every error here is fatal for the request that raised it; the client never
//! retries. Categories exist so the CLI can print useful advice.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for classifier operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of classifier errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The server could not be reached or answered with an error status.
    Network,
    /// Certificates or keys could not be loaded.
    Certificate,
    /// The server answered with something we could not read.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Classifier connectivity issue",
            Self::Certificate => "Certificate problem",
            Self::Format => "Unexpected response",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => {
                "Check that console services are running and this host is whitelisted"
            }
            Self::Certificate => "Check ssl_dir and that the agent certificate has been signed",
            Self::Format => "Check that the configured ports point at the classifier",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to the classifier.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP request failed: {message}")]
    HttpError {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// A PEM file could not be parsed.
    #[error("invalid certificate or key in {path}: {message}")]
    Certificate {
        /// File that failed to load.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// IO error during file operations.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Invalid response from API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// The port never accepted a connection.
    #[error("{host}:{port} did not accept connections within {seconds}s")]
    Timeout {
        /// Host polled.
        host: String,
        /// Port polled.
        port: u16,
        /// Time waited.
        seconds: u64,
    },
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::HttpError {
            message: message.into(),
            status,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::HttpError { .. } | Error::Timeout { .. } => ErrorCategory::Network,
            Error::Certificate { .. } => ErrorCategory::Certificate,
            Error::Io { .. } => ErrorCategory::Other,
            Error::InvalidResponse(_) => ErrorCategory::Format,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::HttpError {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            other => Self::HttpError {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<Error> for reconcile::Error {
    fn from(err: Error) -> Self {
        reconcile::Error::RemoteUnavailable(err.to_string())
    }
}
