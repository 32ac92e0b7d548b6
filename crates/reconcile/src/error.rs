//! Error types for reconciliation.
//!
//! Every error is terminal for the unit of work in progress (one phase of one
//! group). Nothing in this crate retries; categories exist so callers can
//! print useful advice.

use std::fmt;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request or batch document was malformed.
    Input,
    /// A group, class or parameter that had to exist did not.
    NotFound,
    /// The write was issued but the re-read does not reflect it.
    Unverified,
    /// The classifier service could not be reached or answered with an error.
    Remote,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Input => "Invalid input",
            Self::NotFound => "Not found",
            Self::Unverified => "Remote write not verified",
            Self::Remote => "Classifier unavailable",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Input => "Fix the request or batch document and run again",
            Self::NotFound => "Check the group, class and parameter names",
            Self::Unverified => {
                "Inspect the group in the console; re-running the same request is safe"
            }
            Self::Remote => "Check that the classifier is running and reachable",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while reconciling a group.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad conjunction tag, unsupported rule mode, malformed document or
    /// conflicting options.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Something that had to be present was absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// The re-read group does not match the delta that was written.
    #[error("changes to group '{group}' were not saved")]
    RemoteWriteUnverified {
        /// Group name.
        group: String,
        /// Pretty-printed delta that was requested.
        expected: String,
        /// Pretty-printed group as re-read after the write.
        observed: String,
    },

    /// The classifier service client failed.
    #[error("classifier unavailable: {0}")]
    RemoteUnavailable(String),

    /// An error raised while running one phase of one group.
    #[error("group '{group}', {phase}: {source}")]
    Phase {
        /// Group name.
        group: String,
        /// Phase that was running.
        phase: &'static str,
        /// What went wrong.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an invalid-input error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Attach the group and phase that were running.
    pub fn in_phase(self, group: &str, phase: &'static str) -> Self {
        match self {
            already @ Self::Phase { .. } => already,
            other => Self::Phase {
                group: group.to_string(),
                phase,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping phase context.
    pub fn root(&self) -> &Error {
        match self {
            Self::Phase { source, .. } => source.root(),
            other => other,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidInput(_) => ErrorCategory::Input,
            Error::NotFound(_) => ErrorCategory::NotFound,
            Error::RemoteWriteUnverified { .. } => ErrorCategory::Unverified,
            Error::RemoteUnavailable(_) => ErrorCategory::Remote,
            Error::Phase { source, .. } => source.category(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(err.to_string())
    }
}
