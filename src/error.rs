//! Backend error types using thiserror 2.0.
//!
//! Errors are split by who has to act on them: configuration and validation
//! errors belong to the operator or caller, not-found and malformed-secret
//! errors tell the hosting runtime what to do with a lease, and upstream or
//! transport errors carry the Rollbar API's own answer.

use thiserror::Error;

/// Rollbar secrets backend errors.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Missing or unusable backend configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid caller input, rejected before any write or upstream call
    #[error("{0}")]
    Validation(String),

    /// Role lookup failed during issue, renew or revoke
    #[error("role not found: {0}")]
    RoleNotFound(String),

    /// Non-success response from the Rollbar API
    #[error("status: {status}, body: {body}")]
    Upstream {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Connection, timeout or body read failure
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// Malformed JSON from the API or from storage
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Upstream accepted the request but produced no token
    #[error("issuance failed: {0}")]
    Issuance(String),

    /// Lease internal data is missing or has the wrong shape
    #[error("malformed secret: {0}")]
    MalformedSecret(String),

    /// Failure reported by the storage collaborator
    #[error("storage error: {0}")]
    Storage(String),

    /// No handler is registered for the path
    #[error("unsupported path: {0}")]
    UnsupportedPath(String),

    /// The path exists but does not accept the operation
    #[error("unsupported operation")]
    UnsupportedOperation,

    /// Error wrapped with the name of the step that failed
    #[error("{context}: {source}")]
    Context {
        /// What the backend was doing
        context: String,
        /// Underlying error
        #[source]
        source: Box<BackendError>,
    },
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

impl BackendError {
    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a role not found error.
    #[must_use]
    pub fn role_not_found(name: impl Into<String>) -> Self {
        Self::RoleNotFound(name.into())
    }

    /// Create a malformed secret error.
    #[must_use]
    pub fn malformed_secret(msg: impl Into<String>) -> Self {
        Self::MalformedSecret(msg.into())
    }

    /// Create a storage error.
    #[must_use]
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Wrap this error with context, keeping the original as the source.
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all context layers removed.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if the failure is transient.
    ///
    /// The backend never retries on its own; this only informs the hosting
    /// runtime's lease retry policy.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self.root() {
            Self::Transport(_) => true,
            Self::Upstream { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Check if the error should be reported to the caller as an error
    /// response rather than as a backend fault.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self.root(),
            Self::Validation(_) | Self::UnsupportedPath(_) | Self::UnsupportedOperation
        )
    }

    /// Check if the error is a role lookup miss.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::RoleNotFound(_))
    }

    /// Check if the error is a configuration problem.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self.root(), Self::Config(_))
    }
}

/// Attach context to a fallible backend result.
pub trait ResultExt<T> {
    /// Wrap the error, if any, with `context`.
    fn context(self, context: &str) -> BackendResult<T>;
}

impl<T> ResultExt<T> for BackendResult<T> {
    fn context(self, context: &str) -> BackendResult<T> {
        self.map_err(|e| e.context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_display_keeps_body() {
        let err = BackendError::Upstream {
            status: 403,
            body: r#"{"err":1,"message":"access denied"}"#.to_string(),
        };
        assert_eq!(
            err.to_string(),
            r#"status: 403, body: {"err":1,"message":"access denied"}"#
        );
    }

    #[test]
    fn test_context_preserves_cause() {
        let err = BackendError::Upstream {
            status: 500,
            body: "boom".to_string(),
        }
        .context("error creating project access token");

        assert_eq!(
            err.to_string(),
            "error creating project access token: status: 500, body: boom"
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retryable_errors() {
        let upstream = |status| BackendError::Upstream {
            status,
            body: String::new(),
        };
        assert!(upstream(503).is_retryable());
        assert!(upstream(429).is_retryable());
        assert!(!upstream(404).is_retryable());
        assert!(!BackendError::config("missing token").is_retryable());
        assert!(!BackendError::role_not_found("r1").is_retryable());
    }

    #[test]
    fn test_classification_survives_context() {
        let err = BackendError::role_not_found("r1").context("error retrieving role");
        assert!(err.is_not_found());
        assert!(!err.is_user_error());

        let err = BackendError::validation("missing project ID").context("write role");
        assert!(err.is_user_error());

        let err = BackendError::config("client account access token is not defined")
            .context("error getting client");
        assert!(err.is_config());
    }
}
