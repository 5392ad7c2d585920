//! Error types for fanout.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Build tool errors
    #[error("Build tool failed{}: {message}", exit_code.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    ToolInvocation {
        exit_code: Option<i32>,
        message: String,
        log_tail: String,
    },

    #[error("Job timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Job cancelled")]
    Cancelled,

    // Publish errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication rejected: {0}")]
    Authentication(String),

    #[error("Artifact already exists: {0}")]
    Conflict(String),

    #[error("Upload rejected: {0}")]
    Rejected(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_))
    }

    /// Whether this error aborts the run before any job is started.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_errors_are_transient() {
        assert!(Error::Network("reset".into()).is_transient());
        assert!(!Error::Authentication("401".into()).is_transient());
        assert!(!Error::Conflict("pkg-1.0.tar.bz2".into()).is_transient());
        assert!(!Error::Rejected("400".into()).is_transient());
    }

    #[test]
    fn test_tool_invocation_display() {
        let err = Error::ToolInvocation {
            exit_code: Some(2),
            message: "conda build failed".into(),
            log_tail: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "Build tool failed with exit code 2: conda build failed"
        );

        let err = Error::ToolInvocation {
            exit_code: None,
            message: "program not found: conda".into(),
            log_tail: String::new(),
        };
        assert_eq!(err.to_string(), "Build tool failed: program not found: conda");
    }
}
