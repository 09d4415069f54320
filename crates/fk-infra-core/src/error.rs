//! Pipeline error types

use std::path::PathBuf;
use thiserror::Error;

/// How the sequencer should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Abort the run.
    Fatal,
    /// Expected while the environment converges; retry or treat as success.
    Transient,
}

#[derive(Error, Debug)]
pub enum InfraError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read {path}: {message}")]
    ConfigRead { path: PathBuf, message: String },

    #[error("Template error in {template}: {message}")]
    Template { template: String, message: String },

    #[error("Malformed output record '{key}': {message}")]
    MalformedOutput { key: String, message: String },

    #[error("{program} exited with status {code:?}")]
    CommandFailed { program: String, code: Option<i32> },

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Cloud API error: {0}")]
    Cloud(String),

    #[error("Kubernetes error: {0}")]
    Kube(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl InfraError {
    /// Classify the failure.
    ///
    /// A non-zero exit from an external engine is the normal "not yet" answer of a
    /// readiness check, and "already exists" is the success path of an idempotent
    /// create. Everything else is a defect or an environment problem.
    pub fn kind(&self) -> ErrorKind {
        match self {
            InfraError::CommandFailed { .. } | InfraError::AlreadyExists(_) => {
                ErrorKind::Transient
            }
            _ => ErrorKind::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

pub type Result<T> = std::result::Result<T, InfraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failure_is_transient() {
        let err = InfraError::CommandFailed {
            program: "kops".to_string(),
            code: Some(2),
        };
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(err.to_string(), "kops exited with status Some(2)");
    }

    #[test]
    fn test_tool_error_is_fatal() {
        let err = InfraError::Tool("binary missing".to_string());
        assert!(!err.is_transient());
    }
}
