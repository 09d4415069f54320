use fk_infra_core::InfraError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolsError {
    #[error("Unsupported platform: {os}-{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Download failed: {url}: {message}")]
    Download { url: String, message: String },

    #[error("Download failed: {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to unpack archive: {0}")]
    Archive(String),

    #[error("Install step did not produce {0}")]
    NotInstalled(PathBuf),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {code:?}")]
    CommandFailed { program: String, code: Option<i32> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ToolsError>;

impl From<ToolsError> for InfraError {
    fn from(e: ToolsError) -> Self {
        match e {
            ToolsError::CommandFailed { program, code } => {
                InfraError::CommandFailed { program, code }
            }
            ToolsError::Io(e) => InfraError::Io(e),
            other => InfraError::Tool(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_zero_exit_stays_transient() {
        let err: InfraError = ToolsError::CommandFailed {
            program: "kops".to_string(),
            code: Some(2),
        }
        .into();
        assert!(err.is_transient());
    }

    #[test]
    fn test_download_failure_is_fatal() {
        let err: InfraError = ToolsError::HttpStatus {
            url: "https://example.invalid/kops".to_string(),
            status: 404,
        }
        .into();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("HTTP 404"));
    }
}
