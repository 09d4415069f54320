use fk_infra_core::InfraError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("AWS {operation} failed: {message}")]
    Api { operation: String, message: String },

    #[error("KMS key {alias} exists but is not enabled (state: {state})")]
    KeyNotEnabled { alias: String, state: String },

    #[error("Missing field in {operation} response: {field}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },

    #[error("Encryption error: {0}")]
    Crypto(String),

    #[error("Malformed encrypted file: {0}")]
    Envelope(String),

    #[error("Key material error: {0}")]
    Key(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AwsError {
    pub(crate) fn api(operation: &str, error: impl std::error::Error) -> Self {
        AwsError::Api {
            operation: operation.to_string(),
            message: aws_sdk_s3::error::DisplayErrorContext(error).to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;

impl From<AwsError> for InfraError {
    fn from(e: AwsError) -> Self {
        match e {
            AwsError::Io(e) => InfraError::Io(e),
            other => InfraError::Cloud(other.to_string()),
        }
    }
}

impl From<ssh_key::Error> for AwsError {
    fn from(e: ssh_key::Error) -> Self {
        AwsError::Key(e.to_string())
    }
}
