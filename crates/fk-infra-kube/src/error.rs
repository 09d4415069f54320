use fk_infra_core::InfraError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KubeError {
    #[error("Failed to create Kubernetes client for context '{context}': {message}")]
    Client { context: String, message: String },

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("Failed to apply {kind}/{name}: {message}")]
    Apply {
        kind: String,
        name: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, KubeError>;

impl From<KubeError> for InfraError {
    fn from(e: KubeError) -> Self {
        InfraError::Kube(e.to_string())
    }
}
