//! Collaborator seams
//!
//! The sequencer drives every external system through these traits. Adapter crates
//! implement them over real processes and APIs; tests substitute recording fakes.

use crate::error::Result;
use crate::render::RenderedDefinition;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

/// Infrastructure-as-code engine for the network, search and database tiers.
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    /// Write a definition where the engine will pick it up.
    async fn stage(&self, definition: &RenderedDefinition) -> Result<()>;

    async fn init(&self) -> Result<()>;

    async fn plan(&self) -> Result<()>;

    /// Apply without an interactive confirmation.
    async fn apply(&self) -> Result<()>;

    /// Raw output document of the last apply.
    async fn output_json(&self) -> Result<Vec<u8>>;
}

/// Cluster lifecycle engine for the compute tier.
#[async_trait]
pub trait ClusterEngine: Send + Sync {
    /// Stage the cluster definition and force-replace the stored cluster spec.
    async fn replace(&self, cluster: &str, definition: &RenderedDefinition) -> Result<()>;

    /// Register the admin SSH public key.
    async fn create_ssh_secret(&self, cluster: &str, public_key: &Path) -> Result<()>;

    /// Reconcile cloud resources with the stored spec. Without `confirm` this only
    /// previews the changes.
    async fn update(&self, cluster: &str, confirm: bool) -> Result<()>;

    /// Succeeds once the cluster reports healthy.
    async fn validate(&self, cluster: &str) -> Result<()>;
}

/// Cloud control-plane prerequisites.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Create the state bucket with versioning if it does not exist. Returns its name.
    async fn ensure_bucket(&self, bucket: &str) -> Result<String>;

    /// Create the environment's encryption key and alias if missing. Returns the alias.
    async fn ensure_encryption_key(&self, environment_name: &str) -> Result<String>;

    /// Create the service-linked role for `service`. An existing role is reported as
    /// [`crate::InfraError::AlreadyExists`].
    async fn ensure_service_linked_role(&self, service: &str) -> Result<()>;
}

/// Applies manifests inside a running cluster.
#[async_trait]
pub trait ClusterResources: Send + Sync {
    /// Create or update each manifest. Returns how many were applied.
    async fn apply(&self, cluster: &str, manifests: &[Value]) -> Result<usize>;
}
