//! Kubernetes adapter for fk-infra

pub mod apply;
pub mod error;

pub use apply::{FIELD_MANAGER, KubeApplier, ManifestTarget};
pub use error::{KubeError, Result};
