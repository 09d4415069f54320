//! fk-infra provisioning core
//!
//! Renders infrastructure definitions from an environment config, feeds the outputs
//! of each applied tier into the next, and waits for clusters to converge.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                   fk-infra CLI                    │
//! │               (init / apply / version)            │
//! └─────────────────────┬────────────────────────────┘
//!                       │
//! ┌─────────────────────▼────────────────────────────┐
//! │                  fk-infra-core                    │
//! │  ┌────────────┐  ┌──────────┐  ┌──────────────┐  │
//! │  │  Renderer  │  │ Outputs  │  │  Converge    │  │
//! │  └────────────┘  └──────────┘  └──────────────┘  │
//! │  ┌────────────────────────────────────────────┐  │
//! │  │   Sequencer (network → data → compute)     │  │
//! │  └────────────────────────────────────────────┘  │
//! └──────┬───────────────┬──────────────┬────────────┘
//!        │               │              │
//! ┌──────▼──────┐ ┌──────▼──────┐ ┌─────▼───────┐
//! │ terraform / │ │  AWS S3 /   │ │ Kubernetes  │
//! │    kops     │ │  KMS / IAM  │ │     API     │
//! └─────────────┘ └─────────────┘ └─────────────┘
//! ```

pub mod config;
pub mod converge;
pub mod engine;
pub mod error;
pub mod manifests;
pub mod outputs;
pub mod pipeline;
pub mod render;
pub mod report;

// Re-exports
pub use config::{EnvironmentConfig, KubernetesCluster, Spec, ToolVersions};
pub use converge::{PollSettings, Readiness, wait_until_ready};
pub use engine::{ClusterEngine, ClusterResources, ControlPlane, ProvisioningEngine};
pub use error::{ErrorKind, InfraError, Result};
pub use outputs::{DatabaseOutput, NetworkOutputs, Outputs, RawOutputs, SearchClusterOutput};
pub use pipeline::{ClusterOutcome, ClusterState, RunSummary, Sequencer};
pub use render::{RenderedDefinition, Renderer};
pub use report::{PipelineEvent, Reporter, Tier, TracingReporter};
