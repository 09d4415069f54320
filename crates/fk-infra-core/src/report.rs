//! Pipeline progress events

use std::fmt;

/// Provisioning tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Network,
    Search,
    Databases,
    Compute,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Network => "network",
            Tier::Search => "search",
            Tier::Databases => "databases",
            Tier::Compute => "compute",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A definition was rendered and staged.
    Rendered { tier: Tier, file_name: String },
    Planned,
    Applied,
    /// The change set was only previewed.
    ApplySkipped,
    /// No VPC exists yet, so no cluster can be defined.
    ComputeSkipped,
    ClusterDefined { cluster: String, confirmed: bool },
    ClusterReady { cluster: String },
    ClusterTimedOut { cluster: String },
    InClusterApplied { cluster: String, count: usize },
}

/// Receives progress events from the sequencer.
pub trait Reporter: Send + Sync {
    fn event(&self, event: &PipelineEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Rendered { tier, file_name } => {
                tracing::info!(%tier, file = %file_name, "Rendered definition")
            }
            PipelineEvent::Planned => tracing::info!("Plan complete"),
            PipelineEvent::Applied => tracing::info!("Apply complete"),
            PipelineEvent::ApplySkipped => tracing::info!("Apply skipped, not approved"),
            PipelineEvent::ComputeSkipped => tracing::info!("No VPC yet, skipping compute tier"),
            PipelineEvent::ClusterDefined { cluster, confirmed } => {
                tracing::info!(%cluster, confirmed, "Cluster defined")
            }
            PipelineEvent::ClusterReady { cluster } => tracing::info!(%cluster, "Cluster ready"),
            PipelineEvent::ClusterTimedOut { cluster } => {
                tracing::warn!(%cluster, "Cluster did not become ready in time")
            }
            PipelineEvent::InClusterApplied { cluster, count } => {
                tracing::info!(%cluster, count, "Applied in-cluster resources")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_display() {
        assert_eq!(Tier::Network.to_string(), "network");
        assert_eq!(Tier::Compute.to_string(), "compute");
    }
}
