//! Stage sequencer
//!
//! Drives one provisioning run across the tiers in dependency order:
//!
//! 1. network, search and database definitions, planned together and applied only
//!    when the run is approved
//! 2. a fresh read of the outputs those tiers produced
//! 3. one kops cluster per configured Kubernetes cluster, skipped entirely until a
//!    VPC exists
//! 4. for approved runs, a convergence wait per cluster and then the in-cluster
//!    resources
//!
//! Every call is awaited before the next one starts.

use crate::config::{KubernetesCluster, Spec};
use crate::converge::{PollSettings, Readiness, wait_until_ready};
use crate::engine::{ClusterEngine, ClusterResources, ControlPlane, ProvisioningEngine};
use crate::error::{InfraError, Result};
use crate::manifests::in_cluster_manifests;
use crate::outputs::{Outputs, RawOutputs};
use crate::render::iam::ClusterPolicies;
use crate::render::{RenderedDefinition, Renderer};
use crate::report::{PipelineEvent, Reporter, Tier, TracingReporter};
use std::path::PathBuf;
use tracing::{info, instrument};

/// Service principal of the managed search service.
pub const SEARCH_SERVICE: &str = "es.amazonaws.com";

static TRACING_REPORTER: TracingReporter = TracingReporter;

/// What happened to one Kubernetes cluster during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterState {
    /// Changes were previewed only.
    Previewed,
    /// Converged and received `resources` in-cluster manifests.
    Ready { resources: usize },
    /// Did not converge within the poll budget; in-cluster resources were skipped.
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterOutcome {
    pub name: String,
    pub state: ClusterState,
}

/// Result of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Staged definition file names, in staging order.
    pub staged: Vec<String>,
    /// Whether the provisioning change set was applied.
    pub applied: bool,
    /// The compute tier was skipped because no VPC exists yet.
    pub compute_skipped: bool,
    pub clusters: Vec<ClusterOutcome>,
}

pub struct Sequencer<'a> {
    provisioning: &'a dyn ProvisioningEngine,
    clusters: &'a dyn ClusterEngine,
    control_plane: &'a dyn ControlPlane,
    resources: &'a dyn ClusterResources,
    reporter: &'a dyn Reporter,
    renderer: Renderer,
    public_key: PathBuf,
    poll: PollSettings,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        provisioning: &'a dyn ProvisioningEngine,
        clusters: &'a dyn ClusterEngine,
        control_plane: &'a dyn ControlPlane,
        resources: &'a dyn ClusterResources,
        public_key: impl Into<PathBuf>,
    ) -> Result<Self> {
        Ok(Self {
            provisioning,
            clusters,
            control_plane,
            resources,
            reporter: &TRACING_REPORTER,
            renderer: Renderer::new()?,
            public_key: public_key.into(),
            poll: PollSettings::default(),
        })
    }

    pub fn with_reporter(mut self, reporter: &'a dyn Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Run every tier. `approved` gates all mutating steps: apply, cluster update
    /// confirmation, convergence and in-cluster resources.
    #[instrument(skip(self, spec), fields(environment = %spec.environment_name))]
    pub async fn run(&self, spec: &Spec, approved: bool) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        // Prior outputs carry the database passwords of earlier runs.
        let prior = self.fetch_outputs().await?;

        let network = self.renderer.network(spec)?;
        self.stage(Tier::Network, network, &mut summary).await?;

        if !spec.elasticsearch.is_empty() {
            self.ensure_search_role().await?;
        }
        let search = self.renderer.search(spec)?;
        self.stage(Tier::Search, search, &mut summary).await?;

        let databases = self
            .renderer
            .databases(spec, &prior, &mut rand::thread_rng())?;
        self.stage(Tier::Databases, databases, &mut summary).await?;

        self.provisioning.init().await?;
        self.provisioning.plan().await?;
        self.reporter.event(&PipelineEvent::Planned);

        if approved {
            self.provisioning.apply().await?;
            summary.applied = true;
            self.reporter.event(&PipelineEvent::Applied);
        } else {
            self.reporter.event(&PipelineEvent::ApplySkipped);
        }

        let outputs = self.fetch_outputs().await?;
        if !outputs.network.has_vpc() {
            summary.compute_skipped = true;
            self.reporter.event(&PipelineEvent::ComputeSkipped);
            return Ok(summary);
        }

        let policies = ClusterPolicies::from_outputs(&outputs)?;
        for cluster in &spec.kubernetes {
            let state = self
                .provision_cluster(spec, cluster, &outputs, &policies, approved)
                .await?;
            summary.clusters.push(ClusterOutcome {
                name: cluster.name.clone(),
                state,
            });
        }

        Ok(summary)
    }

    async fn fetch_outputs(&self) -> Result<Outputs> {
        let raw = RawOutputs::from_fetch(self.provisioning.output_json().await)?;
        Outputs::from_raw(&raw)
    }

    async fn stage(
        &self,
        tier: Tier,
        definition: RenderedDefinition,
        summary: &mut RunSummary,
    ) -> Result<()> {
        self.provisioning.stage(&definition).await?;
        self.reporter.event(&PipelineEvent::Rendered {
            tier,
            file_name: definition.file_name.clone(),
        });
        summary.staged.push(definition.file_name);
        Ok(())
    }

    async fn ensure_search_role(&self) -> Result<()> {
        match self
            .control_plane
            .ensure_service_linked_role(SEARCH_SERVICE)
            .await
        {
            Ok(()) => Ok(()),
            Err(InfraError::AlreadyExists(role)) => {
                info!(%role, "Search service role already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn provision_cluster(
        &self,
        spec: &Spec,
        cluster: &KubernetesCluster,
        outputs: &Outputs,
        policies: &ClusterPolicies,
        approved: bool,
    ) -> Result<ClusterState> {
        let name = cluster.name.as_str();
        let definition = self.renderer.cluster(spec, cluster, outputs, policies)?;

        self.clusters.replace(name, &definition).await?;
        self.reporter.event(&PipelineEvent::Rendered {
            tier: Tier::Compute,
            file_name: definition.file_name,
        });
        self.clusters
            .create_ssh_secret(name, &self.public_key)
            .await?;
        self.clusters.update(name, approved).await?;
        self.reporter.event(&PipelineEvent::ClusterDefined {
            cluster: name.to_string(),
            confirmed: approved,
        });

        if !approved {
            return Ok(ClusterState::Previewed);
        }

        let readiness =
            wait_until_ready(&self.poll, "validate cluster", || self.clusters.validate(name))
                .await?;

        match readiness {
            Readiness::Ready => {
                self.reporter.event(&PipelineEvent::ClusterReady {
                    cluster: name.to_string(),
                });
                let manifests = in_cluster_manifests(&self.renderer, spec, cluster, outputs)?;
                let count = self.resources.apply(name, &manifests).await?;
                self.reporter.event(&PipelineEvent::InClusterApplied {
                    cluster: name.to_string(),
                    count,
                });
                Ok(ClusterState::Ready { resources: count })
            }
            Readiness::TimedOut => {
                self.reporter.event(&PipelineEvent::ClusterTimedOut {
                    cluster: name.to_string(),
                });
                Ok(ClusterState::TimedOut)
            }
        }
    }
}
