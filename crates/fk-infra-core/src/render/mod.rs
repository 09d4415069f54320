//! Definition rendering
//!
//! One pure function per tier. Every renderer reads the environment config and, where
//! the tier depends on earlier ones, the outputs those tiers produced. Rendering is
//! deterministic except for freshly generated database passwords.

pub mod iam;
pub mod password;

use crate::config::{KubernetesCluster, Spec};
use crate::error::{InfraError, Result};
use crate::outputs::Outputs;
use iam::ClusterPolicies;
use rand::Rng;
use serde::Serialize;
use tera::{Context, Tera};
use tracing::debug;

pub use password::{fetch_or_generate_password, generate_password};

const NETWORK: &str = "network.tf";
const SEARCH: &str = "elasticsearch.tf";
const DATABASES: &str = "databases.tf";
const CLUSTER: &str = "cluster.yml";
const FLUENT_BIT: &str = "fluent-bit.yaml";

const VPC_CIDR: &str = "172.20.0.0/16";

/// A definition ready to be staged for an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDefinition {
    pub file_name: String,
    pub content: String,
}

#[derive(Serialize)]
struct Zone {
    suffix: &'static str,
    private_cidr: &'static str,
    utility_cidr: &'static str,
}

const ZONES: [Zone; 2] = [
    Zone {
        suffix: "a",
        private_cidr: "172.20.32.0/19",
        utility_cidr: "172.20.0.0/22",
    },
    Zone {
        suffix: "b",
        private_cidr: "172.20.64.0/19",
        utility_cidr: "172.20.4.0/22",
    },
];

#[derive(Serialize)]
struct NetworkContext<'a> {
    environment_name: &'a str,
    region: &'a str,
    config_bucket: &'a str,
    vpc_cidr: &'a str,
    zones: &'a [Zone],
}

#[derive(Serialize)]
struct NamedEntry<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct SearchContext<'a> {
    environment_name: &'a str,
    region: &'a str,
    clusters: Vec<NamedEntry<'a>>,
}

#[derive(Serialize)]
struct DatabaseEntry<'a> {
    name: &'a str,
    password: String,
}

#[derive(Serialize)]
struct DatabasesContext<'a> {
    environment_name: &'a str,
    region: &'a str,
    databases: Vec<DatabaseEntry<'a>>,
}

#[derive(Serialize)]
struct Master {
    name: String,
    member: &'static str,
    zone: &'static str,
}

#[derive(Serialize)]
struct ClusterContext<'a> {
    cluster_name: &'a str,
    region: &'a str,
    config_bucket: &'a str,
    vpc_id: &'a str,
    vpc_cidr: &'a str,
    master_security_group_id: &'a str,
    worker_security_group_id: &'a str,
    private_subnets: [&'a str; 2],
    utility_subnets: [&'a str; 2],
    master_policies: &'a str,
    node_policies: &'a str,
    masters: Vec<Master>,
}

#[derive(Serialize)]
struct FluentBitContext<'a> {
    endpoint: &'a str,
    region: &'a str,
}

/// Renders definitions from the embedded templates.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (NETWORK, include_str!("../../templates/network.tf.tera")),
            (SEARCH, include_str!("../../templates/elasticsearch.tf.tera")),
            (DATABASES, include_str!("../../templates/databases.tf.tera")),
            (CLUSTER, include_str!("../../templates/cluster.yml.tera")),
            (FLUENT_BIT, include_str!("../../templates/fluent-bit.yaml.tera")),
        ])
        .map_err(|e| template_error("templates", &e))?;

        Ok(Self { tera })
    }

    /// VPC, subnets, gateways and security groups. Also declares the remote state
    /// backend shared by every provisioning tier.
    pub fn network(&self, spec: &Spec) -> Result<RenderedDefinition> {
        let context = NetworkContext {
            environment_name: &spec.environment_name,
            region: &spec.region,
            config_bucket: &spec.config_bucket,
            vpc_cidr: VPC_CIDR,
            zones: &ZONES,
        };
        self.definition(NETWORK, NETWORK.to_string(), &context)
    }

    pub fn search(&self, spec: &Spec) -> Result<RenderedDefinition> {
        let context = SearchContext {
            environment_name: &spec.environment_name,
            region: &spec.region,
            clusters: spec
                .elasticsearch
                .iter()
                .map(|cluster| NamedEntry {
                    name: &cluster.name,
                })
                .collect(),
        };
        self.definition(SEARCH, SEARCH.to_string(), &context)
    }

    pub fn databases(
        &self,
        spec: &Spec,
        outputs: &Outputs,
        rng: &mut impl Rng,
    ) -> Result<RenderedDefinition> {
        let databases = spec
            .databases
            .iter()
            .map(|database| DatabaseEntry {
                name: &database.name,
                password: fetch_or_generate_password(outputs, &database.name, rng),
            })
            .collect();

        let context = DatabasesContext {
            environment_name: &spec.environment_name,
            region: &spec.region,
            databases,
        };
        self.definition(DATABASES, DATABASES.to_string(), &context)
    }

    /// kops cluster and instance group manifest, written as `<cluster>.yml`.
    pub fn cluster(
        &self,
        spec: &Spec,
        cluster: &KubernetesCluster,
        outputs: &Outputs,
        policies: &ClusterPolicies,
    ) -> Result<RenderedDefinition> {
        let network = &outputs.network;
        let masters = [("a-1", "a"), ("b-1", "b"), ("a-2", "a")]
            .into_iter()
            .map(|(member, zone)| Master {
                name: format!("{}{}", spec.region, member),
                member,
                zone,
            })
            .collect();

        let context = ClusterContext {
            cluster_name: &cluster.name,
            region: &spec.region,
            config_bucket: &spec.config_bucket,
            vpc_id: &network.vpc_id,
            vpc_cidr: &network.vpc_cidr,
            master_security_group_id: &network.master_security_group_id,
            worker_security_group_id: &network.worker_security_group_id,
            private_subnets: network.private_subnets(),
            utility_subnets: network.utility_subnets(),
            master_policies: &policies.master,
            node_policies: &policies.node,
            masters,
        };
        self.definition(CLUSTER, format!("{}.yml", cluster.name), &context)
    }

    /// Multi-document manifest for the log shipping bundle.
    pub fn fluent_bit(&self, endpoint: &str, region: &str) -> Result<String> {
        self.render(FLUENT_BIT, &FluentBitContext { endpoint, region })
    }

    fn definition(
        &self,
        template: &str,
        file_name: String,
        context: &impl Serialize,
    ) -> Result<RenderedDefinition> {
        let content = self.render(template, context)?;
        debug!(file = %file_name, bytes = content.len(), "Rendered definition");
        Ok(RenderedDefinition { file_name, content })
    }

    fn render(&self, template: &str, context: &impl Serialize) -> Result<String> {
        let context = Context::from_serialize(context).map_err(|e| template_error(template, &e))?;
        self.tera
            .render(template, &context)
            .map_err(|e| template_error(template, &e))
    }
}

/// Flatten the tera error chain into one message.
fn template_error(template: &str, e: &tera::Error) -> InfraError {
    use std::error::Error;

    let mut details = vec![e.to_string()];
    let mut source = e.source();
    while let Some(err) = source {
        details.push(err.to_string());
        source = err.source();
    }

    InfraError::Template {
        template: template.to_string(),
        message: details.join(" | "),
    }
}
