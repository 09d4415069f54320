//! Environment configuration model
//!
//! The user-authored `fk-infra.yml` document. Loaded once at the start of a run and
//! never mutated by the pipeline.

use crate::error::{InfraError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub const DEFAULT_TERRAFORM_VERSION: &str = "0.11.11";
pub const DEFAULT_KOPS_VERSION: &str = "1.11.1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub spec: Spec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Spec {
    pub environment_name: String,
    pub region: String,
    pub encryption_key: String,
    pub config_bucket: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kubernetes: Vec<KubernetesCluster>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub databases: Vec<Database>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queues: Vec<Queue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elasticsearch: Vec<SearchCluster>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peering_connections: Vec<PeeringConnection>,

    #[serde(default, skip_serializing_if = "ToolVersions::is_default")]
    pub tools: ToolVersions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KubernetesCluster {
    pub name: String,

    /// Name of the search cluster that receives this cluster's container logs.
    #[serde(
        default,
        rename = "logging-elasticsearch-name",
        skip_serializing_if = "Option::is_none"
    )]
    pub logging_search_cluster: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
    #[serde(rename = "type")]
    pub queue_type: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCluster {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PeeringConnection {
    pub name: String,
    pub peer_vpc_cidr: String,
}

/// Pinned versions of the external provisioning engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ToolVersions {
    #[serde(default = "default_terraform_version")]
    pub terraform_version: String,

    #[serde(default = "default_kops_version")]
    pub kops_version: String,
}

fn default_terraform_version() -> String {
    DEFAULT_TERRAFORM_VERSION.to_string()
}

fn default_kops_version() -> String {
    DEFAULT_KOPS_VERSION.to_string()
}

impl Default for ToolVersions {
    fn default() -> Self {
        Self {
            terraform_version: default_terraform_version(),
            kops_version: default_kops_version(),
        }
    }
}

impl ToolVersions {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

impl EnvironmentConfig {
    /// Default configuration written by `init`: one gossip cluster shipping its logs to
    /// a single `logging` search cluster.
    pub fn with_defaults(
        environment_name: impl Into<String>,
        region: impl Into<String>,
        encryption_key: impl Into<String>,
        config_bucket: impl Into<String>,
    ) -> Self {
        let environment_name = environment_name.into();
        Self {
            spec: Spec {
                kubernetes: vec![KubernetesCluster {
                    name: gossip_cluster_name(&environment_name),
                    logging_search_cluster: Some("logging".to_string()),
                }],
                elasticsearch: vec![SearchCluster {
                    name: "logging".to_string(),
                }],
                environment_name,
                region: region.into(),
                encryption_key: encryption_key.into(),
                config_bucket: config_bucket.into(),
                databases: Vec::new(),
                queues: Vec::new(),
                peering_connections: Vec::new(),
                tools: ToolVersions::default(),
            },
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: EnvironmentConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| InfraError::ConfigRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&content)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let spec = &self.spec;

        if spec.environment_name.trim().is_empty() {
            return Err(InfraError::InvalidConfig(
                "environment-name must not be empty".to_string(),
            ));
        }
        if spec.region.trim().is_empty() {
            return Err(InfraError::InvalidConfig(
                "region must not be empty".to_string(),
            ));
        }

        check_names("databases", spec.databases.iter().map(|d| d.name.as_str()))?;
        check_names(
            "elasticsearch",
            spec.elasticsearch.iter().map(|e| e.name.as_str()),
        )?;
        check_names("queues", spec.queues.iter().map(|q| q.name.as_str()))?;
        check_names(
            "peering-connections",
            spec.peering_connections.iter().map(|p| p.name.as_str()),
        )?;

        // Cluster names are DNS names (`<env>.k8s.local`) and double as the
        // definition file name and kubeconfig context.
        let mut seen = HashSet::new();
        for cluster in &spec.kubernetes {
            if !is_dns_name(&cluster.name) {
                return Err(InfraError::InvalidConfig(format!(
                    "kubernetes: invalid cluster name '{}' (use dot-separated labels of letters, digits and '-')",
                    cluster.name
                )));
            }
            if !seen.insert(cluster.name.as_str()) {
                return Err(InfraError::InvalidConfig(format!(
                    "kubernetes: duplicate cluster name '{}'",
                    cluster.name
                )));
            }
            if let Some(logging) = &cluster.logging_search_cluster
                && !spec.elasticsearch.iter().any(|e| &e.name == logging)
            {
                return Err(InfraError::InvalidConfig(format!(
                    "kubernetes cluster '{}' logs to unknown elasticsearch '{}'",
                    cluster.name, logging
                )));
            }
        }

        Ok(())
    }
}

/// Gossip-based clusters need no DNS zone when their name ends in `.k8s.local`.
pub fn gossip_cluster_name(environment_name: &str) -> String {
    format!("{}.k8s.local", environment_name)
}

fn is_dns_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

fn check_names<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(InfraError::InvalidConfig(format!(
                "{}: invalid name '{}' (use letters, digits and '-')",
                kind, name
            )));
        }
        if !seen.insert(name) {
            return Err(InfraError::InvalidConfig(format!(
                "{}: duplicate name '{}'",
                kind, name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
spec:
  environment-name: staging
  region: eu-west-2
  encryption-key: alias/environment-key-staging
  config-bucket: staging
  kubernetes:
    - name: staging.k8s.local
      logging-elasticsearch-name: logging
  databases:
    - name: orders
  elasticsearch:
    - name: logging
"#;

    #[test]
    fn test_parse_sample() {
        let config = EnvironmentConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.spec.environment_name, "staging");
        assert_eq!(config.spec.databases[0].name, "orders");
        assert_eq!(
            config.spec.kubernetes[0].logging_search_cluster.as_deref(),
            Some("logging")
        );
        assert_eq!(config.spec.tools, ToolVersions::default());
        assert!(config.spec.queues.is_empty());
    }

    #[test]
    fn test_defaults_roundtrip_through_yaml() {
        let config = EnvironmentConfig::with_defaults(
            "demo",
            "eu-west-1",
            "alias/environment-key-demo",
            "demo",
        );
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("environment-name: demo"));
        assert!(yaml.contains("demo.k8s.local"));
        assert!(!yaml.contains("databases"));
        assert!(!yaml.contains("tools"));

        let parsed = EnvironmentConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_tool_versions_override() {
        let yaml = format!("{}  tools:\n    kops-version: 1.12.0\n", SAMPLE);
        let config = EnvironmentConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.spec.tools.kops_version, "1.12.0");
        assert_eq!(config.spec.tools.terraform_version, DEFAULT_TERRAFORM_VERSION);
    }

    #[test]
    fn test_duplicate_database_rejected() {
        let yaml = SAMPLE.replace(
            "    - name: orders\n",
            "    - name: orders\n    - name: orders\n",
        );
        let err = EnvironmentConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate name 'orders'"));
    }

    #[test]
    fn test_invalid_database_name_rejected() {
        let yaml = SAMPLE.replace("name: orders", "name: orders_db");
        assert!(EnvironmentConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_invalid_cluster_name_rejected() {
        for name in ["staging/k8s.local", "../staging", "staging..local", "-staging.k8s.local", "staging k8s"] {
            let yaml = SAMPLE.replace("- name: staging.k8s.local", &format!("- name: \"{}\"", name));
            let err = EnvironmentConfig::from_yaml(&yaml).unwrap_err();
            assert!(
                err.to_string().contains("invalid cluster name"),
                "{} was accepted",
                name
            );
        }
    }

    #[test]
    fn test_duplicate_cluster_rejected() {
        let yaml = SAMPLE.replace(
            "    - name: staging.k8s.local\n      logging-elasticsearch-name: logging\n",
            "    - name: staging.k8s.local\n    - name: staging.k8s.local\n",
        );
        let err = EnvironmentConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate cluster name"));
    }

    #[test]
    fn test_unknown_logging_target_rejected() {
        let yaml = SAMPLE.replace("logging-elasticsearch-name: logging", "logging-elasticsearch-name: audit");
        let err = EnvironmentConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("unknown elasticsearch 'audit'"));
    }

    #[test]
    fn test_empty_region_rejected() {
        let yaml = SAMPLE.replace("region: eu-west-2", "region: \"\"");
        assert!(matches!(
            EnvironmentConfig::from_yaml(&yaml),
            Err(InfraError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = EnvironmentConfig::load(&dir.path().join("fk-infra.yml")).unwrap_err();
        assert!(matches!(err, InfraError::ConfigRead { .. }));
    }
}
