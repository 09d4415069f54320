//! Provisioning outputs
//!
//! `terraform output -json` produces a flat map of `name -> { "value": ... }`. Two
//! conventions partition it:
//!
//! - a singleton section with fixed keys (`vpc_id`, `subnet_a`, ...)
//! - a namespaced section where keys share a `<kind>_output_` prefix and the `value`
//!   is itself a JSON-encoded record for one sub-resource instance
//!
//! [`RawOutputs`] is the parse boundary that knows about those conventions.
//! [`Outputs`] is the typed accumulator the renderers consume.

use crate::error::{InfraError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const VPC_ID: &str = "vpc_id";
const VPC_CIDR: &str = "vpc_cidr_block";
const SUBNET_A: &str = "subnet_a";
const SUBNET_B: &str = "subnet_b";
const UTILITY_SUBNET_A: &str = "subnet_utility-a";
const UTILITY_SUBNET_B: &str = "subnet_utility-b";
const MASTER_SECURITY_GROUP: &str = "master_security_group_id";
const WORKER_SECURITY_GROUP: &str = "worker_security_group_id";

/// A record decoded from the namespaced section.
pub trait OutputRecord: DeserializeOwned {
    /// Key prefix shared by every record of this kind.
    const PREFIX: &'static str;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseOutput {
    pub name: String,
    pub endpoint: String,
    pub password: String,
}

impl OutputRecord for DatabaseOutput {
    const PREFIX: &'static str = "database_output_";

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchClusterOutput {
    pub name: String,
    pub endpoint: String,
    pub arn: String,
}

impl OutputRecord for SearchClusterOutput {
    const PREFIX: &'static str = "elasticsearch_output_";

    fn name(&self) -> &str {
        &self.name
    }
}

/// The raw output document.
#[derive(Debug, Clone, Default)]
pub struct RawOutputs {
    entries: Map<String, Value>,
}

impl RawOutputs {
    pub fn parse(document: &str) -> Result<Self> {
        let entries: Map<String, Value> = serde_json::from_str(document)?;
        Ok(Self { entries })
    }

    /// Parse the captured output of a fetch, or bootstrap from `{}` when the fetch
    /// itself failed (no prior apply, no state yet).
    pub fn from_fetch<E: std::fmt::Display>(
        fetched: std::result::Result<Vec<u8>, E>,
    ) -> Result<Self> {
        match fetched {
            Ok(bytes) => {
                let document = String::from_utf8_lossy(&bytes);
                if document.trim().is_empty() {
                    return Ok(Self::default());
                }
                Self::parse(&document)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unable to fetch provisioning outputs, starting empty");
                Ok(Self::default())
            }
        }
    }

    /// Scalar value of a singleton key. Missing or non-string values read as empty.
    pub fn scalar(&self, key: &str) -> &str {
        self.entries
            .get(key)
            .and_then(|entry| entry.get("value"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Decode every record whose key starts with `prefix`.
    pub fn records_with_prefix<R: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<R>> {
        self.entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| decode_embedded(key, entry))
            .collect()
    }

    pub fn records<R: OutputRecord>(&self) -> Result<Vec<R>> {
        self.records_with_prefix(R::PREFIX)
    }
}

fn decode_embedded<R: DeserializeOwned>(key: &str, entry: &Value) -> Result<R> {
    let embedded = entry
        .get("value")
        .and_then(Value::as_str)
        .ok_or_else(|| InfraError::MalformedOutput {
            key: key.to_string(),
            message: "expected a string \"value\"".to_string(),
        })?;

    serde_json::from_str(embedded).map_err(|e| InfraError::MalformedOutput {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Singleton network outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkOutputs {
    pub vpc_id: String,
    pub vpc_cidr: String,
    pub subnet_a: String,
    pub subnet_b: String,
    pub utility_subnet_a: String,
    pub utility_subnet_b: String,
    pub master_security_group_id: String,
    pub worker_security_group_id: String,
}

impl NetworkOutputs {
    pub fn private_subnets(&self) -> [&str; 2] {
        [self.subnet_a.as_str(), self.subnet_b.as_str()]
    }

    pub fn utility_subnets(&self) -> [&str; 2] {
        [self.utility_subnet_a.as_str(), self.utility_subnet_b.as_str()]
    }

    /// The network tier has been applied at least once.
    pub fn has_vpc(&self) -> bool {
        !self.vpc_id.is_empty()
    }
}

/// Typed accumulator over one fetch of the output document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outputs {
    pub network: NetworkOutputs,
    pub databases: BTreeMap<String, DatabaseOutput>,
    pub search_clusters: BTreeMap<String, SearchClusterOutput>,
}

impl Outputs {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_raw(raw: &RawOutputs) -> Result<Self> {
        let network = NetworkOutputs {
            vpc_id: raw.scalar(VPC_ID).to_string(),
            vpc_cidr: raw.scalar(VPC_CIDR).to_string(),
            subnet_a: raw.scalar(SUBNET_A).to_string(),
            subnet_b: raw.scalar(SUBNET_B).to_string(),
            utility_subnet_a: raw.scalar(UTILITY_SUBNET_A).to_string(),
            utility_subnet_b: raw.scalar(UTILITY_SUBNET_B).to_string(),
            master_security_group_id: raw.scalar(MASTER_SECURITY_GROUP).to_string(),
            worker_security_group_id: raw.scalar(WORKER_SECURITY_GROUP).to_string(),
        };

        Ok(Self {
            network,
            databases: index_by_name(raw.records::<DatabaseOutput>()?),
            search_clusters: index_by_name(raw.records::<SearchClusterOutput>()?),
        })
    }

    pub fn parse(document: &str) -> Result<Self> {
        Self::from_raw(&RawOutputs::parse(document)?)
    }

    pub fn database(&self, name: &str) -> Option<&DatabaseOutput> {
        self.databases.get(name)
    }

    pub fn search_cluster(&self, name: &str) -> Option<&SearchClusterOutput> {
        self.search_clusters.get(name)
    }
}

fn index_by_name<R: OutputRecord>(records: Vec<R>) -> BTreeMap<String, R> {
    records
        .into_iter()
        .map(|record| (record.name().to_string(), record))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "vpc_id": {"sensitive": false, "type": "string", "value": "vpc-123"},
        "vpc_cidr_block": {"value": "172.20.0.0/16"},
        "subnet_a": {"value": "subnet-a"},
        "subnet_b": {"value": "subnet-b"},
        "subnet_utility-a": {"value": "subnet-ua"},
        "subnet_utility-b": {"value": "subnet-ub"},
        "master_security_group_id": {"value": "sg-master"},
        "worker_security_group_id": {"value": "sg-worker"},
        "database_output_orders": {"value": "{\"name\":\"orders\",\"endpoint\":\"orders.rds:3306\",\"password\":\"abc123\"}"},
        "elasticsearch_output_logging": {"value": "{\"name\":\"logging\",\"endpoint\":\"vpc-logging.es.amazonaws.com\",\"arn\":\"arn:aws:es:eu-west-2:1:domain/staging-logging\"}"}
    }"#;

    #[test]
    fn test_records_with_prefix_single_record() {
        let raw = RawOutputs::parse(
            r#"{"database_output_foo":{"value":"{\"name\":\"foo\",\"endpoint\":\"e\",\"password\":\"p\"}"}}"#,
        )
        .unwrap();

        let records: Vec<DatabaseOutput> = raw.records_with_prefix("database_output_").unwrap();
        assert_eq!(
            records,
            vec![DatabaseOutput {
                name: "foo".to_string(),
                endpoint: "e".to_string(),
                password: "p".to_string(),
            }]
        );
    }

    #[test]
    fn test_records_with_prefix_empty_document() {
        let raw = RawOutputs::parse("{}").unwrap();
        let records: Vec<DatabaseOutput> = raw.records_with_prefix("database_output_").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_scalars_missing_read_empty() {
        let raw = RawOutputs::parse("{}").unwrap();
        assert_eq!(raw.scalar("vpc_id"), "");

        let outputs = Outputs::from_raw(&raw).unwrap();
        assert!(!outputs.network.has_vpc());
        assert!(outputs.databases.is_empty());
    }

    #[test]
    fn test_full_document() {
        let outputs = Outputs::parse(DOCUMENT).unwrap();
        assert_eq!(outputs.network.vpc_id, "vpc-123");
        assert_eq!(outputs.network.private_subnets(), ["subnet-a", "subnet-b"]);
        assert_eq!(outputs.network.utility_subnets(), ["subnet-ua", "subnet-ub"]);
        assert_eq!(outputs.database("orders").unwrap().password, "abc123");
        assert_eq!(
            outputs.search_cluster("logging").unwrap().endpoint,
            "vpc-logging.es.amazonaws.com"
        );
        assert!(outputs.search_cluster("audit").is_none());
    }

    #[test]
    fn test_malformed_embedded_record_is_fatal() {
        let raw = RawOutputs::parse(r#"{"database_output_foo":{"value":"{not json"}}"#).unwrap();
        let err = raw.records::<DatabaseOutput>().unwrap_err();
        assert!(matches!(err, InfraError::MalformedOutput { ref key, .. } if key == "database_output_foo"));
    }

    #[test]
    fn test_non_string_embedded_value_is_fatal() {
        let raw = RawOutputs::parse(r#"{"database_output_foo":{"value":42}}"#).unwrap();
        assert!(raw.records::<DatabaseOutput>().is_err());
    }

    #[test]
    fn test_malformed_document_is_fatal() {
        assert!(RawOutputs::parse("[1, 2").is_err());
        assert!(RawOutputs::from_fetch::<String>(Ok(b"nope".to_vec())).is_err());
    }

    #[test]
    fn test_failed_fetch_bootstraps_empty() {
        let raw = RawOutputs::from_fetch(Err("no state")).unwrap();
        assert_eq!(raw.scalar("vpc_id"), "");
        let outputs = Outputs::from_raw(&raw).unwrap();
        assert_eq!(outputs, Outputs::empty());
    }
}
