//! In-cluster resources
//!
//! Everything applied to a cluster once it has converged: a config map per search
//! cluster, a secret per database and, when the cluster names a logging target, the
//! fluent-bit bundle. Manifests are plain JSON objects so any applier can take them.

use crate::config::{KubernetesCluster, Spec};
use crate::error::Result;
use crate::outputs::Outputs;
use crate::render::Renderer;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};

const NAMESPACE: &str = "default";

/// `ConfigMap` per search cluster exposing its endpoint.
pub fn search_cluster_config_maps(outputs: &Outputs) -> Vec<Value> {
    outputs
        .search_clusters
        .values()
        .map(|cluster| {
            json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": { "name": cluster.name, "namespace": NAMESPACE },
                "data": { "endpoint": cluster.endpoint },
            })
        })
        .collect()
}

/// Opaque `Secret` per database carrying schema, endpoint and password.
pub fn database_secrets(outputs: &Outputs) -> Vec<Value> {
    outputs
        .databases
        .values()
        .map(|database| {
            json!({
                "apiVersion": "v1",
                "kind": "Secret",
                "type": "Opaque",
                "metadata": { "name": database.name, "namespace": NAMESPACE },
                "data": {
                    "schema": STANDARD.encode(&database.name),
                    "endpoint": STANDARD.encode(&database.endpoint),
                    "password": STANDARD.encode(&database.password),
                },
            })
        })
        .collect()
}

/// Split a multi-document YAML manifest into objects, dropping empty documents.
pub fn parse_documents(manifest: &str) -> Result<Vec<Value>> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(manifest) {
        let value = Value::deserialize(document)?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    Ok(documents)
}

/// The fluent-bit bundle for `cluster`, pointed at its logging search cluster.
///
/// Empty when the cluster has no logging target or the target has not been
/// provisioned yet.
pub fn logging_bundle(
    renderer: &Renderer,
    spec: &Spec,
    cluster: &KubernetesCluster,
    outputs: &Outputs,
) -> Result<Vec<Value>> {
    let Some(target) = cluster.logging_search_cluster.as_deref() else {
        return Ok(Vec::new());
    };
    let Some(search_cluster) = outputs.search_cluster(target) else {
        tracing::warn!(
            cluster = %cluster.name,
            target,
            "Logging search cluster has no outputs yet, skipping fluent-bit"
        );
        return Ok(Vec::new());
    };

    parse_documents(&renderer.fluent_bit(&search_cluster.endpoint, &spec.region)?)
}

/// All manifests applied to `cluster` after it converges, in application order.
pub fn in_cluster_manifests(
    renderer: &Renderer,
    spec: &Spec,
    cluster: &KubernetesCluster,
    outputs: &Outputs,
) -> Result<Vec<Value>> {
    let mut manifests = search_cluster_config_maps(outputs);
    manifests.extend(database_secrets(outputs));
    manifests.extend(logging_bundle(renderer, spec, cluster, outputs)?);
    Ok(manifests)
}
