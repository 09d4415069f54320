//! Server-side apply of generic manifests
//!
//! Manifests arrive as JSON values with `apiVersion`, `kind` and `metadata`. Each is
//! applied with a single field manager, so a second run updates what the first one
//! created instead of failing on a conflict.

use crate::error::{KubeError, Result};
use async_trait::async_trait;
use fk_infra_core::engine::ClusterResources;
use kube::api::{Api, DynamicObject, GroupVersionKind, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Client, Config};
use serde_json::Value;
use tracing::{debug, info};

pub const FIELD_MANAGER: &str = "fk-infra";

/// Where a manifest goes.
#[derive(Debug, Clone)]
pub struct ManifestTarget {
    pub api_resource: ApiResource,
    pub name: String,
    /// `None` for cluster-scoped kinds.
    pub namespace: Option<String>,
}

impl ManifestTarget {
    pub fn from_manifest(manifest: &Value) -> Result<Self> {
        let field = |pointer: &str| manifest.pointer(pointer).and_then(Value::as_str);

        let api_version = field("/apiVersion")
            .ok_or_else(|| KubeError::Manifest("missing apiVersion".to_string()))?;
        let kind =
            field("/kind").ok_or_else(|| KubeError::Manifest("missing kind".to_string()))?;
        let name = field("/metadata/name").ok_or_else(|| {
            KubeError::Manifest(format!("{} is missing metadata.name", kind))
        })?;

        let (group, version) = parse_api_version(api_version);
        let gvk = GroupVersionKind {
            group,
            version,
            kind: kind.to_string(),
        };

        Ok(Self {
            api_resource: ApiResource::from_gvk(&gvk),
            name: name.to_string(),
            namespace: field("/metadata/namespace").map(str::to_string),
        })
    }

    pub fn kind(&self) -> &str {
        &self.api_resource.kind
    }
}

/// `apps/v1` -> (`apps`, `v1`), `v1` -> (``, `v1`).
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Applies manifests through the kubeconfig context named after the cluster, which
/// is the context kops writes on update.
#[derive(Debug, Clone, Default)]
pub struct KubeApplier;

impl KubeApplier {
    pub fn new() -> Self {
        Self
    }

    async fn client_for(&self, cluster: &str) -> Result<Client> {
        let client_error = |message: String| KubeError::Client {
            context: cluster.to_string(),
            message,
        };

        let kubeconfig = Kubeconfig::read().map_err(|e| client_error(e.to_string()))?;
        let options = KubeConfigOptions {
            context: Some(cluster.to_string()),
            ..Default::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .map_err(|e| client_error(e.to_string()))?;

        Client::try_from(config).map_err(|e| client_error(e.to_string()))
    }

    async fn apply_one(&self, client: &Client, manifest: &Value) -> Result<()> {
        let target = ManifestTarget::from_manifest(manifest)?;

        let api: Api<DynamicObject> = match &target.namespace {
            Some(ns) => Api::namespaced_with(client.clone(), ns, &target.api_resource),
            None => Api::all_with(client.clone(), &target.api_resource),
        };

        api.patch(
            &target.name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(manifest),
        )
        .await
        .map_err(|e| KubeError::Apply {
            kind: target.kind().to_string(),
            name: target.name.clone(),
            message: e.to_string(),
        })?;

        debug!(kind = target.kind(), name = %target.name, namespace = ?target.namespace, "Applied manifest");
        Ok(())
    }
}

#[async_trait]
impl ClusterResources for KubeApplier {
    async fn apply(&self, cluster: &str, manifests: &[Value]) -> fk_infra_core::Result<usize> {
        if manifests.is_empty() {
            return Ok(0);
        }

        let client = self.client_for(cluster).await?;
        for manifest in manifests {
            self.apply_one(&client, manifest).await?;
        }

        info!(cluster, count = manifests.len(), "Applied in-cluster resources");
        Ok(manifests.len())
    }
}
