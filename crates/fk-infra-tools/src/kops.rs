//! kops wrapper
//!
//! Every invocation carries the state store flag. Cluster definitions are written to
//! `<cluster>.yml` in the working directory before `kops replace` reads them.

use crate::error::Result;
use crate::fetcher::{BinaryCache, set_mode};
use crate::platform::Platform;
use async_trait::async_trait;
use fk_infra_core::{ClusterEngine, RenderedDefinition};
use std::path::{Path, PathBuf};

pub const BINARY_NAME: &str = "kops";

pub fn download_url(version: &str, platform: Platform) -> String {
    format!(
        "https://github.com/kubernetes/kops/releases/download/{}/kops-{}-{}",
        version, platform.os, platform.arch
    )
}

/// Move the downloaded binary into place.
pub fn install_binary(temp: &Path, binary: &Path) -> Result<()> {
    std::fs::rename(temp, binary)?;
    set_mode(binary, 0o740)
}

pub fn state_flag(config_bucket: &str) -> String {
    format!("--state=s3://{}/kops", config_bucket)
}

pub fn name_flag(cluster: &str) -> String {
    format!("--name={}", cluster)
}

pub struct Kops {
    cache: BinaryCache,
    version: String,
    state: String,
}

impl Kops {
    pub fn new(cache: BinaryCache, version: impl Into<String>, config_bucket: &str) -> Self {
        Self {
            cache,
            version: version.into(),
            state: state_flag(config_bucket),
        }
    }

    pub fn binary_path(&self) -> PathBuf {
        self.cache.cache_dir().join(BINARY_NAME)
    }

    pub fn replace_args(&self, file_name: &str) -> Vec<String> {
        vec![
            self.state.clone(),
            "replace".to_string(),
            "-f".to_string(),
            format!("./{}", file_name),
            "--force".to_string(),
        ]
    }

    pub fn secret_args(&self, cluster: &str, public_key: &Path) -> Vec<String> {
        vec![
            self.state.clone(),
            "create".to_string(),
            "secret".to_string(),
            name_flag(cluster),
            "sshpublickey".to_string(),
            "admin".to_string(),
            "-i".to_string(),
            public_key.display().to_string(),
        ]
    }

    pub fn update_args(&self, cluster: &str, confirm: bool) -> Vec<String> {
        let mut args = vec![
            self.state.clone(),
            "update".to_string(),
            "cluster".to_string(),
            name_flag(cluster),
        ];
        if confirm {
            args.push("--yes".to_string());
        }
        args
    }

    pub fn validate_args(&self, cluster: &str) -> Vec<String> {
        vec![
            self.state.clone(),
            "validate".to_string(),
            "cluster".to_string(),
            name_flag(cluster),
        ]
    }

    pub async fn execute(&self, args: &[String]) -> Result<Vec<u8>> {
        let binary = self.binary_path();
        let target = binary.clone();

        self.cache
            .obtain(
                &binary,
                || Ok(download_url(&self.version, Platform::current()?)),
                move |temp: &Path| install_binary(temp, &target),
                args,
            )
            .await
    }
}

#[async_trait]
impl ClusterEngine for Kops {
    async fn replace(
        &self,
        _cluster: &str,
        definition: &RenderedDefinition,
    ) -> fk_infra_core::Result<()> {
        let path = self.cache.working_dir().join(&definition.file_name);
        tokio::fs::write(&path, &definition.content).await?;
        self.execute(&self.replace_args(&definition.file_name))
            .await?;
        Ok(())
    }

    async fn create_ssh_secret(&self, cluster: &str, public_key: &Path) -> fk_infra_core::Result<()> {
        self.execute(&self.secret_args(cluster, public_key)).await?;
        Ok(())
    }

    async fn update(&self, cluster: &str, confirm: bool) -> fk_infra_core::Result<()> {
        self.execute(&self.update_args(cluster, confirm)).await?;
        Ok(())
    }

    async fn validate(&self, cluster: &str) -> fk_infra_core::Result<()> {
        self.execute(&self.validate_args(cluster)).await?;
        Ok(())
    }
}
