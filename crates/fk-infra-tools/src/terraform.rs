//! terraform wrapper
//!
//! Runs the pinned terraform release from the tool cache against the definitions
//! staged in the working directory.

use crate::error::{Result, ToolsError};
use crate::fetcher::{BinaryCache, set_mode};
use crate::platform::Platform;
use async_trait::async_trait;
use fk_infra_core::{ProvisioningEngine, RenderedDefinition};
use std::path::{Path, PathBuf};

pub const BINARY_NAME: &str = "terraform";

pub fn download_url(version: &str, platform: Platform) -> String {
    format!(
        "https://releases.hashicorp.com/terraform/{v}/terraform_{v}_{os}_{arch}.zip",
        v = version,
        os = platform.os,
        arch = platform.arch
    )
}

/// Unpack the release zip into `cache_dir` and remove it.
pub fn install_from_zip(archive: &Path, cache_dir: &Path) -> Result<()> {
    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| ToolsError::Archive(e.to_string()))?;
    zip.extract(cache_dir)
        .map_err(|e| ToolsError::Archive(e.to_string()))?;
    std::fs::remove_file(archive)?;

    let binary = cache_dir.join(BINARY_NAME);
    if binary.exists() {
        set_mode(&binary, 0o755)?;
    }
    Ok(())
}

pub struct Terraform {
    cache: BinaryCache,
    version: String,
}

impl Terraform {
    pub fn new(cache: BinaryCache, version: impl Into<String>) -> Self {
        Self {
            cache,
            version: version.into(),
        }
    }

    pub fn binary_path(&self) -> PathBuf {
        self.cache.cache_dir().join(BINARY_NAME)
    }

    pub async fn execute(&self, args: &[&str]) -> Result<Vec<u8>> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let cache_dir = self.cache.cache_dir().to_path_buf();

        self.cache
            .obtain(
                &self.binary_path(),
                || Ok(download_url(&self.version, Platform::current()?)),
                move |archive: &Path| install_from_zip(archive, &cache_dir),
                &args,
            )
            .await
    }
}

#[async_trait]
impl ProvisioningEngine for Terraform {
    async fn stage(&self, definition: &RenderedDefinition) -> fk_infra_core::Result<()> {
        let path = self.cache.working_dir().join(&definition.file_name);
        tokio::fs::write(&path, &definition.content).await?;
        tracing::debug!(path = %path.display(), "Staged definition");
        Ok(())
    }

    async fn init(&self) -> fk_infra_core::Result<()> {
        self.execute(&["init"]).await?;
        Ok(())
    }

    async fn plan(&self) -> fk_infra_core::Result<()> {
        self.execute(&["plan"]).await?;
        Ok(())
    }

    async fn apply(&self) -> fk_infra_core::Result<()> {
        self.execute(&["apply", "-auto-approve"]).await?;
        Ok(())
    }

    async fn output_json(&self) -> fk_infra_core::Result<Vec<u8>> {
        Ok(self.execute(&["output", "-json"]).await?)
    }
}
