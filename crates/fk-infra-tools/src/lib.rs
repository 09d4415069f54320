//! External provisioning engines
//!
//! terraform and kops are downloaded on first use into the workspace tool cache and
//! run as child processes. [`Terraform`] implements
//! [`fk_infra_core::ProvisioningEngine`]; [`Kops`] implements
//! [`fk_infra_core::ClusterEngine`].

pub mod error;
pub mod fetcher;
pub mod kops;
pub mod platform;
pub mod terraform;

pub use error::{Result, ToolsError};
pub use fetcher::{BinaryCache, Downloader, HttpDownloader};
pub use kops::Kops;
pub use platform::Platform;
pub use terraform::Terraform;
