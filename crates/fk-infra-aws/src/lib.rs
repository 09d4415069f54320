//! AWS adapters for fk-infra
//!
//! - [`AwsControlPlane`]: state bucket, environment KMS key, service-linked roles
//! - [`KmsEnvelopeCipher`]: envelope encryption of files kept in the repository
//! - [`KeyStore`]: the cluster admin SSH key pair and its encrypted copies

pub mod cipher;
pub mod control_plane;
pub mod error;
pub mod keys;

pub use cipher::{KmsEnvelopeCipher, SecretCipher};
pub use control_plane::{AwsControlPlane, key_alias, load_sdk_config};
pub use error::{AwsError, Result};
pub use keys::{KeyMaterial, KeyStore};
