//! AWS control-plane prerequisites
//!
//! The state bucket, the environment encryption key and the search service-linked
//! role. Each operation is create-if-absent, so `init` and `apply` can be repeated.

use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_kms::types::KeyState;
use aws_sdk_s3::types::{
    BucketLocationConstraint, BucketVersioningStatus, CreateBucketConfiguration,
    VersioningConfiguration,
};
use fk_infra_core::engine::ControlPlane;
use fk_infra_core::InfraError;
use tracing::{debug, info};

/// Description attached to newly created environment keys.
pub const KEY_DESCRIPTION: &str =
    "Used to encrypt and decrypt infrastructure secrets for safe storage";

/// The only region where S3 rejects an explicit location constraint.
const DEFAULT_S3_REGION: &str = "us-east-1";

/// KMS alias of an environment's key.
pub fn key_alias(environment_name: &str) -> String {
    format!("alias/environment-key-{}", environment_name)
}

/// Location constraint for a bucket created in `region`.
pub fn location_constraint(region: &str) -> Option<BucketLocationConstraint> {
    if region == DEFAULT_S3_REGION {
        None
    } else {
        Some(BucketLocationConstraint::from(region))
    }
}

/// Shared SDK configuration pinned to one region.
pub async fn load_sdk_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}

pub struct AwsControlPlane {
    s3: aws_sdk_s3::Client,
    kms: aws_sdk_kms::Client,
    iam: aws_sdk_iam::Client,
    region: String,
}

impl AwsControlPlane {
    pub fn new(config: &SdkConfig, region: impl Into<String>) -> Self {
        Self {
            s3: aws_sdk_s3::Client::new(config),
            kms: aws_sdk_kms::Client::new(config),
            iam: aws_sdk_iam::Client::new(config),
            region: region.into(),
        }
    }

    pub async fn connect(region: &str) -> Self {
        let config = load_sdk_config(region).await;
        Self::new(&config, region)
    }

    pub fn kms_client(&self) -> &aws_sdk_kms::Client {
        &self.kms
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let listed = self
            .s3
            .list_buckets()
            .send()
            .await
            .map_err(|e| AwsError::api("ListBuckets", e))?;

        Ok(listed
            .buckets()
            .iter()
            .any(|b| b.name() == Some(bucket)))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        info!(bucket, region = %self.region, "Creating state bucket");

        let configuration = location_constraint(&self.region).map(|constraint| {
            CreateBucketConfiguration::builder()
                .location_constraint(constraint)
                .build()
        });

        self.s3
            .create_bucket()
            .bucket(bucket)
            .set_create_bucket_configuration(configuration)
            .send()
            .await
            .map_err(|e| AwsError::api("CreateBucket", e))?;

        self.s3
            .put_bucket_versioning()
            .bucket(bucket)
            .versioning_configuration(
                VersioningConfiguration::builder()
                    .status(BucketVersioningStatus::Enabled)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| AwsError::api("PutBucketVersioning", e))?;

        Ok(())
    }

    async fn create_key(&self, alias: &str) -> Result<()> {
        info!(alias, "Creating encryption key");

        let created = self
            .kms
            .create_key()
            .description(KEY_DESCRIPTION)
            .send()
            .await
            .map_err(|e| AwsError::api("CreateKey", e))?;

        let key_id = created
            .key_metadata()
            .map(|metadata| metadata.key_id().to_string())
            .ok_or(AwsError::MissingField {
                operation: "CreateKey",
                field: "KeyMetadata",
            })?;

        self.kms
            .create_alias()
            .alias_name(alias)
            .target_key_id(key_id)
            .send()
            .await
            .map_err(|e| AwsError::api("CreateAlias", e))?;

        Ok(())
    }
}

#[async_trait]
impl ControlPlane for AwsControlPlane {
    async fn ensure_bucket(&self, bucket: &str) -> fk_infra_core::Result<String> {
        if self.bucket_exists(bucket).await? {
            debug!(bucket, "State bucket exists");
        } else {
            self.create_bucket(bucket).await?;
        }
        Ok(bucket.to_string())
    }

    async fn ensure_encryption_key(&self, environment_name: &str) -> fk_infra_core::Result<String> {
        let alias = key_alias(environment_name);

        match self.kms.describe_key().key_id(&alias).send().await {
            Ok(described) => {
                let state = described
                    .key_metadata()
                    .and_then(|metadata| metadata.key_state())
                    .cloned();
                if state != Some(KeyState::Enabled) {
                    return Err(AwsError::KeyNotEnabled {
                        alias,
                        state: state.map_or_else(|| "unknown".to_string(), |s| s.as_str().to_string()),
                    }
                    .into());
                }
                debug!(alias = %alias, "Encryption key exists");
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|service| service.is_not_found_exception()) =>
            {
                self.create_key(&alias).await?;
            }
            Err(e) => return Err(AwsError::api("DescribeKey", e).into()),
        }

        Ok(alias)
    }

    async fn ensure_service_linked_role(&self, service: &str) -> fk_infra_core::Result<()> {
        match self
            .iam
            .create_service_linked_role()
            .aws_service_name(service)
            .send()
            .await
        {
            Ok(_) => {
                info!(service, "Created service-linked role");
                Ok(())
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|service| service.is_invalid_input_exception()) =>
            {
                Err(InfraError::AlreadyExists(format!(
                    "service-linked role for {}",
                    service
                )))
            }
            Err(e) => Err(AwsError::api("CreateServiceLinkedRole", e).into()),
        }
    }
}
