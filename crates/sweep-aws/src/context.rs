//! Shared AWS configuration context
//!
//! Provides `AwsContext` for loading AWS SDK configuration once per region
//! and creating service clients from the same config. The context is the
//! session type passed to every lister.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use std::sync::Arc;
use sweep_core::Sessions;

/// Region used for account-scoped (global) APIs
pub const GLOBAL_API_REGION: &str = "us-east-1";

/// Shared AWS configuration context for creating service clients.
///
/// Clients created from the same context share the loaded config, so they
/// are cheap to create per lister call and safe to share across attempts.
#[derive(Clone)]
pub struct AwsContext {
    config: Arc<SdkConfig>,
    region: String,
}

impl AwsContext {
    /// Load AWS configuration for the specified region.
    ///
    /// Credentials come from the SDK default chain, optionally pinned to a
    /// named profile.
    pub async fn new(region: &str, profile: Option<&str>) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;

        Self {
            config: Arc::new(config),
            region: region.to_string(),
        }
    }

    /// Get the underlying SDK config for direct client construction.
    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    /// Get the region string.
    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn ec2_client(&self) -> aws_sdk_ec2::Client {
        aws_sdk_ec2::Client::new(self.sdk_config())
    }

    pub fn iam_client(&self) -> aws_sdk_iam::Client {
        aws_sdk_iam::Client::new(self.sdk_config())
    }

    pub fn sts_client(&self) -> aws_sdk_sts::Client {
        aws_sdk_sts::Client::new(self.sdk_config())
    }

    pub fn s3_client(&self) -> aws_sdk_s3::Client {
        aws_sdk_s3::Client::new(self.sdk_config())
    }

    pub fn cognito_client(&self) -> aws_sdk_cognitoidentityprovider::Client {
        aws_sdk_cognitoidentityprovider::Client::new(self.sdk_config())
    }

    pub fn rds_client(&self) -> aws_sdk_rds::Client {
        aws_sdk_rds::Client::new(self.sdk_config())
    }

    pub fn signer_client(&self) -> aws_sdk_signer::Client {
        aws_sdk_signer::Client::new(self.sdk_config())
    }
}

impl std::fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsContext")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Load one context for global APIs and one per configured region
pub async fn load_sessions(regions: &[String], profile: Option<&str>) -> Sessions<AwsContext> {
    let global = AwsContext::new(GLOBAL_API_REGION, profile).await;
    let mut regional = Vec::with_capacity(regions.len());
    for region in regions {
        regional.push((region.clone(), AwsContext::new(region, profile).await));
    }
    Sessions { global, regional }
}
