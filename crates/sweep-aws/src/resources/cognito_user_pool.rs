//! Cognito user pools
//!
//! Pools can carry deletion protection. When the feature flag allows it,
//! satisfy turns protection off and keeps the pool's verification settings
//! so the update call is accepted.

use super::rfc3339;
use crate::context::AwsContext;
use crate::error::removal_error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::types::{DeletionProtectionType, UserPoolDescriptionType};
use sweep_core::{Lister, Precondition, Properties, RemovalError, Resource};
use tracing::debug;

/// Largest page size ListUserPools accepts
const LIST_PAGE_SIZE: i32 = 50;

pub struct CognitoUserPool {
    client: aws_sdk_cognitoidentityprovider::Client,
    id: String,
    name: String,
    properties: Properties,
}

impl CognitoUserPool {
    fn from_sdk(
        client: aws_sdk_cognitoidentityprovider::Client,
        pool: &UserPoolDescriptionType,
    ) -> Option<Self> {
        let id = pool.id()?.to_string();
        let name = pool.name().unwrap_or(&id).to_string();

        let mut properties = Properties::new();
        properties
            .set("Name", &name)
            .set("Id", &id)
            .set_opt("CreationDate", pool.creation_date().and_then(rfc3339));

        Some(Self {
            client,
            id,
            name,
            properties,
        })
    }

    async fn disable_deletion_protection(&self) -> Result<(), RemovalError> {
        let described = self
            .client
            .describe_user_pool()
            .user_pool_id(&self.id)
            .send()
            .await
            .map_err(removal_error)?;

        let verified = described
            .user_pool()
            .and_then(|p| p.user_attribute_update_settings())
            .map(|s| s.attributes_require_verification_before_update().to_vec());

        debug!(user_pool_id = %self.id, "Disabling deletion protection");
        self.client
            .update_user_pool()
            .user_pool_id(&self.id)
            .deletion_protection(DeletionProtectionType::Inactive)
            .set_auto_verified_attributes(verified)
            .send()
            .await
            .map_err(removal_error)?;
        Ok(())
    }
}

#[async_trait]
impl Resource for CognitoUserPool {
    fn identify(&self) -> String {
        self.name.clone()
    }

    async fn remove(&self) -> Result<(), RemovalError> {
        self.client
            .delete_user_pool()
            .user_pool_id(&self.id)
            .send()
            .await
            .map_err(removal_error)?;
        Ok(())
    }

    fn properties(&self) -> Properties {
        self.properties.clone()
    }

    async fn satisfy(&self, precondition: Precondition) -> Result<(), RemovalError> {
        match precondition {
            Precondition::DisableDeletionProtection => self.disable_deletion_protection().await,
        }
    }
}

/// Lists the user pools in the session's region
pub struct CognitoUserPoolLister;

#[async_trait]
impl Lister<AwsContext> for CognitoUserPoolLister {
    async fn list(&self, ctx: &AwsContext) -> Result<Vec<Box<dyn Resource>>> {
        let client = ctx.cognito_client();
        let mut resources: Vec<Box<dyn Resource>> = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = client
                .list_user_pools()
                .max_results(LIST_PAGE_SIZE)
                .set_next_token(next_token.take())
                .send()
                .await
                .context("Failed to list Cognito user pools")?;

            for pool in page.user_pools() {
                if let Some(resource) = CognitoUserPool::from_sdk(client.clone(), pool) {
                    resources.push(Box::new(resource));
                }
            }

            match page.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> aws_sdk_cognitoidentityprovider::Client {
        let config = aws_sdk_cognitoidentityprovider::Config::builder()
            .behavior_version(aws_sdk_cognitoidentityprovider::config::BehaviorVersion::latest())
            .region(aws_sdk_cognitoidentityprovider::config::Region::new("us-east-1"))
            .build();
        aws_sdk_cognitoidentityprovider::Client::from_conf(config)
    }

    #[test]
    fn test_from_sdk() {
        let desc = UserPoolDescriptionType::builder()
            .id("us-east-1_abc")
            .name("ci-pool")
            .build();
        let pool = CognitoUserPool::from_sdk(offline_client(), &desc).unwrap();
        assert_eq!(pool.identify(), "ci-pool");
        assert_eq!(pool.properties().get("Id"), Some("us-east-1_abc"));
        assert!(pool.filter().is_none());
    }

    #[test]
    fn test_unnamed_pool_uses_id() {
        let desc = UserPoolDescriptionType::builder().id("us-east-1_xyz").build();
        let pool = CognitoUserPool::from_sdk(offline_client(), &desc).unwrap();
        assert_eq!(pool.identify(), "us-east-1_xyz");
    }
}
