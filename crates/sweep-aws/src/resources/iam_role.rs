//! IAM roles
//!
//! Roles are global, so this lister runs once with the account session.
//! A role cannot be deleted while it still has managed policies attached,
//! inline policies, or instance profile memberships; settle clears all three.

use super::rfc3339;
use crate::context::AwsContext;
use crate::error::removal_error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_iam::types::Role;
use sweep_core::{Lister, Properties, RemovalError, Resource, Settle};
use tracing::debug;

/// Path prefixes owned by AWS itself
const PROTECTED_PATH_PREFIXES: &[&str] = &["/aws-service-role/", "/aws-reserved/"];

pub struct IamRole {
    client: aws_sdk_iam::Client,
    name: String,
    path: String,
    properties: Properties,
}

impl IamRole {
    fn new(client: aws_sdk_iam::Client, role: &Role) -> Self {
        let mut properties = Properties::new();
        properties
            .set("Name", role.role_name())
            .set("Path", role.path())
            .set("Arn", role.arn())
            .set_opt("CreateDate", rfc3339(role.create_date()))
            .set_opt(
                "LastUsedDate",
                role.role_last_used()
                    .and_then(|u| u.last_used_date())
                    .and_then(rfc3339),
            );

        Self {
            client,
            name: role.role_name().to_string(),
            path: role.path().to_string(),
            properties,
        }
    }

    async fn detach_managed_policies(&self) -> Result<(), RemovalError> {
        let mut pages = self
            .client
            .list_attached_role_policies()
            .role_name(&self.name)
            .into_paginator()
            .send();
        let mut arns = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(removal_error)?;
            arns.extend(
                page.attached_policies()
                    .iter()
                    .filter_map(|p| p.policy_arn().map(str::to_string)),
            );
        }

        for arn in arns {
            debug!(role = %self.name, policy_arn = %arn, "Detaching managed policy");
            self.client
                .detach_role_policy()
                .role_name(&self.name)
                .policy_arn(&arn)
                .send()
                .await
                .map(|_| ())
                .or_else(ignore_not_found)?;
        }
        Ok(())
    }

    async fn delete_inline_policies(&self) -> Result<(), RemovalError> {
        let mut pages = self
            .client
            .list_role_policies()
            .role_name(&self.name)
            .into_paginator()
            .send();
        let mut names = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(removal_error)?;
            names.extend(page.policy_names().iter().cloned());
        }

        for policy_name in names {
            debug!(role = %self.name, policy_name = %policy_name, "Deleting inline policy");
            self.client
                .delete_role_policy()
                .role_name(&self.name)
                .policy_name(&policy_name)
                .send()
                .await
                .map(|_| ())
                .or_else(ignore_not_found)?;
        }
        Ok(())
    }

    async fn leave_instance_profiles(&self) -> Result<(), RemovalError> {
        let mut pages = self
            .client
            .list_instance_profiles_for_role()
            .role_name(&self.name)
            .into_paginator()
            .send();
        let mut profiles = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(removal_error)?;
            profiles.extend(
                page.instance_profiles()
                    .iter()
                    .map(|p| p.instance_profile_name().to_string()),
            );
        }

        for profile in profiles {
            debug!(role = %self.name, instance_profile = %profile, "Removing role from instance profile");
            self.client
                .remove_role_from_instance_profile()
                .instance_profile_name(&profile)
                .role_name(&self.name)
                .send()
                .await
                .map(|_| ())
                .or_else(ignore_not_found)?;
        }
        Ok(())
    }
}

fn ignore_not_found<E, R>(error: aws_sdk_iam::error::SdkError<E, R>) -> Result<(), RemovalError>
where
    E: aws_sdk_iam::error::ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let error = removal_error(error);
    if error.is_not_found() {
        Ok(())
    } else {
        Err(error)
    }
}

/// Whether a role path belongs to AWS-managed roles
pub fn is_protected_path(path: &str) -> bool {
    PROTECTED_PATH_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

#[async_trait]
impl Resource for IamRole {
    fn identify(&self) -> String {
        self.name.clone()
    }

    fn filter(&self) -> Option<String> {
        is_protected_path(&self.path).then(|| format!("cannot delete AWS-managed role under {}", self.path))
    }

    async fn remove(&self) -> Result<(), RemovalError> {
        self.client
            .delete_role()
            .role_name(&self.name)
            .send()
            .await
            .map_err(removal_error)?;
        Ok(())
    }

    fn properties(&self) -> Properties {
        self.properties.clone()
    }

    fn settle(&self) -> Option<&dyn Settle> {
        Some(self)
    }
}

#[async_trait]
impl Settle for IamRole {
    async fn settle(&self) -> Result<(), RemovalError> {
        self.detach_managed_policies().await?;
        self.delete_inline_policies().await?;
        self.leave_instance_profiles().await
    }
}

/// Lists every IAM role in the account
pub struct IamRoleLister;

#[async_trait]
impl Lister<AwsContext> for IamRoleLister {
    async fn list(&self, ctx: &AwsContext) -> Result<Vec<Box<dyn Resource>>> {
        let client = ctx.iam_client();
        let mut roles = Vec::new();

        let mut pages = client.list_roles().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.context("Failed to list IAM roles")?;
            roles.extend(page.roles().iter().cloned());
        }

        let mut resources: Vec<Box<dyn Resource>> = Vec::with_capacity(roles.len());
        for role in &roles {
            let mut resource = IamRole::new(client.clone(), role);

            // AWS-managed roles are filtered anyway; skip the extra call
            if !is_protected_path(role.path()) {
                let tags = client
                    .list_role_tags()
                    .role_name(role.role_name())
                    .send()
                    .await
                    .with_context(|| format!("Failed to list tags for role {}", role.role_name()))?;
                for tag in tags.tags() {
                    resource.properties.set_tag(tag.key(), tag.value());
                }
            }

            resources.push(Box::new(resource));
        }

        Ok(resources)
    }
}
