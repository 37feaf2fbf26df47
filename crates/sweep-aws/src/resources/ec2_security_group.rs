//! EC2 security groups
//!
//! Groups that reference each other cannot be deleted until the rules are
//! gone, so settle revokes every ingress and egress rule first.

use crate::context::AwsContext;
use crate::error::removal_error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_ec2::types::{IpPermission, SecurityGroup};
use sweep_core::{Lister, Properties, RemovalError, Resource, Settle};
use tracing::debug;

pub struct Ec2SecurityGroup {
    client: aws_sdk_ec2::Client,
    id: String,
    name: String,
    ingress: Vec<IpPermission>,
    egress: Vec<IpPermission>,
    properties: Properties,
}

impl Ec2SecurityGroup {
    fn from_sdk(client: aws_sdk_ec2::Client, group: &SecurityGroup) -> Option<Self> {
        let id = group.group_id()?.to_string();
        let name = group.group_name().unwrap_or_default().to_string();

        let mut properties = Properties::new();
        properties
            .set("GroupId", &id)
            .set("Name", &name)
            .set_opt("VpcId", group.vpc_id())
            .set_opt("OwnerId", group.owner_id());
        for tag in group.tags() {
            if let (Some(key), Some(value)) = (tag.key(), tag.value()) {
                properties.set_tag(key, value);
            }
        }

        Some(Self {
            client,
            id,
            name,
            ingress: group.ip_permissions().to_vec(),
            egress: group.ip_permissions_egress().to_vec(),
            properties,
        })
    }

    fn ignore_not_found(result: Result<(), RemovalError>) -> Result<(), RemovalError> {
        match result {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }
}

#[async_trait]
impl Resource for Ec2SecurityGroup {
    fn identify(&self) -> String {
        format!("{} ({})", self.id, self.name)
    }

    fn filter(&self) -> Option<String> {
        (self.name == "default").then(|| "cannot delete group 'default'".to_string())
    }

    async fn remove(&self) -> Result<(), RemovalError> {
        self.client
            .delete_security_group()
            .group_id(&self.id)
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
impl Settle for Ec2SecurityGroup {
    async fn settle(&self) -> Result<(), RemovalError> {
        if !self.ingress.is_empty() {
            debug!(group_id = %self.id, rules = self.ingress.len(), "Revoking ingress rules");
            let result = self
                .client
                .revoke_security_group_ingress()
                .group_id(&self.id)
                .set_ip_permissions(Some(self.ingress.clone()))
                .send()
                .await
                .map(|_| ())
                .map_err(removal_error);
            Self::ignore_not_found(result)?;
        }

        if !self.egress.is_empty() {
            debug!(group_id = %self.id, rules = self.egress.len(), "Revoking egress rules");
            let result = self
                .client
                .revoke_security_group_egress()
                .group_id(&self.id)
                .set_ip_permissions(Some(self.egress.clone()))
                .send()
                .await
                .map(|_| ())
                .map_err(removal_error);
            Self::ignore_not_found(result)?;
        }

        Ok(())
    }
}

/// Lists every security group in the session's region
pub struct Ec2SecurityGroupLister;

#[async_trait]
impl Lister<AwsContext> for Ec2SecurityGroupLister {
    async fn list(&self, ctx: &AwsContext) -> Result<Vec<Box<dyn Resource>>> {
        let client = ctx.ec2_client();
        let mut resources: Vec<Box<dyn Resource>> = Vec::new();

        let mut pages = client.describe_security_groups().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.context("Failed to describe security groups")?;
            for group in page.security_groups() {
                if let Some(resource) = Ec2SecurityGroup::from_sdk(client.clone(), group) {
                    resources.push(Box::new(resource));
                }
            }
        }

        Ok(resources)
    }
}
