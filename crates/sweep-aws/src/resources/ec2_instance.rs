//! EC2 instances
//!
//! Termination protection surfaces as a deletion-protection precondition:
//! when authorized, the `disableApiTermination` attribute is cleared and the
//! terminate call retried.

use super::rfc3339;
use crate::context::AwsContext;
use crate::error::removal_error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_ec2::types::{AttributeBooleanValue, InstanceStateName};
use sweep_core::{Lister, Precondition, Properties, RemovalError, Resource};
use tracing::debug;

pub struct Ec2Instance {
    client: aws_sdk_ec2::Client,
    id: String,
    state: Option<InstanceStateName>,
    properties: Properties,
}

impl Ec2Instance {
    fn from_sdk(client: aws_sdk_ec2::Client, instance: &aws_sdk_ec2::types::Instance) -> Option<Self> {
        let id = instance.instance_id()?.to_string();
        let state = instance.state().and_then(|s| s.name()).cloned();

        let mut properties = Properties::new();
        properties
            .set("InstanceId", &id)
            .set_opt("InstanceType", instance.instance_type().map(|t| t.as_str()))
            .set_opt("State", state.as_ref().map(|s| s.as_str()))
            .set_opt("LaunchTime", instance.launch_time().and_then(rfc3339))
            .set_opt("VpcId", instance.vpc_id());
        for tag in instance.tags() {
            if let (Some(key), Some(value)) = (tag.key(), tag.value()) {
                properties.set_tag(key, value);
            }
        }

        Some(Self {
            client,
            id,
            state,
            properties,
        })
    }
}

#[async_trait]
impl Resource for Ec2Instance {
    fn identify(&self) -> String {
        self.id.clone()
    }

    fn filter(&self) -> Option<String> {
        match self.state {
            Some(InstanceStateName::Terminated) => Some("already terminated".to_string()),
            _ => None,
        }
    }

    async fn remove(&self) -> Result<(), RemovalError> {
        self.client
            .terminate_instances()
            .instance_ids(&self.id)
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
            Precondition::DisableDeletionProtection => {
                debug!(instance_id = %self.id, "Disabling termination protection");
                self.client
                    .modify_instance_attribute()
                    .instance_id(&self.id)
                    .disable_api_termination(AttributeBooleanValue::builder().value(false).build())
                    .send()
                    .await
                    .map_err(removal_error)?;
                Ok(())
            }
        }
    }
}

/// Lists every instance in the session's region
pub struct Ec2InstanceLister;

#[async_trait]
impl Lister<AwsContext> for Ec2InstanceLister {
    async fn list(&self, ctx: &AwsContext) -> Result<Vec<Box<dyn Resource>>> {
        let client = ctx.ec2_client();
        let mut resources: Vec<Box<dyn Resource>> = Vec::new();

        let mut pages = client.describe_instances().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.context("Failed to describe instances")?;
            for instance in page.reservations().iter().flat_map(|r| r.instances()) {
                if let Some(resource) = Ec2Instance::from_sdk(client.clone(), instance) {
                    resources.push(Box::new(resource));
                }
            }
        }

        Ok(resources)
    }
}
