//! RDS DB cluster parameter groups

use crate::context::AwsContext;
use crate::error::removal_error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sweep_core::{Lister, Properties, RemovalError, Resource};
use tracing::debug;

pub struct RdsDbClusterParameterGroup {
    client: aws_sdk_rds::Client,
    name: String,
    properties: Properties,
}

#[async_trait]
impl Resource for RdsDbClusterParameterGroup {
    fn identify(&self) -> String {
        self.name.clone()
    }

    fn filter(&self) -> Option<String> {
        self.name
            .starts_with("default.")
            .then(|| "cannot delete default parameter group".to_string())
    }

    async fn remove(&self) -> Result<(), RemovalError> {
        self.client
            .delete_db_cluster_parameter_group()
            .db_cluster_parameter_group_name(&self.name)
            .send()
            .await
            .map_err(removal_error)?;
        Ok(())
    }

    fn properties(&self) -> Properties {
        self.properties.clone()
    }
}

/// Lists the cluster parameter groups in the session's region
///
/// Groups whose tags cannot be read are left out of the listing.
pub struct RdsDbClusterParameterGroupLister;

#[async_trait]
impl Lister<AwsContext> for RdsDbClusterParameterGroupLister {
    async fn list(&self, ctx: &AwsContext) -> Result<Vec<Box<dyn Resource>>> {
        let client = ctx.rds_client();
        let mut resources: Vec<Box<dyn Resource>> = Vec::new();

        let mut pages = client
            .describe_db_cluster_parameter_groups()
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.context("Failed to describe DB cluster parameter groups")?;
            for group in page.db_cluster_parameter_groups() {
                let Some(name) = group.db_cluster_parameter_group_name() else {
                    continue;
                };

                let mut properties = Properties::new();
                properties
                    .set("Name", name)
                    .set_opt("Family", group.db_parameter_group_family());

                if let Some(arn) = group.db_cluster_parameter_group_arn() {
                    match client.list_tags_for_resource().resource_name(arn).send().await {
                        Ok(tags) => {
                            for tag in tags.tag_list() {
                                if let (Some(key), Some(value)) = (tag.key(), tag.value()) {
                                    properties.set_tag(key, value);
                                }
                            }
                        }
                        Err(e) => {
                            debug!(group = %name, error = %removal_error(e), "Skipping group with unreadable tags");
                            continue;
                        }
                    }
                }

                resources.push(Box::new(RdsDbClusterParameterGroup {
                    client: client.clone(),
                    name: name.to_string(),
                    properties,
                }));
            }
        }

        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str) -> RdsDbClusterParameterGroup {
        let config = aws_sdk_rds::Config::builder()
            .behavior_version(aws_sdk_rds::config::BehaviorVersion::latest())
            .region(aws_sdk_rds::config::Region::new("us-east-1"))
            .build();
        RdsDbClusterParameterGroup {
            client: aws_sdk_rds::Client::from_conf(config),
            name: name.to_string(),
            properties: Properties::new().with("Name", name),
        }
    }

    #[test]
    fn test_default_groups_are_filtered() {
        assert!(group("default.aurora-postgresql15").filter().is_some());
        assert!(group("app-aurora-params").filter().is_none());
        assert_eq!(group("app-aurora-params").identify(), "app-aurora-params");
    }
}
