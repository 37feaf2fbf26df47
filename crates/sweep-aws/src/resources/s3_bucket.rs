//! S3 buckets
//!
//! `ListBuckets` is account-wide, so each regional lister keeps only the
//! buckets whose location matches its session. A bucket must be empty
//! (including old versions and delete markers) before it can be deleted;
//! settle takes care of that.

use super::rfc3339;
use crate::context::AwsContext;
use crate::error::removal_error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use sweep_core::{Lister, Properties, RemovalError, Resource, Settle};
use tracing::{debug, warn};

/// Upper bound on keys accepted by a single `DeleteObjects` call
const DELETE_BATCH_SIZE: usize = 1000;

/// Normalize a `GetBucketLocation` constraint to a region name.
///
/// Buckets in us-east-1 report no constraint, and very old eu-west-1
/// buckets report the legacy `EU` value.
pub fn bucket_region(constraint: Option<&str>) -> &str {
    match constraint {
        None | Some("") => "us-east-1",
        Some("EU") => "eu-west-1",
        Some(region) => region,
    }
}

pub struct S3Bucket {
    client: aws_sdk_s3::Client,
    name: String,
    properties: Properties,
}

impl S3Bucket {
    async fn delete_batch(&self, batch: Vec<ObjectIdentifier>) -> Result<(), RemovalError> {
        let count = batch.len();
        let delete = Delete::builder()
            .set_objects(Some(batch))
            .quiet(true)
            .build()
            .map_err(|e| RemovalError::terminal(format!("Invalid delete request: {e}")))?;

        let output = self
            .client
            .delete_objects()
            .bucket(&self.name)
            .delete(delete)
            .send()
            .await
            .map_err(removal_error)?;

        let failed = output.errors();
        if let Some(first) = failed.first() {
            warn!(
                bucket = %self.name,
                failed = failed.len(),
                code = first.code().unwrap_or_default(),
                "Some objects could not be deleted"
            );
            // Leftover objects make DeleteBucket fail with BucketNotEmpty,
            // which the queue retries next round.
        } else {
            debug!(bucket = %self.name, count, "Deleted objects");
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for S3Bucket {
    fn identify(&self) -> String {
        format!("s3://{}", self.name)
    }

    async fn remove(&self) -> Result<(), RemovalError> {
        self.client
            .delete_bucket()
            .bucket(&self.name)
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
impl Settle for S3Bucket {
    /// Delete every object version and delete marker in the bucket
    async fn settle(&self) -> Result<(), RemovalError> {
        let mut key_marker: Option<String> = None;
        let mut version_marker: Option<String> = None;

        loop {
            let page = self
                .client
                .list_object_versions()
                .bucket(&self.name)
                .set_key_marker(key_marker.take())
                .set_version_id_marker(version_marker.take())
                .send()
                .await
                .map_err(removal_error)?;

            let versions = page
                .versions()
                .iter()
                .filter_map(|v| Some((v.key()?, v.version_id())));
            let markers = page
                .delete_markers()
                .iter()
                .filter_map(|m| Some((m.key()?, m.version_id())));

            let mut identifiers = Vec::new();
            for (key, version_id) in versions.chain(markers) {
                let identifier = ObjectIdentifier::builder()
                    .key(key)
                    .set_version_id(version_id.map(str::to_string))
                    .build()
                    .map_err(|e| RemovalError::terminal(format!("Invalid object identifier: {e}")))?;
                identifiers.push(identifier);
            }

            for batch in identifiers.chunks(DELETE_BATCH_SIZE) {
                self.delete_batch(batch.to_vec()).await?;
            }

            if page.is_truncated() != Some(true) {
                return Ok(());
            }
            key_marker = page.next_key_marker().map(str::to_string);
            version_marker = page.next_version_id_marker().map(str::to_string);
        }
    }
}

/// Lists the buckets located in the session's region
pub struct S3BucketLister;

#[async_trait]
impl Lister<AwsContext> for S3BucketLister {
    async fn list(&self, ctx: &AwsContext) -> Result<Vec<Box<dyn Resource>>> {
        let client = ctx.s3_client();
        let output = client
            .list_buckets()
            .send()
            .await
            .context("Failed to list buckets")?;

        let mut resources: Vec<Box<dyn Resource>> = Vec::new();
        for bucket in output.buckets() {
            let Some(name) = bucket.name() else {
                continue;
            };

            let location = client
                .get_bucket_location()
                .bucket(name)
                .send()
                .await
                .with_context(|| format!("Failed to get location of bucket {name}"))?;
            let region = bucket_region(location.location_constraint().map(|c| c.as_str()));
            if region != ctx.region() {
                continue;
            }

            let mut properties = Properties::new();
            properties
                .set("Name", name)
                .set_opt("CreationDate", bucket.creation_date().and_then(rfc3339));

            // Buckets without tags answer NoSuchTagSet
            if let Ok(tagging) = client.get_bucket_tagging().bucket(name).send().await {
                for tag in tagging.tag_set() {
                    properties.set_tag(tag.key(), tag.value());
                }
            }

            resources.push(Box::new(S3Bucket {
                client: client.clone(),
                name: name.to_string(),
                properties,
            }));
        }

        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_region() {
        assert_eq!(bucket_region(None), "us-east-1");
        assert_eq!(bucket_region(Some("")), "us-east-1");
        assert_eq!(bucket_region(Some("EU")), "eu-west-1");
        assert_eq!(bucket_region(Some("us-east-2")), "us-east-2");
    }

    #[test]
    fn test_identify() {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-2"))
            .build();
        let bucket = S3Bucket {
            client: aws_sdk_s3::Client::from_conf(config),
            name: "scratch".to_string(),
            properties: Properties::new().with("Name", "scratch"),
        };
        assert_eq!(bucket.identify(), "s3://scratch");
        assert!(bucket.settle().is_some());
    }
}
