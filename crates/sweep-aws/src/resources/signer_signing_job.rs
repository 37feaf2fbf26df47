//! Signer signing jobs
//!
//! Jobs stay visible to ListSigningJobs for two years and cannot be deleted.
//! Removal revokes the signature instead, and revoked jobs are left out of
//! the listing so they count as gone.

use super::rfc3339;
use crate::context::AwsContext;
use crate::error::removal_error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_signer::types::SigningJob;
use sweep_core::{Lister, Properties, RemovalError, Resource};

/// Reason recorded on every revoked signature
pub const REVOKE_REASON: &str = "Revoked by cloud-sweep";

pub struct SignerSigningJob {
    client: aws_sdk_signer::Client,
    job_id: String,
    job_owner: Option<String>,
    properties: Properties,
}

impl SignerSigningJob {
    fn from_sdk(client: aws_sdk_signer::Client, job: &SigningJob) -> Option<Self> {
        if job.is_revoked() {
            return None;
        }
        let job_id = job.job_id()?.to_string();

        let mut properties = Properties::new();
        properties
            .set("JobId", &job_id)
            .set_opt("ProfileName", job.profile_name())
            .set_opt("JobOwner", job.job_owner())
            .set_opt("PlatformId", job.platform_id())
            .set_opt("CreatedAt", job.created_at().and_then(rfc3339));

        Some(Self {
            client,
            job_id,
            job_owner: job.job_owner().map(str::to_string),
            properties,
        })
    }
}

#[async_trait]
impl Resource for SignerSigningJob {
    fn identify(&self) -> String {
        self.job_id.clone()
    }

    async fn remove(&self) -> Result<(), RemovalError> {
        self.client
            .revoke_signature()
            .job_id(&self.job_id)
            .set_job_owner(self.job_owner.clone())
            .reason(REVOKE_REASON)
            .send()
            .await
            .map_err(removal_error)?;
        Ok(())
    }

    fn properties(&self) -> Properties {
        self.properties.clone()
    }
}

/// Lists the non-revoked signing jobs in the session's region
pub struct SignerSigningJobLister;

#[async_trait]
impl Lister<AwsContext> for SignerSigningJobLister {
    async fn list(&self, ctx: &AwsContext) -> Result<Vec<Box<dyn Resource>>> {
        let client = ctx.signer_client();
        let mut resources: Vec<Box<dyn Resource>> = Vec::new();

        let mut pages = client.list_signing_jobs().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.context("Failed to list signing jobs")?;
            for job in page.jobs() {
                if let Some(resource) = SignerSigningJob::from_sdk(client.clone(), job) {
                    resources.push(Box::new(resource));
                }
            }
        }

        Ok(resources)
    }
}
