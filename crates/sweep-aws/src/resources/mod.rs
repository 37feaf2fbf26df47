//! Per-type listers and adapters
//!
//! Each module pairs a lister (discovery for one region or the account)
//! with the resource type it yields. Adapters translate SDK failures through
//! [`crate::error`] and never inspect error strings themselves.

pub mod cognito_user_pool;
pub mod ec2_instance;
pub mod ec2_security_group;
pub mod iam_role;
pub mod rds_cluster_parameter_group;
pub mod s3_bucket;
pub mod signer_signing_job;

pub use cognito_user_pool::{CognitoUserPool, CognitoUserPoolLister};
pub use ec2_instance::{Ec2Instance, Ec2InstanceLister};
pub use ec2_security_group::{Ec2SecurityGroup, Ec2SecurityGroupLister};
pub use iam_role::{IamRole, IamRoleLister};
pub use rds_cluster_parameter_group::{RdsDbClusterParameterGroup, RdsDbClusterParameterGroupLister};
pub use s3_bucket::{S3Bucket, S3BucketLister};
pub use signer_signing_job::{SignerSigningJob, SignerSigningJobLister};

use aws_sdk_ec2::primitives::DateTime;

/// Format an SDK timestamp as RFC 3339
pub(crate) fn rfc3339(time: &DateTime) -> Option<String> {
    chrono::DateTime::from_timestamp(time.secs(), time.subsec_nanos()).map(|t| t.to_rfc3339())
}
