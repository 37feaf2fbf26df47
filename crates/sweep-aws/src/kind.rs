//! AWS resource types handled by cloud-sweep
//!
//! The names are the ones used in config files (`resource_types`, filter
//! `resource_type`, feature flags) and in reports.

use sweep_core::Scope;

/// Types of AWS resources this crate can list and remove
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr, strum::EnumIter,
)]
pub enum ResourceKind {
    #[strum(serialize = "EC2Instance")]
    Ec2Instance,
    #[strum(serialize = "EC2SecurityGroup")]
    Ec2SecurityGroup,
    #[strum(serialize = "S3Bucket")]
    S3Bucket,
    #[strum(serialize = "IAMRole")]
    IamRole,
    #[strum(serialize = "CognitoUserPool")]
    CognitoUserPool,
    #[strum(serialize = "RDSDBClusterParameterGroup")]
    RdsDbClusterParameterGroup,
    #[strum(serialize = "SignerSigningJob")]
    SignerSigningJob,
}

impl ResourceKind {
    /// IAM is global; everything else is listed per region
    pub fn scope(self) -> Scope {
        match self {
            ResourceKind::IamRole => Scope::Account,
            _ => Scope::Region,
        }
    }
}
