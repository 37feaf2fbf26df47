//! Registration of every AWS resource type

use crate::context::AwsContext;
use crate::kind::ResourceKind;
use crate::resources::{
    CognitoUserPoolLister, Ec2InstanceLister, Ec2SecurityGroupLister, IamRoleLister,
    RdsDbClusterParameterGroupLister, S3BucketLister, SignerSigningJobLister,
};
use strum::IntoEnumIterator;
use sweep_core::{ListerRegistry, RegistryError};

/// Build a registry holding a lister for every [`ResourceKind`]
pub fn default_registry() -> Result<ListerRegistry<AwsContext>, RegistryError> {
    let mut registry = ListerRegistry::new();
    for kind in ResourceKind::iter() {
        let name = kind.to_string();
        let scope = kind.scope();
        match kind {
            ResourceKind::Ec2Instance => registry.register(name, scope, Ec2InstanceLister)?,
            ResourceKind::Ec2SecurityGroup => {
                registry.register(name, scope, Ec2SecurityGroupLister)?
            }
            ResourceKind::S3Bucket => registry.register(name, scope, S3BucketLister)?,
            ResourceKind::IamRole => registry.register(name, scope, IamRoleLister)?,
            ResourceKind::CognitoUserPool => {
                registry.register(name, scope, CognitoUserPoolLister)?
            }
            ResourceKind::RdsDbClusterParameterGroup => {
                registry.register(name, scope, RdsDbClusterParameterGroupLister)?
            }
            ResourceKind::SignerSigningJob => {
                registry.register(name, scope, SignerSigningJobLister)?
            }
        }
    }
    Ok(registry)
}
