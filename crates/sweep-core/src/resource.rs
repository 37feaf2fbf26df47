//! Resource capability interface
//!
//! Every discovered item implements [`Resource`]. The engine never needs to
//! know which concrete kind it is dealing with: it identifies, filters and
//! removes through this trait only.

use crate::classification::{Precondition, RemovalError};
use crate::properties::Properties;
use async_trait::async_trait;

/// A discovered cloud resource that can be removed.
///
/// Implementations hold whatever client they need to act on the resource.
/// Those clients may be shared with other resources and must not carry
/// per-call mutable state.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Human-readable identity used for logging, reporting and filtering
    fn identify(&self) -> String;

    /// Built-in safety filter.
    ///
    /// Returns a reason when this resource must never be removed (for example
    /// provider-managed defaults).
    fn filter(&self) -> Option<String> {
        None
    }

    /// Delete the resource
    async fn remove(&self) -> Result<(), RemovalError>;

    /// Properties that filter rules can match against
    fn properties(&self) -> Properties {
        Properties::new()
    }

    /// Optional pre-removal settle capability
    fn settle(&self) -> Option<&dyn Settle> {
        None
    }

    /// Run a precondition step requested by a previous `remove` failure.
    ///
    /// The engine only calls this when the feature flags authorize the step
    /// for this resource type.
    async fn satisfy(&self, precondition: Precondition) -> Result<(), RemovalError> {
        Err(RemovalError::terminal(format!(
            "{} does not support precondition {precondition}",
            self.identify()
        )))
    }
}

/// Extended capability: a step run before every removal attempt.
///
/// Used for work that has to happen right before the delete call, such as
/// emptying a bucket or detaching policies from a role.
#[async_trait]
pub trait Settle: Send + Sync {
    async fn settle(&self) -> Result<(), RemovalError>;
}

/// A resource as returned by discovery, tagged with its type and scope
pub struct Discovered {
    /// Registered resource type name
    pub kind: String,
    /// Region the resource lives in (`global` for account scope)
    pub region: String,
    pub resource: Box<dyn Resource>,
}

impl Discovered {
    pub fn new(kind: impl Into<String>, region: impl Into<String>, resource: Box<dyn Resource>) -> Self {
        Self {
            kind: kind.into(),
            region: region.into(),
            resource,
        }
    }

    pub fn identify(&self) -> String {
        self.resource.identify()
    }
}

impl std::fmt::Debug for Discovered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discovered")
            .field("kind", &self.kind)
            .field("region", &self.region)
            .field("id", &self.resource.identify())
            .finish_non_exhaustive()
    }
}
