//! Lister registry and discovery
//!
//! The registry is an explicit map from resource type name to a lister and
//! its scope. It is built by the provider crate and passed to the run; there
//! is no global registration.

use crate::defaults::GLOBAL_REGION;
use crate::error::RegistryError;
use crate::resource::{Discovered, Resource};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a resource type lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Scope {
    /// Listed once per account
    Account,
    /// Listed once per configured region
    Region,
}

/// Discovery function for one resource type.
///
/// `S` is the provider session (client factory) for one scope.
#[async_trait]
pub trait Lister<S: Sync>: Send + Sync {
    async fn list(&self, session: &S) -> anyhow::Result<Vec<Box<dyn Resource>>>;
}

/// A registered resource type
pub struct ListerEntry<S: Sync> {
    pub name: String,
    pub scope: Scope,
    pub lister: Arc<dyn Lister<S>>,
}

/// Registered resource types, ordered by name
pub struct ListerRegistry<S: Sync> {
    entries: BTreeMap<String, ListerEntry<S>>,
}

impl<S: Sync> Default for ListerRegistry<S> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<S: Sync> ListerRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lister. Names are unique.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        scope: Scope,
        lister: impl Lister<S> + 'static,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.entries.insert(
            name.clone(),
            ListerEntry {
                name,
                scope,
                lister: Arc::new(lister),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ListerEntry<S>> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ListerEntry<S>> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries selected by the configured targets and excludes.
    ///
    /// Every name in either list must be registered.
    pub fn select(&self, types: &ResourceTypes) -> Result<Vec<&ListerEntry<S>>, RegistryError> {
        if let Some(unknown) = types
            .targets
            .iter()
            .chain(&types.excludes)
            .find(|name| !self.entries.contains_key(name.as_str()))
        {
            return Err(RegistryError::UnknownType(unknown.clone()));
        }

        Ok(self
            .entries
            .values()
            .filter(|entry| types.selects(&entry.name))
            .collect())
    }
}

/// Which registered types a run should list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceTypes {
    /// Only these types (empty means every registered type)
    #[serde(default)]
    pub targets: Vec<String>,
    /// Never these types
    #[serde(default)]
    pub excludes: Vec<String>,
}

impl ResourceTypes {
    pub fn selects(&self, name: &str) -> bool {
        let targeted = self.targets.is_empty() || self.targets.iter().any(|t| t == name);
        targeted && !self.excludes.iter().any(|e| e == name)
    }
}

/// Provider sessions for every scope a run covers
pub struct Sessions<S> {
    /// Session used for account-scoped types
    pub global: S,
    /// One session per configured region
    pub regional: Vec<(String, S)>,
}

/// A lister call that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryError {
    pub kind: String,
    pub region: String,
    pub message: String,
}

/// Everything discovery produced
#[derive(Debug, Default)]
pub struct Discovery {
    pub resources: Vec<Discovered>,
    pub errors: Vec<DiscoveryError>,
    /// Number of lister calls made
    pub calls: usize,
}

impl Discovery {
    /// True when at least one call was made and none succeeded
    pub fn all_failed(&self) -> bool {
        self.calls > 0 && self.errors.len() == self.calls
    }
}

/// List every selected type in every applicable scope.
///
/// Up to `concurrency` lister calls run at once. A failing call only loses
/// that type in that scope; its error is recorded and discovery continues.
pub async fn discover<S: Sync>(
    entries: &[&ListerEntry<S>],
    sessions: &Sessions<S>,
    concurrency: usize,
) -> Discovery {
    let mut calls: Vec<(&ListerEntry<S>, &str, &S)> = Vec::new();
    for &entry in entries {
        match entry.scope {
            Scope::Account => calls.push((entry, GLOBAL_REGION, &sessions.global)),
            Scope::Region => {
                for (region, session) in &sessions.regional {
                    calls.push((entry, region.as_str(), session));
                }
            }
        }
    }

    let total = calls.len();
    let results: Vec<_> = stream::iter(calls)
        .map(|(entry, region, session)| async move {
            let result = entry.lister.list(session).await;
            (entry.name.as_str(), region, result)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut discovery = Discovery {
        calls: total,
        ..Default::default()
    };

    for (kind, region, result) in results {
        match result {
            Ok(resources) => {
                debug!(kind = %kind, region = %region, count = resources.len(), "Listed resources");
                discovery.resources.extend(
                    resources
                        .into_iter()
                        .map(|resource| Discovered::new(kind, region, resource)),
                );
            }
            Err(e) => {
                warn!(kind = %kind, region = %region, error = %format!("{e:#}"), "Discovery failed");
                discovery.errors.push(DiscoveryError {
                    kind: kind.to_string(),
                    region: region.to_string(),
                    message: format!("{e:#}"),
                });
            }
        }
    }

    discovery
}
