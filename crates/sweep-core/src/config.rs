//! Sweep configuration
//!
//! The config file is TOML. It is parsed with serde, structurally validated
//! with garde and then compiled into the runtime types the engine consumes.
//! CLI overrides are applied between parsing and compiling.

use crate::classification::Precondition;
use crate::defaults::{
    default_concurrency, default_inter_round_delay_ms, default_max_attempts,
    default_max_inter_round_delay_ms, default_max_rounds,
};
use crate::error::ConfigError;
use crate::filter::FilterEngine;
use crate::queue::QueueConfig;
use crate::registry::ResourceTypes;
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Duration;

fn default_match_type() -> String {
    "exact".to_string()
}

/// One include or exclude rule as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Restrict the rule to one resource type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,

    /// Property to match (`tag:<Key>` for tags); identity when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,

    /// exact, prefix, contains, glob or regex
    #[serde(rename = "type", default = "default_match_type")]
    pub match_type: String,

    pub value: String,

    #[serde(default)]
    pub invert: bool,
}

/// Include and exclude rule lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FiltersConfig {
    #[serde(default)]
    pub include: Vec<RuleConfig>,
    #[serde(default)]
    pub exclude: Vec<RuleConfig>,
}

/// Per-type authorization for precondition steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct FeatureFlagsConfig {
    /// Resource types allowed to have deletion protection turned off
    #[serde(default)]
    #[garde(inner(length(min = 1)))]
    pub disable_deletion_protection: Vec<String>,
}

/// Removal engine knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default = "default_max_rounds")]
    #[garde(range(min = 1, max = 1000))]
    pub max_rounds: u32,

    #[serde(default = "default_max_attempts")]
    #[garde(range(min = 1, max = 1000))]
    pub max_attempts: u32,

    #[serde(default = "default_concurrency")]
    #[garde(range(min = 1, max = 256))]
    pub concurrency: usize,

    #[serde(default = "default_inter_round_delay_ms")]
    #[garde(skip)]
    pub inter_round_delay_ms: u64,

    #[serde(default = "default_max_inter_round_delay_ms")]
    #[garde(skip)]
    pub max_inter_round_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            max_attempts: default_max_attempts(),
            concurrency: default_concurrency(),
            inter_round_delay_ms: default_inter_round_delay_ms(),
            max_inter_round_delay_ms: default_max_inter_round_delay_ms(),
        }
    }
}

/// Top-level config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    /// Regions to sweep for region-scoped types
    #[serde(default)]
    #[garde(length(min = 1), inner(length(min = 1)))]
    pub regions: Vec<String>,

    /// Accounts that must never be swept
    #[serde(default)]
    #[garde(inner(length(min = 1)))]
    pub account_blocklist: Vec<String>,

    #[serde(default)]
    #[garde(skip)]
    pub resource_types: ResourceTypes,

    #[serde(default)]
    #[garde(skip)]
    pub filters: FiltersConfig,

    #[serde(default)]
    #[garde(dive)]
    pub feature_flags: FeatureFlagsConfig,

    #[serde(default)]
    #[garde(dive)]
    pub engine: EngineConfig,
}

impl SweepConfig {
    /// Read and parse a config file without validating it
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::io(path.display().to_string(), e))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Validate and compile into runtime types.
    ///
    /// Fails on the first malformed filter rule, so nothing is evaluated
    /// against a partially-compiled rule set.
    pub fn compile(&self) -> Result<CompiledConfig, ConfigError> {
        self.validate()?;

        let engine = &self.engine;
        if engine.max_inter_round_delay_ms < engine.inter_round_delay_ms {
            return Err(ConfigError::InvalidDelayBounds {
                base: engine.inter_round_delay_ms,
                max: engine.max_inter_round_delay_ms,
            });
        }

        Ok(CompiledConfig {
            regions: self.regions.clone(),
            account_blocklist: self.account_blocklist.iter().cloned().collect(),
            resource_types: self.resource_types.clone(),
            filters: FilterEngine::compile(&self.filters)?,
            feature_flags: FeatureFlags::from(&self.feature_flags),
            queue: QueueConfig {
                max_rounds: engine.max_rounds,
                max_attempts: engine.max_attempts,
                concurrency: engine.concurrency,
                inter_round_delay: Duration::from_millis(engine.inter_round_delay_ms),
                max_inter_round_delay: Duration::from_millis(engine.max_inter_round_delay_ms),
            },
        })
    }
}

/// Runtime view of the feature flags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    allowed: HashMap<Precondition, BTreeSet<String>>,
}

impl FeatureFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Authorize a precondition step for a resource type
    pub fn allow(mut self, step: Precondition, kind: impl Into<String>) -> Self {
        self.allowed.entry(step).or_default().insert(kind.into());
        self
    }

    pub fn authorizes(&self, kind: &str, step: Precondition) -> bool {
        self.allowed.get(&step).is_some_and(|kinds| kinds.contains(kind))
    }
}

impl From<&FeatureFlagsConfig> for FeatureFlags {
    fn from(config: &FeatureFlagsConfig) -> Self {
        config
            .disable_deletion_protection
            .iter()
            .fold(FeatureFlags::new(), |flags, kind| {
                flags.allow(Precondition::DisableDeletionProtection, kind.clone())
            })
    }
}

/// Fully validated configuration, ready to drive a run
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    pub regions: Vec<String>,
    pub account_blocklist: BTreeSet<String>,
    pub resource_types: ResourceTypes,
    pub filters: FilterEngine,
    pub feature_flags: FeatureFlags,
    pub queue: QueueConfig,
}

impl CompiledConfig {
    pub fn is_blocklisted(&self, account_id: &str) -> bool {
        self.account_blocklist.contains(account_id)
    }
}
