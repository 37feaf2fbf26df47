//! Configuration, registry and run errors
//!
//! Per-resource removal errors live in [`crate::classification`]; the types
//! here are the ones that can abort a run.

use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Structural validation failed
    #[error("Invalid config: {0}")]
    Validation(#[from] garde::Report),

    /// A filter rule has an unknown match type
    #[error("Unknown filter type '{0}' (expected exact, prefix, contains, glob or regex)")]
    UnknownFilterType(String),

    /// A filter rule has an empty value
    #[error("Filter value cannot be empty")]
    EmptyFilterValue,

    /// A regex filter does not compile
    #[error("Invalid regex filter '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A glob filter does not compile
    #[error("Invalid glob filter '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// max_inter_round_delay_ms is below inter_round_delay_ms
    #[error("max_inter_round_delay_ms ({max}) must be at least inter_round_delay_ms ({base})")]
    InvalidDelayBounds { base: u64, max: u64 },
}

impl ConfigError {
    /// Create an IO error with path context
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Lister registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Resource type '{0}' is already registered")]
    Duplicate(String),

    #[error("Unknown resource type '{0}'")]
    UnknownType(String),
}

/// Errors that abort a run before or instead of removal
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Every lister call failed, so the inventory cannot be trusted
    #[error("Discovery failed for all {0} lister calls")]
    DiscoveryFailed(usize),
}
