//! sweep-core - Provider-agnostic removal orchestration
//!
//! This crate holds the engine that drives discovered cloud resources to a
//! terminal state, without any provider SDK dependencies.
//!
//! ## Modules
//!
//! - [`classification`]: Removal error classification
//! - [`config`]: TOML configuration and its compiled runtime form
//! - [`defaults`]: Default configuration values
//! - [`filter`]: Include/exclude filter engine
//! - [`progress`]: Queue progress reporting
//! - [`properties`]: Resource properties that filters match against
//! - [`queue`]: The round-based removal queue
//! - [`registry`]: Lister registry and discovery
//! - [`report`]: Final run report
//! - [`resource`]: Resource capability traits
//! - [`sweep`]: Discover, filter, remove, report

pub mod classification;
pub mod config;
pub mod defaults;
pub mod error;
pub mod filter;
pub mod progress;
pub mod properties;
pub mod queue;
pub mod registry;
pub mod report;
pub mod resource;
pub mod sweep;

// Re-export commonly used types
pub use classification::{Classification, Precondition, RemovalError};
pub use config::{CompiledConfig, FeatureFlags, SweepConfig};
pub use error::{ConfigError, RegistryError, RunError};
pub use filter::{Disposition, ExclusionReason, FilterEngine};
pub use progress::{AttemptUpdate, LogReporter, ProgressReporter, RoundSummary};
pub use properties::Properties;
pub use queue::{AttemptState, Failure, QueueConfig, QueueOutcome, RemovalQueue, TerminalCause};
pub use registry::{Lister, ListerRegistry, ResourceTypes, Scope, Sessions};
pub use report::RunReport;
pub use resource::{Discovered, Resource, Settle};
pub use sweep::{SweepOptions, run_sweep};
