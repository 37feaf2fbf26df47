//! Shared test utilities for cloud-sweep
//!
//! This crate provides common test helpers that can be used across
//! multiple test modules without circular dependencies.
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection and test resource naming
//! - [`resource`]: Scripted fake resources, listers and event logs

pub mod aws;
pub mod resource;

// Re-export commonly used items
pub use aws::{get_test_region, test_bucket_name, test_run_id};
pub use resource::{
    ConcurrencyTracker, Event, EventLog, FnLister, Probe, RecordingReporter, ScriptedResource,
};
