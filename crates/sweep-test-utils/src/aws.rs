//! AWS test utilities
//!
//! Provides region detection and unique resource naming for AWS integration
//! tests. Every name starts with [`TEST_PREFIX`] so sweep configs used in
//! tests can include exactly these resources.

use chrono::Utc;

/// Prefix shared by every resource created in integration tests
pub const TEST_PREFIX: &str = "cloud-sweep-test-";

/// Get the AWS region for tests.
///
/// Checks environment variables in order:
/// 1. AWS_REGION
/// 2. AWS_DEFAULT_REGION
/// 3. Falls back to us-east-2
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-2".to_string())
}

/// Generate a unique run ID for test resources.
///
/// Format: `{timestamp_ms}-{counter}`, unique within a process even when
/// tests start in the same millisecond.
pub fn test_run_id() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let ts = Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{ts}-{counter}")
}

/// Unique, S3-safe bucket name for a test
///
/// ```
/// use sweep_test_utils::aws::{TEST_PREFIX, test_bucket_name};
///
/// let bucket = test_bucket_name();
/// assert!(bucket.starts_with(TEST_PREFIX));
/// ```
pub fn test_bucket_name() -> String {
    format!("{TEST_PREFIX}{}", test_run_id())
}

/// Unique name for a non-bucket test resource (roles, groups, pools)
pub fn test_resource_name(kind: &str) -> String {
    format!("{TEST_PREFIX}{kind}-{}", test_run_id())
}
