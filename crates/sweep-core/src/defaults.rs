//! Default configuration values shared between the engine and the CLI
//!
//! These constants keep the config file, the CLI flags and the engine
//! defaults consistent.

use std::time::Duration;

/// Default number of removal rounds before giving up
pub const DEFAULT_MAX_ROUNDS: u32 = 10;

/// Default maximum number of removal attempts per resource
pub const DEFAULT_MAX_ATTEMPTS: u32 = DEFAULT_MAX_ROUNDS;

/// Default number of concurrent removal attempts within a round
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default delay after a round that made no progress (milliseconds)
pub const DEFAULT_INTER_ROUND_DELAY_MS: u64 = 5_000;

/// Default cap for the exponential inter-round delay (milliseconds)
pub const DEFAULT_MAX_INTER_ROUND_DELAY_MS: u64 = 60_000;

/// Region label used for account-scoped resources
pub const GLOBAL_REGION: &str = "global";

// Serde default functions for struct field defaults

/// Returns the default maximum number of rounds
pub fn default_max_rounds() -> u32 {
    DEFAULT_MAX_ROUNDS
}

/// Returns the default maximum number of attempts
pub fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Returns the default concurrency limit
pub fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

/// Returns the default inter-round delay in milliseconds
pub fn default_inter_round_delay_ms() -> u64 {
    DEFAULT_INTER_ROUND_DELAY_MS
}

/// Returns the default inter-round delay cap in milliseconds
pub fn default_max_inter_round_delay_ms() -> u64 {
    DEFAULT_MAX_INTER_ROUND_DELAY_MS
}

/// Default inter-round delay as a `Duration`
pub fn default_inter_round_delay() -> Duration {
    Duration::from_millis(DEFAULT_INTER_ROUND_DELAY_MS)
}
