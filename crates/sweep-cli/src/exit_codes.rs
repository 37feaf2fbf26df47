//! Stable exit codes for cloud-sweep commands.

/// Run converged with no terminal failures and no discovery errors.
pub const OK: i32 = 0;
/// Run finished, but some resources failed terminally or some listers failed.
pub const FAILURES: i32 = 1;
/// Run aborted before removal: bad config, blocklisted account or total
/// discovery failure.
pub const ABORTED: i32 = 2;
