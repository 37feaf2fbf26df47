//! sweep-aws - AWS provider for cloud-sweep
//!
//! Listers and resource adapters for the supported AWS resource types, plus
//! the translation of AWS SDK errors into engine classifications.

pub mod account;
pub mod context;
pub mod error;
pub mod kind;
pub mod registry;
pub mod resources;

pub use account::{AccountId, get_current_account_id};
pub use context::{AwsContext, GLOBAL_API_REGION, load_sessions};
pub use error::{AwsError, classify_aws_error, classify_sdk_error};
pub use kind::ResourceKind;
pub use registry::default_registry;
