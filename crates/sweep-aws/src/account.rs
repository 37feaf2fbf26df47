//! AWS account identity

use crate::context::AwsContext;
use anyhow::{Context, Result};
use tracing::info;

/// Strongly-typed AWS account ID (12-digit string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, derive_more::Deref)]
pub struct AccountId(String);

impl AccountId {
    /// Check against a set of blocklisted account IDs
    pub fn is_blocklisted<'a>(&self, blocklist: impl IntoIterator<Item = &'a String>) -> bool {
        blocklist.into_iter().any(|blocked| *blocked == self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        AccountId(s.to_string())
    }
}

/// Fetch the current AWS account ID from credentials via STS GetCallerIdentity
///
/// This operation requires no special permissions - it always succeeds if
/// credentials are valid. The sweep runs it before discovery so a bad
/// credential chain or a blocklisted account stops the run early.
pub async fn get_current_account_id(ctx: &AwsContext) -> Result<AccountId> {
    let identity = ctx
        .sts_client()
        .get_caller_identity()
        .send()
        .await
        .context("Failed to get AWS caller identity - check credentials")?;

    let account = identity
        .account()
        .context("No account ID returned from STS GetCallerIdentity")?;

    info!(account_id = %account, "AWS account validated");

    Ok(AccountId(account.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocklist() {
        let account = AccountId::from("123456789012");
        let blocklist = vec!["000000000000".to_string(), "123456789012".to_string()];
        assert!(account.is_blocklisted(&blocklist));
        assert!(!AccountId::from("111111111111").is_blocklisted(&blocklist));
        assert_eq!(account.to_string(), "123456789012");
        assert_eq!(account.len(), 12);
    }

    #[tokio::test]
    #[ignore = "requires AWS credentials"]
    async fn test_get_current_account_id() {
        let ctx = AwsContext::new(&sweep_test_utils::get_test_region(), None).await;
        let account = get_current_account_id(&ctx).await.unwrap();
        assert_eq!(account.len(), 12);
    }
}
