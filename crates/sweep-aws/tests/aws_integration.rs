//! Integration tests against a real AWS account
//!
//! Every test creates its own uniquely-named resources and sweeps them with
//! an exact-name include rule, so nothing else in the account is touched.
//! Run with: AWS_PROFILE=sandbox cargo nextest run --test aws_integration --run-ignored all

use anyhow::Result;
use sweep_aws::{AwsContext, default_registry, load_sessions};
use sweep_core::{SweepConfig, SweepOptions, run_sweep};
use sweep_test_utils::aws::{get_test_region, test_bucket_name, test_resource_name};

const EC2_ASSUME_ROLE_POLICY: &str = r#"{
    "Version": "2012-10-17",
    "Statement": [
        {
            "Effect": "Allow",
            "Principal": { "Service": "ec2.amazonaws.com" },
            "Action": "sts:AssumeRole"
        }
    ]
}"#;

fn config_for(region: &str, kind: &str, name: &str) -> Result<SweepConfig> {
    let text = format!(
        r#"
regions = ["{region}"]

[resource_types]
targets = ["{kind}"]

[[filters.include]]
resource_type = "{kind}"
property = "Name"
value = "{name}"

[engine]
max_rounds = 6
inter_round_delay_ms = 2000
max_inter_round_delay_ms = 10000
"#
    );
    Ok(SweepConfig::from_toml(&text)?)
}

async fn sweep(kind: &str, name: &str) -> Result<sweep_core::RunReport> {
    let region = get_test_region();
    let config = config_for(&region, kind, name)?.compile()?;
    let sessions = load_sessions(&config.regions, None).await;
    let registry = default_registry()?;
    let options = SweepOptions {
        dry_run: false,
        ..Default::default()
    };
    Ok(run_sweep(&registry, &sessions, &config, options).await?)
}

mod s3_tests {
    use super::*;
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};

    /// A bucket holding objects is emptied by settle and then deleted
    #[tokio::test]
    #[ignore = "requires AWS credentials"]
    async fn test_sweep_non_empty_bucket() -> Result<()> {
        let region = get_test_region();
        let ctx = AwsContext::new(&region, None).await;
        let client = ctx.s3_client();
        let bucket = test_bucket_name();

        let mut create = client.create_bucket().bucket(&bucket);
        if region != "us-east-1" {
            create = create.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region.as_str()))
                    .build(),
            );
        }
        create.send().await?;

        for i in 0..3 {
            client
                .put_object()
                .bucket(&bucket)
                .key(format!("objects/{i}.txt"))
                .body(ByteStream::from_static(b"sweep me"))
                .send()
                .await?;
        }

        let report = sweep("S3Bucket", &bucket).await?;
        println!("{}", report.headline());

        assert!(report.failed.is_empty(), "failures: {:?}", report.failed);
        assert!(
            report
                .removed
                .iter()
                .any(|r| r.resource == format!("s3://{bucket}"))
        );
        assert!(client.head_bucket().bucket(&bucket).send().await.is_err());
        Ok(())
    }
}

mod iam_tests {
    use super::*;

    /// A role with an inline policy is settled and deleted through the
    /// account-scoped lister
    #[tokio::test]
    #[ignore = "requires AWS credentials"]
    async fn test_sweep_role_with_inline_policy() -> Result<()> {
        let ctx = AwsContext::new(sweep_aws::GLOBAL_API_REGION, None).await;
        let client = ctx.iam_client();
        let role_name = test_resource_name("role");

        client
            .create_role()
            .role_name(&role_name)
            .assume_role_policy_document(EC2_ASSUME_ROLE_POLICY)
            .send()
            .await?;
        client
            .put_role_policy()
            .role_name(&role_name)
            .policy_name("inline")
            .policy_document(
                serde_json::json!({
                    "Version": "2012-10-17",
                    "Statement": [{ "Effect": "Deny", "Action": "s3:*", "Resource": "*" }]
                })
                .to_string(),
            )
            .send()
            .await?;

        let report = sweep("IAMRole", &role_name).await?;

        assert!(report.failed.is_empty(), "failures: {:?}", report.failed);
        let removed = report
            .removed
            .iter()
            .find(|r| r.resource == role_name)
            .expect("role should be removed");
        assert_eq!(removed.region, "global");
        assert!(client.get_role().role_name(&role_name).send().await.is_err());
        Ok(())
    }
}
