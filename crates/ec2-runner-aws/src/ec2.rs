// AWS SDK implementation of the `Ec2Api` seam.

use crate::Ec2Api;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_sdk_ec2::client::Waiters;
use aws_sdk_ec2::primitives::Blob;
use aws_sdk_ec2::types::BlobAttributeValue;
use std::time::Duration;

// Upper bound handed to the SDK's instance-running waiter.
const RUNNING_WAIT_MAX: Duration = Duration::from_secs(600);

pub struct Ec2Client {
    inner: aws_sdk_ec2::Client,
}

impl Ec2Client {
    /// Build a client from the ambient AWS environment, resolving credentials
    /// and region through the usual env / profile / IMDS chain.
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self {
            inner: aws_sdk_ec2::Client::new(&config),
        }
    }
}

#[async_trait]
impl Ec2Api for Ec2Client {
    async fn set_user_data(&self, instance_id: &str, user_data: &str) -> Result<()> {
        let attribute = BlobAttributeValue::builder()
            .value(Blob::new(user_data.as_bytes()))
            .build();
        self.inner
            .modify_instance_attribute()
            .instance_id(instance_id)
            .user_data(attribute)
            .send()
            .await
            .context("EC2 modify-instance-attribute call failed")?;
        Ok(())
    }

    async fn start_instance(&self, instance_id: &str) -> Result<String> {
        let output = self
            .inner
            .start_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .context("EC2 start-instances call failed")?;

        let started = output
            .starting_instances()
            .first()
            .and_then(|change| change.instance_id())
            .ok_or_else(|| anyhow!("EC2 start-instances response contained no instance id"))?;
        Ok(started.to_string())
    }

    async fn stop_instance(&self, instance_id: &str) -> Result<()> {
        self.inner
            .stop_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .context("EC2 stop-instances call failed")?;
        Ok(())
    }

    async fn wait_until_running(&self, instance_id: &str) -> Result<()> {
        self.inner
            .wait_until_instance_running()
            .instance_ids(instance_id)
            .wait(RUNNING_WAIT_MAX)
            .await
            .with_context(|| {
                format!(
                    "EC2 instance {instance_id} did not reach the running state within {}s",
                    RUNNING_WAIT_MAX.as_secs()
                )
            })?;
        Ok(())
    }
}
