// ec2-runner-aws: EC2 side of the on-demand runner action.
// The `Ec2Api` trait isolates the four remote calls the action makes, so the
// controller logic can be exercised against a recording fake in tests while
// production uses the AWS SDK client.

pub mod controller;
pub mod ec2;

use anyhow::Result;
use async_trait::async_trait;

pub use controller::InstanceController;
pub use ec2::Ec2Client;

/// The EC2 operations used by the action, one method per remote call.
#[async_trait]
pub trait Ec2Api: Send + Sync {
    /// Write the cloud-init document to the instance's user-data attribute.
    /// EC2 only accepts this while the instance is stopped.
    async fn set_user_data(&self, instance_id: &str, user_data: &str) -> Result<()>;

    /// Start the instance, returning the instance id echoed by the API.
    async fn start_instance(&self, instance_id: &str) -> Result<String>;

    async fn stop_instance(&self, instance_id: &str) -> Result<()>;

    /// Block until the instance reports the `running` state, or the bounded
    /// provider polling gives up.
    async fn wait_until_running(&self, instance_id: &str) -> Result<()>;
}
