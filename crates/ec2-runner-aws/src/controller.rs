// Instance lifecycle orchestration for the start and stop modes.
//
// Each operation is one remote call (plus the user-data write before start),
// issued strictly in sequence with no local retry. Failures are logged with
// the operation context and handed back to the caller, which fails the job.

use crate::Ec2Api;
use anyhow::Result;
use ec2_runner_common::{build_user_data, Config};

pub struct InstanceController<'a> {
    api: &'a dyn Ec2Api,
    config: &'a Config,
}

impl<'a> InstanceController<'a> {
    pub fn new(api: &'a dyn Ec2Api, config: &'a Config) -> Self {
        Self { api, config }
    }

    /// Inject the bootstrap user-data and start the instance, returning the
    /// instance id reported by the start call. The user-data write only
    /// succeeds on a stopped instance, so that failure gets its own hint.
    pub async fn start(&self, label: &str, registration_token: &str) -> Result<String> {
        let instance_id = &self.config.ec2_instance_id;
        let user_data = build_user_data(
            &self.config.github_context,
            registration_token,
            label,
            self.config.runner_home_dir.as_deref(),
        )
        .join("\n");

        if let Err(error) = self.api.set_user_data(instance_id, &user_data).await {
            tracing::error!(
                "AWS EC2 instance modify user-data error, verify the instance is stopped before running the start mode"
            );
            return Err(error);
        }
        tracing::info!("User data set for AWS EC2 instance {instance_id}");

        match self.api.start_instance(instance_id).await {
            Ok(started_id) => {
                tracing::info!("AWS EC2 instance {started_id} is started");
                Ok(started_id)
            }
            Err(error) => {
                tracing::error!("AWS EC2 instance starting error");
                Err(error)
            }
        }
    }

    /// Stop the configured instance.
    pub async fn stop(&self) -> Result<()> {
        let instance_id = &self.config.ec2_instance_id;
        match self.api.stop_instance(instance_id).await {
            Ok(()) => {
                tracing::info!("AWS EC2 instance {instance_id} is stopped");
                Ok(())
            }
            Err(error) => {
                tracing::error!("AWS EC2 instance {instance_id} stoppage error");
                Err(error)
            }
        }
    }

    /// Block until the started instance reports running.
    pub async fn wait_until_running(&self, instance_id: &str) -> Result<()> {
        match self.api.wait_until_running(instance_id).await {
            Ok(()) => {
                tracing::info!("AWS EC2 instance {instance_id} is up and running");
                Ok(())
            }
            Err(error) => {
                tracing::error!("AWS EC2 instance {instance_id} initialization error");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use ec2_runner_common::{GithubContext, Mode};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        SetUserData(String),
        Start(String),
        Stop(String),
        Wait(String),
    }

    #[derive(Default)]
    struct RecordingApi {
        calls: Mutex<Vec<Call>>,
        last_user_data: Mutex<Option<String>>,
        fail_set_user_data: bool,
        fail_start: bool,
    }

    impl RecordingApi {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Ec2Api for RecordingApi {
        async fn set_user_data(&self, instance_id: &str, user_data: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::SetUserData(instance_id.to_string()));
            *self.last_user_data.lock().unwrap() = Some(user_data.to_string());
            if self.fail_set_user_data {
                return Err(anyhow!("modify rejected"));
            }
            Ok(())
        }

        async fn start_instance(&self, instance_id: &str) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Start(instance_id.to_string()));
            if self.fail_start {
                return Err(anyhow!("start rejected"));
            }
            Ok(instance_id.to_string())
        }

        async fn stop_instance(&self, instance_id: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Stop(instance_id.to_string()));
            Ok(())
        }

        async fn wait_until_running(&self, instance_id: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Wait(instance_id.to_string()));
            Ok(())
        }
    }

    const INSTANCE_ID: &str = "i-0123456789abcdef0";

    fn test_config(mode: Mode) -> Config {
        Config {
            mode,
            github_token: "ghp_test".to_string(),
            ec2_instance_id: INSTANCE_ID.to_string(),
            iam_role_name: None,
            runner_home_dir: None,
            label: None,
            tag_specifications: None,
            github_context: GithubContext {
                owner: "octo-org".to_string(),
                repo: "octo-repo".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_start_issues_modify_then_start() {
        let api = RecordingApi::default();
        let config = test_config(Mode::Start);
        let controller = InstanceController::new(&api, &config);

        let started = controller.start("abc12", "AREG123").await.unwrap();
        assert_eq!(started, INSTANCE_ID);
        assert_eq!(
            api.calls(),
            vec![
                Call::SetUserData(INSTANCE_ID.to_string()),
                Call::Start(INSTANCE_ID.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_start_passes_rendered_user_data() {
        let api = RecordingApi::default();
        let config = test_config(Mode::Start);
        let controller = InstanceController::new(&api, &config);

        controller.start("abc12", "AREG123").await.unwrap();
        let user_data = api.last_user_data.lock().unwrap().clone().unwrap();
        assert!(user_data.starts_with("Content-Type: multipart/mixed; boundary=\"//\""));
        assert!(user_data.contains("--token AREG123"));
        assert!(user_data.contains("--labels abc12"));
    }

    #[tokio::test]
    async fn test_modify_failure_suppresses_start() {
        let api = RecordingApi {
            fail_set_user_data: true,
            ..RecordingApi::default()
        };
        let config = test_config(Mode::Start);
        let controller = InstanceController::new(&api, &config);

        assert!(controller.start("abc12", "AREG123").await.is_err());
        assert_eq!(api.calls(), vec![Call::SetUserData(INSTANCE_ID.to_string())]);
    }

    #[tokio::test]
    async fn test_start_failure_is_propagated() {
        let api = RecordingApi {
            fail_start: true,
            ..RecordingApi::default()
        };
        let config = test_config(Mode::Start);
        let controller = InstanceController::new(&api, &config);

        assert!(controller.start("abc12", "AREG123").await.is_err());
        assert_eq!(
            api.calls(),
            vec![
                Call::SetUserData(INSTANCE_ID.to_string()),
                Call::Start(INSTANCE_ID.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_stop_issues_one_stop_for_configured_instance() {
        let api = RecordingApi::default();
        let config = test_config(Mode::Stop);
        let controller = InstanceController::new(&api, &config);

        controller.stop().await.unwrap();
        assert_eq!(api.calls(), vec![Call::Stop(INSTANCE_ID.to_string())]);
    }

    #[tokio::test]
    async fn test_wait_delegates_to_provider() {
        let api = RecordingApi::default();
        let config = test_config(Mode::Start);
        let controller = InstanceController::new(&api, &config);

        controller.wait_until_running(INSTANCE_ID).await.unwrap();
        assert_eq!(api.calls(), vec![Call::Wait(INSTANCE_ID.to_string())]);
    }

    #[tokio::test]
    async fn test_preinstalled_runner_home_flows_into_user_data() {
        let api = RecordingApi::default();
        let mut config = test_config(Mode::Start);
        config.runner_home_dir = Some("/opt/actions-runner".to_string());
        let controller = InstanceController::new(&api, &config);

        controller.start("abc12", "AREG123").await.unwrap();
        let user_data = api.last_user_data.lock().unwrap().clone().unwrap();
        assert!(user_data.contains("cd \"/opt/actions-runner\""));
        assert!(!user_data.contains("curl"));
    }
}
