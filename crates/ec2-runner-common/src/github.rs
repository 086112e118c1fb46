// GitHub REST API client for runner registration bookkeeping.
//
// Three calls: issue a registration token for the bootstrap script, find and
// remove a labeled runner on teardown, and poll until the freshly started
// instance shows up as an online runner.

use crate::config::Config;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("ec2-runner/", env!("CARGO_PKG_VERSION"));

// Registration polling: give cloud-init a quiet period to boot and install
// the runner, then check every few seconds until the timeout.
const REGISTERED_QUIET_PERIOD: Duration = Duration::from_secs(30);
const REGISTERED_RETRY_INTERVAL: Duration = Duration::from_secs(10);
const REGISTERED_TIMEOUT_MINUTES: u64 = 5;

pub struct GithubClient {
    client: reqwest::Client,
    api_base: Url,
    token: String,
    owner: String,
    repo: String,
}

#[derive(Debug, Deserialize)]
struct RegistrationTokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct RunnerList {
    #[serde(default)]
    runners: Vec<Runner>,
}

#[derive(Debug, Deserialize)]
struct Runner {
    id: u64,
    name: String,
    status: String,
    #[serde(default)]
    labels: Vec<RunnerLabel>,
}

#[derive(Debug, Deserialize)]
struct RunnerLabel {
    name: String,
}

impl Runner {
    fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.name == label)
    }
}

fn runner_with_label(list: RunnerList, label: &str) -> Option<Runner> {
    list.runners.into_iter().find(|r| r.has_label(label))
}

impl GithubClient {
    /// Build a client for the repository the workflow runs in. The API base
    /// honors `GITHUB_API_URL` so GitHub Enterprise installs work too.
    pub fn new(config: &Config) -> Result<Self> {
        let api_base = std::env::var("GITHUB_API_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "https://api.github.com".to_string());
        let api_base = Url::parse(&api_base).context("Invalid GITHUB_API_URL")?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_base,
            token: config.github_token.clone(),
            owner: config.github_context.owner.clone(),
            repo: config.github_context.repo.clone(),
        })
    }

    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base.as_str().trim_end_matches('/'),
            self.owner,
            self.repo,
            tail
        )
    }

    /// Issue a short-lived registration token for a new self-hosted runner.
    pub async fn registration_token(&self) -> Result<String> {
        let url = self.repo_url("actions/runners/registration-token");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await
            .context("GitHub runner registration token request failed")?;

        if !response.status().is_success() {
            bail!(
                "GitHub runner registration token request failed with status {}",
                response.status()
            );
        }

        let body: RegistrationTokenResponse = response
            .json()
            .await
            .context("GitHub runner registration token response is malformed")?;
        tracing::info!("GitHub registration token is received");
        Ok(body.token)
    }

    async fn find_runner(&self, label: &str) -> Result<Option<Runner>> {
        let url = self.repo_url("actions/runners?per_page=100");
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .context("GitHub runner list request failed")?;

        if !response.status().is_success() {
            bail!(
                "GitHub runner list request failed with status {}",
                response.status()
            );
        }

        let list: RunnerList = response
            .json()
            .await
            .context("GitHub runner list response is malformed")?;
        Ok(runner_with_label(list, label))
    }

    /// Remove the runner registered with the given label. A missing runner is
    /// only a warning; the instance may never have finished registering.
    pub async fn remove_runner(&self, label: &str) -> Result<()> {
        let runner = match self.find_runner(label).await? {
            Some(runner) => runner,
            None => {
                tracing::warn!(
                    "GitHub self-hosted runner with label {label} not found, skipping removal"
                );
                return Ok(());
            }
        };

        let url = self.repo_url(&format!("actions/runners/{}", runner.id));
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .context("GitHub runner removal request failed")?;

        if !response.status().is_success() {
            bail!(
                "GitHub self-hosted runner {} removal failed with status {}",
                runner.name,
                response.status()
            );
        }
        tracing::info!("GitHub self-hosted runner {} is removed", runner.name);
        Ok(())
    }

    /// Block until the runner registered with `label` reports `online`, or
    /// the registration timeout elapses.
    pub async fn wait_for_runner_registered(&self, label: &str) -> Result<()> {
        tracing::info!(
            "Waiting {}s for the AWS EC2 instance to register itself in GitHub as a self-hosted runner",
            REGISTERED_QUIET_PERIOD.as_secs()
        );
        tokio::time::sleep(REGISTERED_QUIET_PERIOD).await;

        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(REGISTERED_TIMEOUT_MINUTES * 60);
        loop {
            tracing::info!("Checking if the GitHub self-hosted runner is registered");
            let runner = match self.find_runner(label).await {
                Ok(runner) => runner,
                Err(error) => {
                    // Listing can fail transiently while the runner spins up.
                    tracing::debug!("Runner list poll failed: {error:#}");
                    None
                }
            };

            if let Some(runner) = runner {
                if runner.status == "online" {
                    tracing::info!(
                        "GitHub self-hosted runner {} is registered and ready to use",
                        runner.name
                    );
                    return Ok(());
                }
            }

            if tokio::time::Instant::now() >= deadline {
                bail!(
                    "A timeout of {REGISTERED_TIMEOUT_MINUTES} minutes is exceeded. \
                     The AWS EC2 instance was not able to register itself in GitHub \
                     as a new self-hosted runner."
                );
            }
            tokio::time::sleep(REGISTERED_RETRY_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GithubContext;

    const RUNNER_LIST: &str = r#"{
        "total_count": 2,
        "runners": [
            {
                "id": 21,
                "name": "ip-10-0-0-1",
                "os": "linux",
                "status": "online",
                "labels": [{"id": 1, "name": "self-hosted", "type": "read-only"},
                           {"id": 7, "name": "abc12", "type": "custom"}]
            },
            {
                "id": 22,
                "name": "ip-10-0-0-2",
                "os": "linux",
                "status": "offline",
                "labels": [{"id": 1, "name": "self-hosted", "type": "read-only"}]
            }
        ]
    }"#;

    #[test]
    fn test_runner_found_by_custom_label() {
        let list: RunnerList = serde_json::from_str(RUNNER_LIST).unwrap();
        let runner = runner_with_label(list, "abc12").unwrap();
        assert_eq!(runner.id, 21);
        assert_eq!(runner.name, "ip-10-0-0-1");
        assert_eq!(runner.status, "online");
    }

    #[test]
    fn test_unknown_label_matches_nothing() {
        let list: RunnerList = serde_json::from_str(RUNNER_LIST).unwrap();
        assert!(runner_with_label(list, "zzzzz").is_none());
    }

    #[test]
    fn test_repo_urls() {
        let client = GithubClient {
            client: reqwest::Client::new(),
            api_base: Url::parse("https://api.github.com").unwrap(),
            token: "ghp_test".to_string(),
            owner: "octo-org".to_string(),
            repo: "octo-repo".to_string(),
        };
        assert_eq!(
            client.repo_url("actions/runners/registration-token"),
            "https://api.github.com/repos/octo-org/octo-repo/actions/runners/registration-token"
        );
        assert_eq!(
            client.repo_url("actions/runners/21"),
            "https://api.github.com/repos/octo-org/octo-repo/actions/runners/21"
        );
    }

    #[test]
    fn test_github_client_from_config() {
        let config = Config {
            mode: crate::config::Mode::Start,
            github_token: "ghp_test".to_string(),
            ec2_instance_id: "i-1".to_string(),
            iam_role_name: None,
            runner_home_dir: None,
            label: None,
            tag_specifications: None,
            github_context: GithubContext {
                owner: "octo-org".to_string(),
                repo: "octo-repo".to_string(),
            },
        };
        let client = GithubClient::new(&config).unwrap();
        assert_eq!(client.owner, "octo-org");
        assert_eq!(client.repo, "octo-repo");
    }
}
