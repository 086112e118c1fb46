// Action configuration mapping the `action.yml` input surface.
// Constructed once by the caller and passed explicitly to every operation;
// validation is fail-fast and never retried.

use crate::actions;
use rand::Rng;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A fatal configuration problem. These surface before any remote call is
/// attempted and fail the job immediately.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("The 'mode' input is not specified")]
    MissingMode,

    #[error("Unknown mode '{0}', allowed values: start, stop")]
    UnknownMode(String),

    #[error("The 'ec2-instance-id' input is not specified")]
    MissingInstanceId,

    #[error("The 'aws-resource-tags' input is not a valid JSON array: {0}")]
    InvalidTags(#[source] serde_json::Error),

    #[error("GITHUB_REPOSITORY is not set in 'owner/repo' format")]
    InvalidRepository,
}

/// What the action should do with the configured instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Start,
    Stop,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Start => write!(f, "start"),
            Mode::Stop => write!(f, "stop"),
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Mode::Start),
            "stop" => Ok(Mode::Stop),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// One `{Key, Value}` pair from the `aws-resource-tags` input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceTag {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

/// Tags grouped by the resource they apply to, mirroring the shape of the
/// EC2 tag-specification parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpecification {
    pub resource_type: &'static str,
    pub tags: Vec<ResourceTag>,
}

/// The repository this workflow run belongs to, split out of the
/// `GITHUB_REPOSITORY` variable the runtime provides in `owner/repo` format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubContext {
    pub owner: String,
    pub repo: String,
}

/// Immutable action configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub github_token: String,
    pub ec2_instance_id: String,
    pub iam_role_name: Option<String>,
    pub runner_home_dir: Option<String>,
    /// The runner label to deregister in stop mode, produced by a previous
    /// start-mode step.
    pub label: Option<String>,
    pub tag_specifications: Option<Vec<TagSpecification>>,
    pub github_context: GithubContext,
}

impl Config {
    /// Load the configuration from the action environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(actions::get_input, std::env::var("GITHUB_REPOSITORY").ok())
    }

    /// Build a configuration from a pluggable input source, so callers and
    /// tests need not mutate the process environment. `repository` carries
    /// the `GITHUB_REPOSITORY` value in `owner/repo` format.
    pub fn from_source<F>(input: F, repository: Option<String>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = input("mode").ok_or(ConfigError::MissingMode)?.parse()?;
        let ec2_instance_id = input("ec2-instance-id").ok_or(ConfigError::MissingInstanceId)?;

        let tags: Vec<ResourceTag> = match input("aws-resource-tags") {
            Some(raw) => serde_json::from_str(&raw).map_err(ConfigError::InvalidTags)?,
            None => Vec::new(),
        };
        let tag_specifications = if tags.is_empty() {
            None
        } else {
            Some(vec![
                TagSpecification {
                    resource_type: "instance",
                    tags: tags.clone(),
                },
                TagSpecification {
                    resource_type: "volume",
                    tags,
                },
            ])
        };

        let github_context = repository
            .as_deref()
            .and_then(|repository| repository.split_once('/'))
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
            .map(|(owner, repo)| GithubContext {
                owner: owner.to_string(),
                repo: repo.to_string(),
            })
            .ok_or(ConfigError::InvalidRepository)?;

        Ok(Self {
            mode,
            github_token: input("github-token").unwrap_or_default(),
            ec2_instance_id,
            iam_role_name: input("iam-role-name"),
            runner_home_dir: input("runner-home-dir"),
            label: input("label"),
            tag_specifications,
            github_context,
        })
    }
}

/// Generate the short random label that ties a runner registration to this
/// workflow run.
pub fn generate_unique_label() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..5)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}
