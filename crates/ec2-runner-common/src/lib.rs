// ec2-runner-common: shared services for the on-demand EC2 runner action.
// Configuration loading, cloud-init user-data templating, and the GitHub
// REST API plumbing used by both the start and stop modes.

pub mod actions;
pub mod config;
pub mod github;
pub mod user_data;

// Re-export commonly used items at crate root
pub use config::{generate_unique_label, Config, ConfigError, GithubContext, Mode, ResourceTag, TagSpecification};
pub use github::GithubClient;
pub use user_data::build_user_data;
