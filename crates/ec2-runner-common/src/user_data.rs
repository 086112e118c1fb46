// cloud-init user-data templating for the runner bootstrap.
//
// The document is a two-part MIME multipart: a cloud-config part that keeps
// the `scripts-user` module running on every boot, then the shell script that
// registers the instance with GitHub and launches the Actions runner.
// User-data scripts run as the root user.

use crate::config::GithubContext;

/// Pinned actions/runner release used by the download branch.
pub const RUNNER_VERSION: &str = "2.286.0";

const MIME_BOUNDARY: &str = "//";

/// Build the cloud-init user-data document, one line per entry.
///
/// When `runner_home_dir` is given, the runner software is expected to be
/// pre-installed in the image at that path and the script only registers and
/// starts it. Otherwise the script downloads and extracts the pinned runner
/// release for the instance's CPU architecture first.
///
/// The token and label are interpolated verbatim; callers must not pass
/// values containing shell metacharacters.
pub fn build_user_data(
    github_context: &GithubContext,
    registration_token: &str,
    label: &str,
    runner_home_dir: Option<&str>,
) -> Vec<String> {
    let mut lines = vec![
        format!("Content-Type: multipart/mixed; boundary=\"{MIME_BOUNDARY}\""),
        "MIME-Version: 1.0".to_string(),
        String::new(),
        format!("--{MIME_BOUNDARY}"),
        "Content-Type: text/cloud-config; charset=\"us-ascii\"".to_string(),
        "MIME-Version: 1.0".to_string(),
        "Content-Transfer-Encoding: 7bit".to_string(),
        "Content-Disposition: attachment; filename=\"cloud-config.txt\"".to_string(),
        String::new(),
        "#cloud-config".to_string(),
        "cloud_final_modules:".to_string(),
        "- [scripts-user, always]".to_string(),
        String::new(),
        format!("--{MIME_BOUNDARY}"),
        "Content-Type: text/x-shellscript; charset=\"us-ascii\"".to_string(),
        "MIME-Version: 1.0".to_string(),
        "Content-Transfer-Encoding: 7bit".to_string(),
        "Content-Disposition: attachment; filename=\"userdata.txt\"".to_string(),
        String::new(),
        "#!/bin/bash".to_string(),
    ];

    match runner_home_dir {
        Some(home) => {
            lines.push(format!("cd \"{home}\""));
        }
        None => {
            lines.push("mkdir actions-runner && cd actions-runner".to_string());
            lines.push(
                "case $(uname -m) in aarch64) ARCH=\"arm64\" ;; amd64|x86_64) ARCH=\"x64\" ;; esac && export RUNNER_ARCH=${ARCH}"
                    .to_string(),
            );
            lines.push(format!(
                "curl -O -L https://github.com/actions/runner/releases/download/v{RUNNER_VERSION}/actions-runner-linux-${{RUNNER_ARCH}}-{RUNNER_VERSION}.tar.gz"
            ));
            lines.push(format!(
                "tar xzf ./actions-runner-linux-${{RUNNER_ARCH}}-{RUNNER_VERSION}.tar.gz"
            ));
        }
    }

    lines.push("export RUNNER_ALLOW_RUNASROOT=1".to_string());
    lines.push(format!(
        "./config.sh --url https://github.com/{}/{} --token {} --labels {}",
        github_context.owner, github_context.repo, registration_token, label
    ));
    lines.push("./run.sh".to_string());
    lines.push(format!("--{MIME_BOUNDARY}--"));

    lines
}
