// Entry point for the on-demand EC2 runner action.
//
// `mode=start` provisions the ephemeral runner: fetch a registration token,
// write the bootstrap user-data, start the instance, publish the step
// outputs, and wait until both EC2 and GitHub report it ready.
// `mode=stop` stops the instance and removes the runner registration.

use ec2_runner_aws::{Ec2Client, InstanceController};
use ec2_runner_common::{actions, generate_unique_label, Config, GithubClient, Mode};

fn main() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime");

    let exit_code = runtime.block_on(run());
    std::process::exit(exit_code);
}

// INFO by default, but an operator-provided `RUST_LOG` wins outright.
fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

async fn run() -> i32 {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();

    // Configuration errors are operator errors: reported once, fatal, and
    // raised before any remote call is attempted.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("{error}");
            return 1;
        }
    };

    let result = match config.mode {
        Mode::Start => start(&config).await,
        Mode::Stop => stop(&config).await,
    };

    match result {
        Ok(()) => 0,
        Err(error) => {
            tracing::error!("{error:#}");
            1
        }
    }
}

async fn start(config: &Config) -> anyhow::Result<()> {
    let label = generate_unique_label();

    let github = GithubClient::new(config)?;
    let registration_token = github.registration_token().await?;

    let ec2 = Ec2Client::from_env().await;
    let controller = InstanceController::new(&ec2, config);
    let instance_id = controller.start(&label, &registration_token).await?;

    actions::set_output("label", &label)?;
    actions::set_output("ec2-instance-id", &instance_id)?;

    controller.wait_until_running(&instance_id).await?;
    github.wait_for_runner_registered(&label).await
}

async fn stop(config: &Config) -> anyhow::Result<()> {
    let ec2 = Ec2Client::from_env().await;
    let controller = InstanceController::new(&ec2, config);
    controller.stop().await?;

    if let Some(label) = config.label.as_deref() {
        let github = GithubClient::new(config)?;
        github.remove_runner(label).await?;
    }
    Ok(())
}
