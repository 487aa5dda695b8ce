//! Remote host provisioning

use crate::deploy::fsm::Stage;
use crate::errors::DeployError;
use crate::logs::RunLog;
use crate::process::CommandRunner;
use crate::remote::ssh::{run_steps, shell_quote, RemoteStep, SshTarget};

/// Packages installed on the target host
pub const PACKAGES: [&str; 3] = ["docker.io", "docker-compose", "nginx"];

/// The steps that bring a host to a deployable state
///
/// Every step is safe to repeat; the package manager skips installed
/// packages. Adding the user to the `docker` group may fail when the
/// membership already exists, so that step is tolerated.
pub fn provisioning_steps(user: &str) -> Vec<RemoteStep> {
    vec![
        RemoteStep::new("Refreshing package index", "sudo apt-get update -y"),
        RemoteStep::new(
            "Installing docker, docker-compose and nginx",
            format!(
                "sudo DEBIAN_FRONTEND=noninteractive apt-get install -y {}",
                PACKAGES.join(" ")
            ),
        ),
        RemoteStep::new("Enabling docker service", "sudo systemctl enable docker"),
        RemoteStep::new("Starting docker service", "sudo systemctl start docker"),
        RemoteStep::new(
            format!("Adding {} to the docker group", user),
            format!("sudo usermod -aG docker {}", shell_quote(user)),
        )
        .tolerated(),
    ]
}

/// Install and start everything the deployment needs on the host
pub async fn provision_host(
    runner: &dyn CommandRunner,
    target: &SshTarget,
    log: &RunLog,
) -> Result<(), DeployError> {
    run_steps(
        runner,
        target,
        Stage::Provisioning,
        &provisioning_steps(&target.user),
        log,
    )
    .await?;
    log.info("Remote host provisioned");
    Ok(())
}
