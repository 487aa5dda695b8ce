//! Removal of a deployment from the remote host

use crate::deploy::compose::shutdown_steps;
use crate::deploy::fsm::Stage;
use crate::deploy::proxy::removal_steps;
use crate::errors::DeployError;
use crate::logs::RunLog;
use crate::process::CommandRunner;
use crate::remote::ssh::{run_steps, RemoteStep, SshTarget, REMOTE_APP_DIR};

/// Steps that remove the app and its proxy site
///
/// `rm -rf` and `rm -f` succeed when the targets are already gone.
pub fn teardown_steps() -> Vec<RemoteStep> {
    let mut steps = shutdown_steps();
    steps.push(RemoteStep::new(
        "Removing application directory",
        format!("rm -rf {}", REMOTE_APP_DIR),
    ));
    steps.extend(removal_steps());
    steps
}

/// Remove the deployment; destructive and never confirmed
pub async fn teardown(
    runner: &dyn CommandRunner,
    target: &SshTarget,
    log: &RunLog,
) -> Result<(), DeployError> {
    log.warn(format!("Removing deployment from {}", target.host));
    run_steps(runner, target, Stage::Teardown, &teardown_steps(), log).await?;
    log.info("Deployment removed");
    Ok(())
}
