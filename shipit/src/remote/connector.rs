//! Remote reachability check

use crate::deploy::fsm::Stage;
use crate::errors::DeployError;
use crate::logs::RunLog;
use crate::process::CommandRunner;
use crate::remote::ssh::{run_steps, RemoteStep, SshTarget};

/// Verify that an authenticated, non-interactive session can be opened
///
/// Runs a trivial command and discards its output.
pub async fn check_connection(
    runner: &dyn CommandRunner,
    target: &SshTarget,
    log: &RunLog,
) -> Result<(), DeployError> {
    let steps = [RemoteStep::new(
        format!("Checking SSH access to {}", target.destination()),
        "true",
    )];
    run_steps(runner, target, Stage::RemoteConnection, &steps, log).await?;
    log.info(format!("SSH connection to {} established", target.destination()));
    Ok(())
}
