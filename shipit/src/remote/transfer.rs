//! Artifact transfer to the remote host

use crate::deploy::fsm::Stage;
use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::logs::RunLog;
use crate::process::{run_checked, CommandRunner, CommandSpec};
use crate::remote::ssh::{SshTarget, REMOTE_APP_DIR};

/// The rsync invocation mirroring `working_copy` into the remote app dir
///
/// `--delete` removes remote files that no longer exist locally, so the
/// remote tree matches the working copy exactly.
pub fn transfer_command(working_copy: &Dir, target: &SshTarget) -> CommandSpec {
    CommandSpec::new("rsync")
        .args(["-az", "--delete", "-e"])
        .arg(target.rsync_shell())
        .arg(working_copy.contents_arg())
        .arg(target.remote_path(&format!("{}/", REMOTE_APP_DIR)))
}

/// Mirror the working copy to the remote host
pub async fn transfer_artifacts(
    runner: &dyn CommandRunner,
    working_copy: &Dir,
    target: &SshTarget,
    log: &RunLog,
) -> Result<(), DeployError> {
    log.info(format!(
        "[{}] Syncing {} to {}",
        Stage::Transfer,
        working_copy.path().display(),
        target.remote_path(REMOTE_APP_DIR)
    ));
    run_checked(
        runner,
        &transfer_command(working_copy, target),
        Stage::Transfer,
        "rsync",
        log,
    )
    .await?;
    log.info("Application files transferred");
    Ok(())
}
