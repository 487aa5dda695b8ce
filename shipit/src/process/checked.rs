//! Logged subprocess execution with stage-aware failure mapping

use crate::deploy::fsm::Stage;
use crate::errors::DeployError;
use crate::logs::RunLog;
use crate::process::command::{CommandOutput, CommandRunner, CommandSpec};

/// Run a command, copying its command line and output into the run log
///
/// The exit status is not checked.
pub async fn run_logged(
    runner: &dyn CommandRunner,
    spec: &CommandSpec,
    log: &RunLog,
) -> Result<CommandOutput, DeployError> {
    log.output("$", &spec.to_string());
    let output = runner.run(spec).await?;
    log.output("stdout", &output.stdout);
    log.output("stderr", &output.stderr);
    Ok(output)
}

/// Run a command and turn a non-zero exit into the stage's failure
pub async fn run_checked(
    runner: &dyn CommandRunner,
    spec: &CommandSpec,
    stage: Stage,
    what: &str,
    log: &RunLog,
) -> Result<CommandOutput, DeployError> {
    let output = run_logged(runner, spec, log).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(DeployError::for_stage(
            stage,
            output.status,
            format!("{}: {}", what, output.summary()),
        ))
    }
}
