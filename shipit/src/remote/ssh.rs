//! SSH transport and remote step execution

use std::path::PathBuf;

use crate::app::config::DeploymentConfig;
use crate::deploy::fsm::Stage;
use crate::errors::DeployError;
use crate::logs::RunLog;
use crate::process::{run_logged, CommandOutput, CommandRunner, CommandSpec};

/// Remote directory holding the application code
pub const REMOTE_APP_DIR: &str = "~/app";

/// Quote a value for a POSIX shell
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Where and as whom remote commands run
///
/// Host keys are never verified and never recorded: first contact with a
/// freshly provisioned host must not prompt or fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub user: String,
    pub host: String,
    pub key_path: PathBuf,
}

impl SshTarget {
    pub fn new(user: impl Into<String>, host: impl Into<String>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            key_path: key_path.into(),
        }
    }

    pub fn from_config(config: &DeploymentConfig) -> Self {
        Self::new(
            config.ssh_user.clone(),
            config.server_address.clone(),
            config.ssh_key_path.clone(),
        )
    }

    /// `user@host`
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn transport_options(&self) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.key_path.display().to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
        ]
    }

    /// An `ssh` invocation running `remote` on the target
    pub fn command(&self, remote: &str) -> CommandSpec {
        CommandSpec::new("ssh")
            .args(self.transport_options())
            .arg(self.destination())
            .arg(remote)
    }

    /// The remote shell string handed to `rsync -e`
    pub fn rsync_shell(&self) -> String {
        let mut parts = vec!["ssh".to_string()];
        parts.extend(self.transport_options().iter().map(|o| shell_quote(o)));
        parts.join(" ")
    }

    /// `user@host:path` as understood by rsync
    pub fn remote_path(&self, path: &str) -> String {
        format!("{}:{}", self.destination(), path)
    }
}

/// One discrete command of a remote sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStep {
    pub description: String,
    pub command: String,
    pub env: Vec<(String, String)>,
    pub stdin: Option<Vec<u8>>,
    pub tolerate_failure: bool,
}

impl RemoteStep {
    pub fn new(description: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            command: command.into(),
            env: Vec::new(),
            stdin: None,
            tolerate_failure: false,
        }
    }

    /// A non-zero exit of this step does not fail the sequence
    pub fn tolerated(mut self) -> Self {
        self.tolerate_failure = true;
        self
    }

    /// Export a variable into the remote environment of this step
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// The command line executed by the remote shell
    pub fn remote_line(&self) -> String {
        let exports: Vec<String> = self
            .env
            .iter()
            .map(|(key, value)| format!("export {}={};", key, shell_quote(value)))
            .collect();
        if exports.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", exports.join(" "), self.command)
        }
    }

    fn to_command(&self, target: &SshTarget) -> CommandSpec {
        let spec = target.command(&self.remote_line());
        match &self.stdin {
            Some(input) => spec.stdin(input.clone()),
            None => spec,
        }
    }
}

/// Run remote steps in order, one SSH invocation each
///
/// Stops at the first failing step that is not tolerated and reports it as
/// the failure of `stage`. Returns the output of every step that ran.
pub async fn run_steps(
    runner: &dyn CommandRunner,
    target: &SshTarget,
    stage: Stage,
    steps: &[RemoteStep],
    log: &RunLog,
) -> Result<Vec<CommandOutput>, DeployError> {
    let mut outputs = Vec::with_capacity(steps.len());

    for step in steps {
        log.info(format!("[{}] {}", stage, step.description));
        let output = run_logged(runner, &step.to_command(target), log).await?;

        if !output.success() {
            if step.tolerate_failure {
                log.warn(format!(
                    "[{}] {} failed with status {} (ignored)",
                    stage, step.description, output.status
                ));
            } else {
                return Err(DeployError::for_stage(
                    stage,
                    output.status,
                    format!("{}: {}", step.description, output.summary()),
                ));
            }
        }
        outputs.push(output);
    }

    Ok(outputs)
}
