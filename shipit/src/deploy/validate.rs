//! Post-deployment liveness check

use crate::deploy::fsm::Stage;
use crate::logs::RunLog;
use crate::process::{run_logged, CommandRunner};
use crate::remote::ssh::SshTarget;

/// Outcome of the post-deployment check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// `docker ps` output, when it could be listed
    pub containers: Option<String>,

    /// Whether the proxy answered on port 80
    pub probe_ok: bool,

    /// The externally reachable address of the app
    pub url: String,
}

/// Inspect containers and probe the proxy from the remote host
///
/// Advisory only: nothing here fails the run. Failures are logged as
/// warnings and reflected in the report.
pub async fn validate_deployment(
    runner: &dyn CommandRunner,
    target: &SshTarget,
    log: &RunLog,
) -> ValidationReport {
    let stage = Stage::Validation;

    log.info(format!("[{}] Listing running containers", stage));
    let containers = match run_logged(runner, &target.command("docker ps"), log).await {
        Ok(output) if output.success() => Some(output.stdout),
        Ok(output) => {
            log.warn(format!("Could not list containers: {}", output.summary()));
            None
        }
        Err(e) => {
            log.warn(format!("Could not list containers: {}", e));
            None
        }
    };

    log.info(format!("[{}] Probing http://localhost:80 on the host", stage));
    let probe = target.command("curl -sS -I --fail http://localhost:80");
    let probe_ok = match run_logged(runner, &probe, log).await {
        Ok(output) if output.success() => {
            log.info("HTTP probe succeeded");
            true
        }
        Ok(output) => {
            log.warn(format!("HTTP probe failed: {}", output.summary()));
            false
        }
        Err(e) => {
            log.warn(format!("HTTP probe failed: {}", e));
            false
        }
    };

    ValidationReport {
        containers,
        probe_ok,
        url: format!("http://{}", target.host),
    }
}
