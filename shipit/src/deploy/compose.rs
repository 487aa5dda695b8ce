//! Remote workload lifecycle

use crate::deploy::descriptor::Descriptor;
use crate::deploy::fsm::Stage;
use crate::errors::DeployError;
use crate::logs::RunLog;
use crate::process::CommandRunner;
use crate::remote::ssh::{run_steps, shell_quote, RemoteStep, SshTarget, REMOTE_APP_DIR};

/// Container and image name used for single-container deployments
pub const CONTAINER_NAME: &str = "app";

fn in_app_dir(command: &str) -> String {
    format!("cd {} && {}", REMOTE_APP_DIR, command)
}

/// Steps that replace the running workload with a freshly built one
///
/// Bringing the previous workload down is tolerated: on a first deployment
/// there is nothing to stop.
pub fn deployment_steps(descriptor: &Descriptor, app_port: u16) -> Vec<RemoteStep> {
    match descriptor {
        Descriptor::Compose(_) => {
            let file = shell_quote(&descriptor.file_name());
            vec![
                RemoteStep::new(
                    "Stopping previous deployment",
                    in_app_dir(&format!("docker-compose -f {} down", file)),
                )
                .tolerated(),
                RemoteStep::new(
                    "Building images",
                    in_app_dir(&format!("docker-compose -f {} build", file)),
                ),
                RemoteStep::new(
                    "Starting containers",
                    in_app_dir(&format!("docker-compose -f {} up -d", file)),
                ),
            ]
        }
        Descriptor::Dockerfile(_) => vec![
            RemoteStep::new(
                "Stopping previous deployment",
                format!("docker rm -f {}", CONTAINER_NAME),
            )
            .tolerated(),
            RemoteStep::new(
                "Building image",
                in_app_dir(&format!("docker build -t {} .", CONTAINER_NAME)),
            ),
            RemoteStep::new(
                "Starting container",
                format!(
                    "docker run -d --name {name} --restart unless-stopped -p {port}:{port} {name}",
                    name = CONTAINER_NAME,
                    port = app_port
                ),
            ),
        ],
    }
}

/// Stop, rebuild and start the workload on the remote host
pub async fn deploy_workload(
    runner: &dyn CommandRunner,
    target: &SshTarget,
    descriptor: &Descriptor,
    app_port: u16,
    log: &RunLog,
) -> Result<(), DeployError> {
    run_steps(
        runner,
        target,
        Stage::Deployment,
        &deployment_steps(descriptor, app_port),
        log,
    )
    .await?;
    log.info("Workload started");
    Ok(())
}

/// Steps that stop the workload before its files are removed
///
/// Both are tolerated since only one of them matches the deployed
/// descriptor, and the app may already be gone.
pub fn shutdown_steps() -> Vec<RemoteStep> {
    vec![
        RemoteStep::new("Stopping compose services", in_app_dir("docker-compose down")).tolerated(),
        RemoteStep::new(
            "Removing app container",
            format!("docker rm -f {}", CONTAINER_NAME),
        )
        .tolerated(),
    ]
}
