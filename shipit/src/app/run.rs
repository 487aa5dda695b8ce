//! Deployment pipeline

use std::future::Future;

use crate::app::config::DeploymentConfig;
use crate::deploy::compose::deploy_workload;
use crate::deploy::descriptor::{validate_artifacts, Descriptor};
use crate::deploy::fsm::{PipelineEvent, PipelineFsm, Stage};
use crate::deploy::git::{sync_repository, SyncOutcome};
use crate::deploy::proxy::configure_proxy;
use crate::deploy::teardown::teardown;
use crate::deploy::validate::{validate_deployment, ValidationReport};
use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::logs::RunLog;
use crate::process::CommandRunner;
use crate::remote::connector::check_connection;
use crate::remote::provision::provision_host;
use crate::remote::ssh::SshTarget;
use crate::remote::transfer::transfer_artifacts;

/// Per-run options that are not part of the deployment configuration
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Local working copy of the repository
    pub working_copy: Dir,

    /// Remove the deployment again once it has been validated
    pub cleanup: bool,
}

/// Summary of a successful run
#[derive(Debug, Clone)]
pub struct DeploymentReport {
    pub sync: SyncOutcome,
    pub descriptor: Descriptor,
    pub validation: ValidationReport,
    pub cleaned_up: bool,
    pub stages: Vec<Stage>,
}

struct Pipeline<'a> {
    fsm: PipelineFsm,
    log: &'a RunLog,
}

impl<'a> Pipeline<'a> {
    fn new(log: &'a RunLog) -> Self {
        Self {
            fsm: PipelineFsm::new(),
            log,
        }
    }

    fn transition(&mut self, event: PipelineEvent) -> Result<(), DeployError> {
        self.fsm.process(event).map_err(DeployError::Internal)
    }

    /// Run one stage; its failure is logged and ends the pipeline
    async fn stage<T, F>(&mut self, stage: Stage, work: F) -> Result<T, DeployError>
    where
        F: Future<Output = Result<T, DeployError>>,
    {
        self.transition(PipelineEvent::Begin(stage))?;
        self.log.info(format!("==> Stage: {}", stage));

        match work.await {
            Ok(value) => {
                self.transition(PipelineEvent::StageSucceeded)?;
                Ok(value)
            }
            Err(e) => {
                self.transition(PipelineEvent::StageFailed(e.to_string()))?;
                self.log.error(format!(
                    "Stage '{}' failed: {}. See {} for details",
                    stage,
                    e,
                    self.log.path().display()
                ));
                Err(e)
            }
        }
    }

    fn finish(mut self) -> Result<Vec<Stage>, DeployError> {
        self.transition(PipelineEvent::Finish)?;
        Ok(self.fsm.completed().to_vec())
    }
}

/// Run the whole deployment pipeline
///
/// Stages run strictly one after another. The first failure aborts the run
/// and is returned unchanged; nothing is retried or rolled back.
pub async fn run(
    config: &DeploymentConfig,
    options: &RunOptions,
    runner: &dyn CommandRunner,
    log: &RunLog,
) -> Result<DeploymentReport, DeployError> {
    let mut pipeline = Pipeline::new(log);
    let target = SshTarget::from_config(config);
    let working_copy = &options.working_copy;

    let sync = pipeline
        .stage(
            Stage::SourceSync,
            sync_repository(runner, config, working_copy, log),
        )
        .await?;

    let descriptor = pipeline
        .stage(
            Stage::ArtifactValidation,
            validate_artifacts(working_copy, log),
        )
        .await?;

    pipeline
        .stage(
            Stage::RemoteConnection,
            check_connection(runner, &target, log),
        )
        .await?;

    pipeline
        .stage(Stage::Provisioning, provision_host(runner, &target, log))
        .await?;

    pipeline
        .stage(
            Stage::Transfer,
            transfer_artifacts(runner, working_copy, &target, log),
        )
        .await?;

    pipeline
        .stage(
            Stage::Deployment,
            deploy_workload(runner, &target, &descriptor, config.app_port, log),
        )
        .await?;

    pipeline
        .stage(
            Stage::ProxyConfiguration,
            configure_proxy(runner, &target, config.app_port, log),
        )
        .await?;

    let validation = pipeline
        .stage(Stage::Validation, async {
            Ok::<_, DeployError>(validate_deployment(runner, &target, log).await)
        })
        .await?;
    log.info(format!(
        "Deployment successful! Application available at {}",
        config.public_url()
    ));

    if options.cleanup {
        pipeline
            .stage(Stage::Teardown, teardown(runner, &target, log))
            .await?;
    }

    Ok(DeploymentReport {
        sync,
        descriptor,
        validation,
        cleaned_up: options.cleanup,
        stages: pipeline.finish()?,
    })
}
