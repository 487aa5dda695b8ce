//! Error types for shipit

use std::path::PathBuf;

use thiserror::Error;

use crate::deploy::fsm::Stage;

/// Exit code used when a failure has no subprocess status of its own
pub const GENERIC_FAILURE: i32 = 1;

/// Exit code used when a required tool cannot be spawned
pub const SPAWN_FAILURE: i32 = 127;

/// Main error type for a deployment run
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Source unavailable (exit status {status}): {message}")]
    SourceUnavailable { status: i32, message: String },

    #[error("No deployment descriptor found in {0}")]
    NoDeploymentDescriptor(PathBuf),

    #[error("Remote host unreachable (exit status {status}): {message}")]
    RemoteUnreachable { status: i32, message: String },

    #[error("Provisioning failed (exit status {status}): {message}")]
    ProvisioningFailed { status: i32, message: String },

    #[error("Transfer failed (exit status {status}): {message}")]
    TransferFailed { status: i32, message: String },

    #[error("Deployment failed (exit status {status}): {message}")]
    DeploymentFailed { status: i32, message: String },

    #[error("Proxy configuration failed (exit status {status}): {message}")]
    ProxyConfigFailed { status: i32, message: String },

    #[error("Cleanup failed (exit status {status}): {message}")]
    CleanupFailed { status: i32, message: String },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to create run log: {0}")]
    LogInit(#[from] tracing_appender::rolling::InitError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Build the failure variant that belongs to a pipeline stage
    pub fn for_stage(stage: Stage, status: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        match stage {
            Stage::SourceSync => DeployError::SourceUnavailable { status, message },
            Stage::ArtifactValidation => DeployError::Internal(message),
            Stage::RemoteConnection => DeployError::RemoteUnreachable { status, message },
            Stage::Provisioning => DeployError::ProvisioningFailed { status, message },
            Stage::Transfer => DeployError::TransferFailed { status, message },
            Stage::Deployment => DeployError::DeploymentFailed { status, message },
            Stage::ProxyConfiguration => DeployError::ProxyConfigFailed { status, message },
            // The validator is advisory and never produces a stage failure
            Stage::Validation => DeployError::Internal(message),
            Stage::Teardown => DeployError::CleanupFailed { status, message },
        }
    }

    /// The process exit code this error terminates the run with
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::SourceUnavailable { status, .. }
            | DeployError::RemoteUnreachable { status, .. }
            | DeployError::ProvisioningFailed { status, .. }
            | DeployError::TransferFailed { status, .. }
            | DeployError::DeploymentFailed { status, .. }
            | DeployError::ProxyConfigFailed { status, .. }
            | DeployError::CleanupFailed { status, .. } => {
                if *status == 0 {
                    GENERIC_FAILURE
                } else {
                    *status
                }
            }
            DeployError::Spawn { .. } => SPAWN_FAILURE,
            _ => GENERIC_FAILURE,
        }
    }
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(err.to_string())
    }
}
