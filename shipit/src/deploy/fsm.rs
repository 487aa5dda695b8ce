//! Finite State Machine for the deployment pipeline

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SourceSync,
    ArtifactValidation,
    RemoteConnection,
    Provisioning,
    Transfer,
    Deployment,
    ProxyConfiguration,
    Validation,
    Teardown,
}

impl Stage {
    /// Every stage in pipeline order
    pub const ALL: [Stage; 9] = [
        Stage::SourceSync,
        Stage::ArtifactValidation,
        Stage::RemoteConnection,
        Stage::Provisioning,
        Stage::Transfer,
        Stage::Deployment,
        Stage::ProxyConfiguration,
        Stage::Validation,
        Stage::Teardown,
    ];

    /// Human readable stage name
    pub fn name(&self) -> &'static str {
        match self {
            Stage::SourceSync => "source sync",
            Stage::ArtifactValidation => "artifact validation",
            Stage::RemoteConnection => "remote connection",
            Stage::Provisioning => "remote provisioning",
            Stage::Transfer => "artifact transfer",
            Stage::Deployment => "deployment",
            Stage::ProxyConfiguration => "proxy configuration",
            Stage::Validation => "deployment validation",
            Stage::Teardown => "teardown",
        }
    }

    /// The stage that follows this one, if any
    pub fn next(&self) -> Option<Stage> {
        let idx = Stage::ALL.iter().position(|s| s == self)?;
        Stage::ALL.get(idx + 1).copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pipeline state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// Nothing has run yet
    Pending,

    /// A stage is executing
    Running(Stage),

    /// The last stage that ran succeeded and the run is over
    Completed,

    /// A stage failed and the run was aborted
    Failed(Stage),
}

/// Pipeline event
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Begin a stage
    Begin(Stage),

    /// The running stage succeeded
    StageSucceeded,

    /// The running stage failed
    StageFailed(String),

    /// No further stages will run
    Finish,
}

/// Pipeline FSM
///
/// Stages may only begin in pipeline order. `Teardown` is the one stage that
/// may be skipped, so finishing after `Validation` is valid.
#[derive(Debug, Clone)]
pub struct PipelineFsm {
    state: PipelineState,
    completed: Vec<Stage>,
    error: Option<String>,
}

impl PipelineFsm {
    /// Create a new FSM in pending state
    pub fn new() -> Self {
        Self {
            state: PipelineState::Pending,
            completed: Vec::new(),
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Stages that finished successfully, in order
    pub fn completed(&self) -> &[Stage] {
        &self.completed
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn expected_next(&self) -> Option<Stage> {
        match self.completed.last() {
            Some(stage) => stage.next(),
            None => Some(Stage::SourceSync),
        }
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: PipelineEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (PipelineState::Pending, PipelineEvent::Begin(stage))
                if Some(*stage) == self.expected_next() =>
            {
                PipelineState::Running(*stage)
            }

            (PipelineState::Running(stage), PipelineEvent::StageSucceeded) => {
                self.completed.push(*stage);
                PipelineState::Pending
            }
            (PipelineState::Running(stage), PipelineEvent::StageFailed(err)) => {
                self.error = Some(err.clone());
                PipelineState::Failed(*stage)
            }

            (PipelineState::Pending, PipelineEvent::Finish)
                if self.completed.contains(&Stage::Validation) =>
            {
                PipelineState::Completed
            }

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for PipelineFsm {
    fn default() -> Self {
        Self::new()
    }
}
