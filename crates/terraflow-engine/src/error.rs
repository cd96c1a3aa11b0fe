use terraflow_activities::ActivityError;
use terraflow_config::ConfigError;
use thiserror::Error;

use crate::signals::SignalError;

/// Errors surfaced by the orchestration engine.
#[derive(Debug, Error)]
pub enum EngineError {
  /// Configuration rejected before any execution.
  #[error(transparent)]
  Config(#[from] ConfigError),

  /// An activity failed for a workspace; `phase` names the operation
  /// (init/validate/plan/apply/output/variables) and the source carries
  /// the tool output.
  #[error("workspace '{workspace}' {phase} failed: {source}")]
  Workspace {
    workspace: String,
    phase: String,
    #[source]
    source: ActivityError,
  },

  /// The executor met an operation it does not understand.
  #[error("workspace '{workspace}': unknown operation '{operation}'")]
  UnknownOperation {
    workspace: String,
    operation: String,
  },

  /// The configured variable validator rejected the workspace's merged
  /// variables.
  #[error("variable validation failed for workspace '{workspace}':\n{report}")]
  VarsRejected { workspace: String, report: String },

  /// Delivering a signal to an executor failed.
  #[error("failed to signal executor '{target}': {source}")]
  Signalling {
    target: String,
    #[source]
    source: SignalError,
  },

  /// An executor task ended without producing a result.
  #[error("executor for workspace '{workspace}' terminated abnormally")]
  ExecutorPanicked { workspace: String },

  /// The orchestration task ended without producing a result.
  #[error("orchestration task terminated abnormally")]
  OrchestrationPanicked,

  #[error("orchestration cancelled")]
  Cancelled,
}
