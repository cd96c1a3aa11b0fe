use std::path::PathBuf;

use thiserror::Error;

/// Errors from activity execution against a workspace directory.
#[derive(Debug, Error)]
pub enum ActivityError {
  #[error("workspace dir is required")]
  MissingDir,

  #[error("workspace dir invalid: {}", path.display())]
  InvalidDir { path: PathBuf },

  #[error("tfvars file invalid: {}", path.display())]
  InvalidTfvars { path: PathBuf },

  /// Non-zero tool exit (other than plan's exit 2). The tool's combined
  /// stdout/stderr is carried verbatim.
  #[error("terraform {operation} failed ({code}): {output}")]
  ToolFailed {
    operation: String,
    code: String,
    output: String,
  },

  #[error("terraform {operation} timed out after {seconds}s")]
  Timeout { operation: String, seconds: u64 },

  #[error("plan file not found for apply: {}", path.display())]
  PlanFileMissing { path: PathBuf },

  #[error("failed to parse terraform output: {0}")]
  MalformedOutput(#[source] serde_json::Error),

  #[error("failed to parse tfvars file {}: {message}", path.display())]
  TfvarsParse { path: PathBuf, message: String },

  #[error(transparent)]
  Io(#[from] std::io::Error),
}

impl ActivityError {
  /// Whether retrying the activity can plausibly succeed.
  ///
  /// Tool failures, timeouts, and I/O errors are transient; precondition
  /// violations, a missing plan artifact, and malformed JSON are not.
  pub fn is_transient(&self) -> bool {
    matches!(
      self,
      ActivityError::ToolFailed { .. } | ActivityError::Timeout { .. } | ActivityError::Io(_)
    )
  }
}
