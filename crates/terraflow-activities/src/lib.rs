//! Terraflow Activities
//!
//! Side-effecting operations against a single workspace directory: the
//! five Terraform CLI invocations (init, validate, plan, apply, output)
//! behind the [`IacActivities`] trait, the variable merger that combines
//! file-based variables with runtime-injected values, and the retry
//! policy the engine applies around each activity.
//!
//! The trait is the seam the engine's tests mock; [`TerraformActivities`]
//! is the real implementation that shells out to the `terraform` binary
//! (or any binary honouring the same subcommand contract).

mod error;
mod retry;
mod terraform;
mod tfvars;

use std::path::PathBuf;

use async_trait::async_trait;

pub use error::ActivityError;
pub use retry::{RetryPolicy, with_retry};
pub use terraform::TerraformActivities;
pub use tfvars::{combine_tfvars, parse_vars_file};

/// Parameters for one activity invocation against a workspace.
#[derive(Debug, Clone, Default)]
pub struct ActivityParams {
  /// Directory containing the IaC sources. Must exist.
  pub dir: PathBuf,
  /// Optional variable file. Must exist when set.
  pub tfvars: Option<PathBuf>,
  /// Basename of the plan artifact written into `dir` by plan and
  /// consumed by apply. Empty falls back to "tfplan".
  pub plan_file: String,
  /// Runtime-injected variables, merged over the file by the variable
  /// merger. Values preserve their JSON types.
  pub vars: serde_json::Map<String, serde_json::Value>,
  /// Identifier of the orchestration run, used to name the per-run
  /// scratch directory for combined variable files.
  pub run_id: String,
}

/// The five retriable operations the executor drives against a workspace.
#[async_trait]
pub trait IacActivities: Send + Sync {
  /// Prepare the workspace (`terraform init`).
  async fn init(&self, params: &ActivityParams) -> Result<(), ActivityError>;

  /// Statically validate the sources (`terraform validate`).
  async fn validate(&self, params: &ActivityParams) -> Result<(), ActivityError>;

  /// Produce a plan artifact and report whether changes are pending.
  ///
  /// Uses the tool's detailed exit code: 0 means no changes, 2 means
  /// changes present; both are success. On success the plan artifact is
  /// guaranteed to exist on disk.
  async fn plan(&self, params: &ActivityParams) -> Result<bool, ActivityError>;

  /// Apply the plan artifact produced by [`IacActivities::plan`].
  async fn apply(&self, params: &ActivityParams) -> Result<(), ActivityError>;

  /// Read the tool's JSON outputs, unwrapping each `{"value": V}`
  /// envelope to the bare value.
  async fn output(
    &self,
    params: &ActivityParams,
  ) -> Result<serde_json::Map<String, serde_json::Value>, ActivityError>;
}
