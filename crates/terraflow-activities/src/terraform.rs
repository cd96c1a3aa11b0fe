//! Terraform CLI invocation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::error::ActivityError;
use crate::tfvars::combine_tfvars;
use crate::{ActivityParams, IacActivities};

/// Wall-clock budget for a single CLI invocation inside the wrapper. The
/// engine applies its own (longer) bound and the retry policy on top.
const TOOL_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs the real `terraform` binary against a workspace directory.
///
/// Any binary honouring the same subcommand contract works; tests point
/// [`TerraformActivities::with_binary`] at a stub script.
pub struct TerraformActivities {
  binary: String,
}

impl Default for TerraformActivities {
  fn default() -> Self {
    Self::new()
  }
}

impl TerraformActivities {
  /// Uses the `terraform` binary resolved from the process search path.
  pub fn new() -> Self {
    Self::with_binary("terraform")
  }

  /// Uses an explicit binary path instead of `terraform`.
  pub fn with_binary(binary: impl Into<String>) -> Self {
    Self {
      binary: binary.into(),
    }
  }

  fn check_preconditions(params: &ActivityParams) -> Result<(), ActivityError> {
    if params.dir.as_os_str().is_empty() {
      return Err(ActivityError::MissingDir);
    }
    if !params.dir.is_dir() {
      return Err(ActivityError::InvalidDir {
        path: params.dir.clone(),
      });
    }
    if let Some(tfvars) = &params.tfvars {
      if !tfvars.is_file() {
        return Err(ActivityError::InvalidTfvars {
          path: tfvars.clone(),
        });
      }
    }
    Ok(())
  }

  /// Spawns the tool and waits for it under the wrapper's wall-clock
  /// budget.
  async fn exec(
    &self,
    operation: &str,
    dir: &Path,
    args: &[String],
  ) -> Result<Output, ActivityError> {
    debug!(operation, args = ?args, dir = %dir.display(), "invoking terraform");

    let child = Command::new(&self.binary)
      .args(args)
      .current_dir(dir)
      .kill_on_drop(true)
      .output();

    match tokio::time::timeout(TOOL_TIMEOUT, child).await {
      Ok(result) => Ok(result?),
      Err(_) => Err(ActivityError::Timeout {
        operation: operation.to_string(),
        seconds: TOOL_TIMEOUT.as_secs(),
      }),
    }
  }

  /// Runs an operation that only distinguishes success from failure.
  async fn run_tool(
    &self,
    operation: &str,
    dir: &Path,
    args: &[String],
  ) -> Result<(), ActivityError> {
    let output = self.exec(operation, dir, args).await?;
    if !output.status.success() {
      return Err(tool_failed(operation, &output));
    }
    Ok(())
  }
}

#[async_trait]
impl IacActivities for TerraformActivities {
  async fn init(&self, params: &ActivityParams) -> Result<(), ActivityError> {
    Self::check_preconditions(params)?;
    self
      .run_tool("init", &params.dir, &["init".to_string()])
      .await
  }

  async fn validate(&self, params: &ActivityParams) -> Result<(), ActivityError> {
    Self::check_preconditions(params)?;
    self
      .run_tool("validate", &params.dir, &["validate".to_string()])
      .await
  }

  #[instrument(skip(self, params), fields(dir = %params.dir.display()))]
  async fn plan(&self, params: &ActivityParams) -> Result<bool, ActivityError> {
    Self::check_preconditions(params)?;

    let var_file = combine_tfvars(params).await?;
    let plan_path = plan_full_path(params);

    let mut args = vec![
      "plan".to_string(),
      "-no-color".to_string(),
      "-out".to_string(),
      plan_path.display().to_string(),
      "-detailed-exitcode".to_string(),
    ];
    if let Some(var_file) = var_file {
      args.push("-var-file".to_string());
      args.push(var_file.display().to_string());
    }

    let output = self.exec("plan", &params.dir, &args).await?;

    // Detailed exit code: 0 = no changes, 2 = changes present; both are
    // success and both must leave a plan artifact behind for apply.
    match output.status.code() {
      Some(0) => {
        ensure_plan_file(&plan_path).await?;
        info!(plan = %plan_path.display(), "plan reported no changes");
        Ok(false)
      }
      Some(2) => {
        ensure_plan_file(&plan_path).await?;
        info!(plan = %plan_path.display(), "plan reported pending changes");
        Ok(true)
      }
      _ => Err(tool_failed("plan", &output)),
    }
  }

  async fn apply(&self, params: &ActivityParams) -> Result<(), ActivityError> {
    Self::check_preconditions(params)?;

    let plan_path = plan_full_path(params);
    if !plan_path.is_file() {
      return Err(ActivityError::PlanFileMissing { path: plan_path });
    }

    let args = vec![
      "apply".to_string(),
      "-no-color".to_string(),
      plan_path.display().to_string(),
    ];
    self.run_tool("apply", &params.dir, &args).await
  }

  async fn output(&self, params: &ActivityParams) -> Result<Map<String, Value>, ActivityError> {
    Self::check_preconditions(params)?;

    let args = vec!["output".to_string(), "-json".to_string()];
    let output = self.exec("output", &params.dir, &args).await?;
    if !output.status.success() {
      return Err(tool_failed("output", &output));
    }

    // The tool wraps every output in `{"value": V, ...}`; flatten to the
    // bare value, preserving its JSON type.
    #[derive(Deserialize)]
    struct OutputEntry {
      value: Value,
    }

    let raw: HashMap<String, OutputEntry> =
      serde_json::from_slice(&output.stdout).map_err(ActivityError::MalformedOutput)?;

    let mut results = Map::new();
    for (name, entry) in raw {
      results.insert(name, entry.value);
    }
    Ok(results)
  }
}

fn tool_failed(operation: &str, output: &Output) -> ActivityError {
  let code = output
    .status
    .code()
    .map(|c| c.to_string())
    .unwrap_or_else(|| "terminated by signal".to_string());
  ActivityError::ToolFailed {
    operation: operation.to_string(),
    code,
    output: combined_output(output),
  }
}

fn combined_output(output: &Output) -> String {
  let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
  let stderr = String::from_utf8_lossy(&output.stderr);
  if !stderr.is_empty() {
    if !combined.is_empty() {
      combined.push('\n');
    }
    combined.push_str(&stderr);
  }
  combined
}

/// Basename of the plan artifact; path components are stripped and an
/// empty name falls back to "tfplan".
fn plan_file_name(params: &ActivityParams) -> String {
  let trimmed = params.plan_file.trim();
  if trimmed.is_empty() {
    return "tfplan".to_string();
  }
  Path::new(trimmed)
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| "tfplan".to_string())
}

fn plan_full_path(params: &ActivityParams) -> PathBuf {
  params.dir.join(plan_file_name(params))
}

/// Guarantees the plan artifact exists after a successful plan, creating
/// an empty placeholder if the tool omitted it, so apply can key on its
/// presence.
async fn ensure_plan_file(path: &Path) -> Result<(), ActivityError> {
  match tokio::fs::metadata(path).await {
    Ok(_) => Ok(()),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      tokio::fs::write(path, []).await?;
      Ok(())
    }
    Err(e) => Err(e.into()),
  }
}
