use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The overall set of workspaces to orchestrate.
///
/// `workspace_root` anchors every relative `dir` and `tfvars` path; it is
/// itself resolved against the current working directory when relative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureConfig {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub workspace_root: String,
  #[serde(default)]
  pub workspaces: Vec<WorkspaceConfig>,
}

/// A single IaC run target: a directory of sources plus its metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
  /// Stable, unique identifier within a configuration.
  pub name: String,
  /// Tool selector. Empty normalizes to "terraform".
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub kind: String,
  /// Path to the IaC sources. Relative paths are joined with the
  /// configuration's `workspace_root` during normalization.
  #[serde(default)]
  pub dir: PathBuf,
  /// Optional variable file (HCL or JSON), also resolved against
  /// `workspace_root`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tfvars: Option<PathBuf>,
  /// Names of workspaces that must complete before this one starts.
  #[serde(default, rename = "dependsOn", skip_serializing_if = "Vec::is_empty")]
  pub depends_on: Vec<String>,
  /// Output→variable mappings resolved from dependency outputs at runtime.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub inputs: Vec<InputMapping>,
  /// Optional routing hint for the executor.
  #[serde(default, rename = "taskQueue", skip_serializing_if = "String::is_empty")]
  pub task_queue: String,
  /// Ordered operation sequence. Empty defaults per kind during
  /// normalization.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub operations: Vec<String>,
  /// Populated at runtime by the orchestrator from resolved input
  /// mappings. Values preserve their original JSON types (string, number,
  /// bool, array, object) to match the tool's variable types.
  #[serde(
    default,
    rename = "extraVars",
    skip_serializing_if = "serde_json::Map::is_empty"
  )]
  pub extra_vars: serde_json::Map<String, serde_json::Value>,
}

/// Maps an output of a dependency workspace to a variable in the
/// declaring workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputMapping {
  pub source_workspace: String,
  pub source_output: String,
  pub target_var: String,
}

/// The default operation sequence for a workspace kind.
///
/// Unknown kinds get an empty sequence; they are rejected by validation
/// anyway.
pub fn default_operations(kind: &str) -> Vec<String> {
  let kind = if kind.is_empty() { "terraform" } else { kind };
  match kind {
    "terraform" => ["init", "validate", "plan", "apply"]
      .iter()
      .map(|s| s.to_string())
      .collect(),
    _ => Vec::new(),
  }
}

pub(crate) fn is_supported_kind(kind: &str) -> bool {
  matches!(kind, "" | "terraform")
}
