use std::path::PathBuf;

use thiserror::Error;

/// Broad classification of configuration errors, used by front-ends to
/// map failures to exit codes and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorCategory {
  /// Empty lists, empty fields, duplicates, unsupported kinds, load failures.
  Structural,
  /// Cycles, unknown references, non-transitive input sources.
  Graph,
  /// Malformed operation sequences.
  Operations,
}

/// Errors produced by configuration loading and validation.
///
/// Every variant maps to a stable [`ConfigErrorCategory`]; validation is
/// deterministic, so the same config always fails with the same variant.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("no workspaces defined")]
  EmptyWorkspaces,

  #[error("workspace name cannot be empty")]
  EmptyName,

  #[error("workspace '{workspace}' missing dir")]
  MissingDir { workspace: String },

  #[error("duplicate workspace name: {name}")]
  DuplicateName { name: String },

  #[error("unsupported kind '{kind}' for workspace '{workspace}'")]
  UnsupportedKind { workspace: String, kind: String },

  #[error("workspace '{workspace}' depends on unknown workspace '{dependency}'")]
  UnknownDependency {
    workspace: String,
    dependency: String,
  },

  #[error("dependency cycle detected at workspace '{workspace}'")]
  DependencyCycle { workspace: String },

  #[error("workspace '{workspace}' input mapping source '{input_source}' not found")]
  UnknownInputSource {
    workspace: String,
    input_source: String,
  },

  #[error(
    "workspace '{workspace}' must depend (directly or transitively) on '{input_source}' to map its outputs"
  )]
  InputSourceNotDependency {
    workspace: String,
    input_source: String,
  },

  #[error("workspace '{workspace}': unknown operation '{operation}' for kind 'terraform'")]
  UnknownOperation {
    workspace: String,
    operation: String,
  },

  #[error("workspace '{workspace}': operation '{operation}' is required for kind 'terraform'")]
  MissingOperation {
    workspace: String,
    operation: &'static str,
  },

  #[error("workspace '{workspace}': operation '{operation}' must come after '{after}'")]
  OperationOrder {
    workspace: String,
    operation: &'static str,
    after: &'static str,
  },

  #[error("workspace '{workspace}': operation 'apply' requires 'plan' to be present")]
  ApplyWithoutPlan { workspace: String },

  #[error("failed to read config file {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid YAML config: {0}")]
  InvalidYaml(#[source] serde_yaml::Error),

  #[error("invalid config format (expected YAML or JSON): {0}")]
  InvalidJson(#[source] serde_json::Error),
}

impl ConfigError {
  /// The stable category of this error.
  pub fn category(&self) -> ConfigErrorCategory {
    match self {
      ConfigError::EmptyWorkspaces
      | ConfigError::EmptyName
      | ConfigError::MissingDir { .. }
      | ConfigError::DuplicateName { .. }
      | ConfigError::UnsupportedKind { .. }
      | ConfigError::Read { .. }
      | ConfigError::InvalidYaml(_)
      | ConfigError::InvalidJson(_) => ConfigErrorCategory::Structural,

      ConfigError::UnknownDependency { .. }
      | ConfigError::DependencyCycle { .. }
      | ConfigError::UnknownInputSource { .. }
      | ConfigError::InputSourceNotDependency { .. } => ConfigErrorCategory::Graph,

      ConfigError::UnknownOperation { .. }
      | ConfigError::MissingOperation { .. }
      | ConfigError::OperationOrder { .. }
      | ConfigError::ApplyWithoutPlan { .. } => ConfigErrorCategory::Operations,
    }
  }
}
