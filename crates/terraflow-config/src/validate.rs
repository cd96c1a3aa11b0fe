//! Structural, graph, and operation-sequence validation.
//!
//! Validation is deterministic and pure so front-ends can run it before
//! handing a config to the engine. Iteration follows the declared
//! workspace order throughout.

use std::collections::HashMap;

use crate::config::{InfrastructureConfig, WorkspaceConfig, is_supported_kind};
use crate::error::ConfigError;

/// DFS coloring for cycle detection.
#[derive(Clone, Copy, PartialEq)]
enum Mark {
  Unvisited,
  OnStack,
  Finished,
}

/// Checks every invariant of an infrastructure configuration: non-empty
/// workspace list, unique non-empty names, known kinds, resolvable
/// dependency and input references, an acyclic dependency relation, and
/// well-formed operation sequences.
pub fn validate_config(cfg: &InfrastructureConfig) -> Result<(), ConfigError> {
  if cfg.workspaces.is_empty() {
    return Err(ConfigError::EmptyWorkspaces);
  }

  let mut index: HashMap<&str, &WorkspaceConfig> = HashMap::with_capacity(cfg.workspaces.len());
  for ws in &cfg.workspaces {
    if ws.name.trim().is_empty() {
      return Err(ConfigError::EmptyName);
    }
    if index.contains_key(ws.name.as_str()) {
      return Err(ConfigError::DuplicateName {
        name: ws.name.clone(),
      });
    }
    if ws.dir.as_os_str().is_empty() {
      return Err(ConfigError::MissingDir {
        workspace: ws.name.clone(),
      });
    }
    if !is_supported_kind(&ws.kind) {
      return Err(ConfigError::UnsupportedKind {
        workspace: ws.name.clone(),
        kind: ws.kind.clone(),
      });
    }
    index.insert(ws.name.as_str(), ws);
  }

  // Cycle detection. A self-edge is reported as a cycle too.
  let mut marks: HashMap<&str, Mark> = index.keys().map(|&name| (name, Mark::Unvisited)).collect();
  for ws in &cfg.workspaces {
    dfs_cycle(&ws.name, &index, &mut marks)?;
  }

  for ws in &cfg.workspaces {
    for dep in &ws.depends_on {
      if !index.contains_key(dep.as_str()) {
        return Err(ConfigError::UnknownDependency {
          workspace: ws.name.clone(),
          dependency: dep.clone(),
        });
      }
    }
    for input in &ws.inputs {
      if !index.contains_key(input.source_workspace.as_str()) {
        return Err(ConfigError::UnknownInputSource {
          workspace: ws.name.clone(),
          input_source: input.source_workspace.clone(),
        });
      }
      if !is_transitively_dependent(&ws.name, &input.source_workspace, &index) {
        return Err(ConfigError::InputSourceNotDependency {
          workspace: ws.name.clone(),
          input_source: input.source_workspace.clone(),
        });
      }
    }
  }

  for ws in &cfg.workspaces {
    validate_workspace_operations(ws)?;
  }

  Ok(())
}

fn dfs_cycle<'a>(
  name: &'a str,
  index: &HashMap<&'a str, &'a WorkspaceConfig>,
  marks: &mut HashMap<&'a str, Mark>,
) -> Result<(), ConfigError> {
  match marks.get(name) {
    Some(Mark::OnStack) => {
      return Err(ConfigError::DependencyCycle {
        workspace: name.to_string(),
      });
    }
    Some(Mark::Finished) => return Ok(()),
    _ => {}
  }
  marks.insert(name, Mark::OnStack);
  // Unknown dependency names are caught by the reference check; here they
  // simply have no outgoing edges.
  if let Some(ws) = index.get(name) {
    for dep in &ws.depends_on {
      dfs_cycle(dep, index, marks)?;
    }
  }
  marks.insert(name, Mark::Finished);
  Ok(())
}

/// Returns true if `target` depends on `source`, directly or transitively.
fn is_transitively_dependent(
  target: &str,
  source: &str,
  index: &HashMap<&str, &WorkspaceConfig>,
) -> bool {
  let Some(ws) = index.get(target) else {
    return false;
  };
  for dep in &ws.depends_on {
    if dep == source || is_transitively_dependent(dep, source, index) {
      return true;
    }
  }
  false
}

/// Validates the operation sequence of a single workspace against its kind.
///
/// For "terraform": only init/validate/plan/apply are allowed, init and
/// validate are required, and the declared order must satisfy
/// init < validate < plan < apply (for the operations present). apply
/// additionally requires plan. An empty sequence is fine; normalization
/// fills in the default.
pub fn validate_workspace_operations(ws: &WorkspaceConfig) -> Result<(), ConfigError> {
  let kind = if ws.kind.is_empty() {
    "terraform"
  } else {
    ws.kind.as_str()
  };

  if ws.operations.is_empty() {
    return Ok(());
  }

  match kind {
    "terraform" => validate_terraform_operations(&ws.name, &ws.operations),
    other => Err(ConfigError::UnsupportedKind {
      workspace: ws.name.clone(),
      kind: other.to_string(),
    }),
  }
}

fn validate_terraform_operations(name: &str, operations: &[String]) -> Result<(), ConfigError> {
  let position = |op: &str| operations.iter().position(|o| o == op);

  for op in operations {
    if !matches!(op.as_str(), "init" | "validate" | "plan" | "apply") {
      return Err(ConfigError::UnknownOperation {
        workspace: name.to_string(),
        operation: op.clone(),
      });
    }
  }

  let init = position("init").ok_or(ConfigError::MissingOperation {
    workspace: name.to_string(),
    operation: "init",
  })?;
  let validate = position("validate").ok_or(ConfigError::MissingOperation {
    workspace: name.to_string(),
    operation: "validate",
  })?;

  if validate < init {
    return Err(ConfigError::OperationOrder {
      workspace: name.to_string(),
      operation: "validate",
      after: "init",
    });
  }

  let plan = position("plan");
  if let Some(plan) = plan {
    if plan < validate {
      return Err(ConfigError::OperationOrder {
        workspace: name.to_string(),
        operation: "plan",
        after: "validate",
      });
    }
  }

  if let Some(apply) = position("apply") {
    let Some(plan) = plan else {
      return Err(ConfigError::ApplyWithoutPlan {
        workspace: name.to_string(),
      });
    };
    if apply < plan {
      return Err(ConfigError::OperationOrder {
        workspace: name.to_string(),
        operation: "apply",
        after: "plan",
      });
    }
  }

  Ok(())
}
