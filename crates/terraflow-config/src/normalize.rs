use std::path::{Path, PathBuf};

use crate::config::{InfrastructureConfig, default_operations};

/// Applies defaults and resolves workspace-relative paths.
///
/// - `kind` defaults to "terraform".
/// - Empty `operations` get the per-kind default sequence.
/// - Relative `dir` and `tfvars` paths are joined with `workspace_root`,
///   itself resolved against the current working directory when relative
///   or empty. Absolute paths are preserved.
pub fn normalize_config(mut cfg: InfrastructureConfig) -> InfrastructureConfig {
  let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
  let base = if cfg.workspace_root.is_empty() {
    cwd
  } else {
    let root = Path::new(&cfg.workspace_root);
    if root.is_absolute() {
      root.to_path_buf()
    } else {
      cwd.join(root)
    }
  };

  for ws in &mut cfg.workspaces {
    if ws.kind.is_empty() {
      ws.kind = "terraform".to_string();
    }
    if !ws.dir.is_absolute() {
      ws.dir = base.join(&ws.dir);
    }
    if let Some(tfvars) = ws.tfvars.take() {
      ws.tfvars = Some(if tfvars.is_absolute() {
        tfvars
      } else {
        base.join(tfvars)
      });
    }
    if ws.operations.is_empty() {
      ws.operations = default_operations(&ws.kind);
    }
  }

  cfg
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::WorkspaceConfig;

  #[test]
  fn fills_kind_and_default_operations() {
    let cfg = InfrastructureConfig {
      workspace_root: "/infra".to_string(),
      workspaces: vec![WorkspaceConfig {
        name: "vpc".to_string(),
        dir: "vpc".into(),
        ..Default::default()
      }],
    };

    let cfg = normalize_config(cfg);
    let ws = &cfg.workspaces[0];
    assert_eq!(ws.kind, "terraform");
    assert_eq!(ws.operations, vec!["init", "validate", "plan", "apply"]);
  }

  #[test]
  fn joins_relative_paths_with_workspace_root() {
    let cfg = InfrastructureConfig {
      workspace_root: "/infra".to_string(),
      workspaces: vec![WorkspaceConfig {
        name: "vpc".to_string(),
        dir: "network/vpc".into(),
        tfvars: Some("network/vpc.tfvars".into()),
        ..Default::default()
      }],
    };

    let cfg = normalize_config(cfg);
    let ws = &cfg.workspaces[0];
    assert_eq!(ws.dir, PathBuf::from("/infra/network/vpc"));
    assert_eq!(ws.tfvars, Some(PathBuf::from("/infra/network/vpc.tfvars")));
  }

  #[test]
  fn preserves_absolute_paths() {
    let cfg = InfrastructureConfig {
      workspace_root: "/infra".to_string(),
      workspaces: vec![WorkspaceConfig {
        name: "vpc".to_string(),
        dir: "/elsewhere/vpc".into(),
        tfvars: Some("/elsewhere/vpc.tfvars".into()),
        ..Default::default()
      }],
    };

    let cfg = normalize_config(cfg);
    let ws = &cfg.workspaces[0];
    assert_eq!(ws.dir, PathBuf::from("/elsewhere/vpc"));
    assert_eq!(ws.tfvars, Some(PathBuf::from("/elsewhere/vpc.tfvars")));
  }

  #[test]
  fn relative_root_is_anchored_to_cwd() {
    let cfg = InfrastructureConfig {
      workspace_root: "stacks".to_string(),
      workspaces: vec![WorkspaceConfig {
        name: "vpc".to_string(),
        dir: "vpc".into(),
        ..Default::default()
      }],
    };

    let cfg = normalize_config(cfg);
    let expected = std::env::current_dir().unwrap().join("stacks").join("vpc");
    assert_eq!(cfg.workspaces[0].dir, expected);
  }

  #[test]
  fn keeps_explicit_operations() {
    let cfg = InfrastructureConfig {
      workspace_root: "/infra".to_string(),
      workspaces: vec![WorkspaceConfig {
        name: "vpc".to_string(),
        dir: "vpc".into(),
        operations: vec!["init".into(), "validate".into(), "plan".into()],
        ..Default::default()
      }],
    };

    let cfg = normalize_config(cfg);
    assert_eq!(cfg.workspaces[0].operations, vec!["init", "validate", "plan"]);
  }
}
