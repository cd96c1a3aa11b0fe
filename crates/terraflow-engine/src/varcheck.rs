//! Pre-dispatch variable validation hook.
//!
//! The engine exposes each workspace's merged variable map (file-based
//! variables plus runtime-injected extra vars) and its context to an
//! external validator before running any tool operation. The rule engine
//! behind the validator is not part of this crate; only the interface
//! ships here.

use std::fmt::Write as _;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::{Map, Value};
use terraflow_activities::parse_vars_file;
use terraflow_config::WorkspaceConfig;

use crate::error::EngineError;

/// The workspace a variable map belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceContext {
  pub name: String,
  pub kind: String,
  pub dir: PathBuf,
}

/// One finding from a validator rule.
#[derive(Debug, Clone, Serialize)]
pub struct VarsIssue {
  pub message: String,
  /// Name of the rule that produced the finding, when known.
  pub rule: Option<String>,
  /// Suggested fix, when the rule provides one.
  pub remediation: Option<String>,
}

/// Structured verdict over a workspace's merged variables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VarsVerdict {
  pub errors: Vec<VarsIssue>,
  pub warnings: Vec<VarsIssue>,
}

impl VarsVerdict {
  pub fn is_valid(&self) -> bool {
    self.errors.is_empty()
  }

  /// Human-readable report of every finding.
  pub fn report(&self) -> String {
    let mut out = String::new();
    for (label, issues) in [("error", &self.errors), ("warning", &self.warnings)] {
      for issue in issues {
        let _ = write!(out, "{label}: {}", issue.message);
        if let Some(rule) = &issue.rule {
          let _ = write!(out, " [{rule}]");
        }
        if let Some(remediation) = &issue.remediation {
          let _ = write!(out, " ({remediation})");
        }
        out.push('\n');
      }
    }
    out
  }
}

/// Validates a workspace's merged variables before dispatch.
///
/// Implementations typically evaluate a rule set; an errors-bearing
/// verdict aborts the workspace before any tool operation runs.
pub trait VarsValidator: Send + Sync {
  fn validate(&self, vars: &Map<String, Value>, ctx: &WorkspaceContext) -> VarsVerdict;
}

/// Accepts every variable map.
#[derive(Debug, Clone, Default)]
pub struct NoopVarsValidator;

impl VarsValidator for NoopVarsValidator {
  fn validate(&self, _vars: &Map<String, Value>, _ctx: &WorkspaceContext) -> VarsVerdict {
    VarsVerdict::default()
  }
}

/// Merges a workspace's variable file with its runtime-injected extra
/// vars, extra vars overriding on key collision. This is the map a
/// [`VarsValidator`] sees, and it matches what the tool will consume.
pub fn merged_workspace_vars(ws: &WorkspaceConfig) -> Result<Map<String, Value>, EngineError> {
  let mut vars = match &ws.tfvars {
    Some(path) => parse_vars_file(path).map_err(|source| EngineError::Workspace {
      workspace: ws.name.clone(),
      phase: "variables".to_string(),
      source,
    })?,
    None => Map::new(),
  };

  for (key, value) in &ws.extra_vars {
    vars.insert(key.clone(), value.clone());
  }

  Ok(vars)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn extra_vars_override_file_values() {
    let dir = std::env::temp_dir();
    let path = dir.join(format!("terraflow-varcheck-{}.tfvars.json", std::process::id()));
    std::fs::write(&path, r#"{"region":"us-east-1","count":2}"#).unwrap();

    let mut extra = Map::new();
    extra.insert("region".to_string(), json!("us-west-2"));

    let ws = WorkspaceConfig {
      name: "vpc".to_string(),
      dir: "/tmp/vpc".into(),
      tfvars: Some(path.clone()),
      extra_vars: extra,
      ..Default::default()
    };

    let vars = merged_workspace_vars(&ws).unwrap();
    assert_eq!(vars["region"], json!("us-west-2"));
    assert_eq!(vars["count"], json!(2));

    std::fs::remove_file(path).ok();
  }

  #[test]
  fn verdict_report_lists_rules_and_remediation() {
    let verdict = VarsVerdict {
      errors: vec![VarsIssue {
        message: "instance_type is not allowed".to_string(),
        rule: Some("allowed-instance-types".to_string()),
        remediation: Some("use t3.micro".to_string()),
      }],
      warnings: vec![VarsIssue {
        message: "region defaulted".to_string(),
        rule: None,
        remediation: None,
      }],
    };

    assert!(!verdict.is_valid());
    let report = verdict.report();
    assert!(report.contains("error: instance_type is not allowed [allowed-instance-types]"));
    assert!(report.contains("(use t3.micro)"));
    assert!(report.contains("warning: region defaulted"));
  }
}
