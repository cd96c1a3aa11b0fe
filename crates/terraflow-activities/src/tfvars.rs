//! Variable merging.
//!
//! Combines a workspace's variable file with runtime-injected values into
//! a single JSON variable file the tool can consume. JSON is the only
//! format in which string, number, bool, array, object, and null all
//! survive round-tripping losslessly, so the combined file is always
//! written as `.tfvars.json`.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::ActivityParams;
use crate::error::ActivityError;

/// Parses a variable file into a JSON-typed dictionary.
///
/// Files with a `.json` extension are parsed as JSON; anything else is
/// parsed as HCL, with top-level attributes lowered into JSON-equivalent
/// values (string, number, bool, list/tuple/set → array, map/object →
/// object, null).
pub fn parse_vars_file(path: &Path) -> Result<Map<String, Value>, ActivityError> {
  let body = std::fs::read_to_string(path)?;

  let is_json = path
    .extension()
    .and_then(|e| e.to_str())
    .is_some_and(|e| e.eq_ignore_ascii_case("json"));

  if is_json {
    serde_json::from_str(&body).map_err(|e| ActivityError::TfvarsParse {
      path: path.to_path_buf(),
      message: e.to_string(),
    })
  } else {
    hcl::from_str(&body).map_err(|e| ActivityError::TfvarsParse {
      path: path.to_path_buf(),
      message: e.to_string(),
    })
  }
}

/// Produces the variable file to pass to the tool, merging the original
/// tfvars file with the runtime variables.
///
/// With no runtime variables the original file path is passed through
/// unchanged (possibly `None`). Otherwise the file's variables are loaded
/// and the runtime map is merged over them, overriding on key collision;
/// the combined dictionary is written as indented JSON under the per-run
/// scratch directory and that path is returned.
pub async fn combine_tfvars(params: &ActivityParams) -> Result<Option<PathBuf>, ActivityError> {
  if params.vars.is_empty() {
    return Ok(params.tfvars.clone());
  }

  let mut variables = match &params.tfvars {
    Some(path) => parse_vars_file(path)?,
    None => Map::new(),
  };

  for (key, value) in &params.vars {
    variables.insert(key.clone(), value.clone());
  }

  let scratch = std::env::temp_dir().join("terraflow").join(&params.run_id);
  tokio::fs::create_dir_all(&scratch).await?;

  // Keyed by the workspace directory so concurrent workspaces in the
  // same run never clobber each other's combined file.
  let workspace = params
    .dir
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| "workspace".to_string());
  let combined = scratch.join(format!("{workspace}.combined.tfvars.json"));
  let json = serde_json::to_string_pretty(&Value::Object(variables))
    .map_err(ActivityError::MalformedOutput)?;
  tokio::fs::write(&combined, json).await?;

  Ok(Some(combined))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::io::Write;

  fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
  }

  fn params(tfvars: Option<PathBuf>, vars: Map<String, Value>, run_id: &str) -> ActivityParams {
    ActivityParams {
      dir: "/tmp".into(),
      tfvars,
      plan_file: String::new(),
      vars,
      run_id: format!("{run_id}-{}", std::process::id()),
    }
  }

  #[tokio::test]
  async fn passes_file_through_when_no_runtime_vars() {
    let dir = tempfile::tempdir().unwrap();
    let tfvars = write_file(&dir, "base.tfvars", "region = \"us-west-2\"\n");

    let combined = combine_tfvars(&params(Some(tfvars.clone()), Map::new(), "passthrough"))
      .await
      .unwrap();
    assert_eq!(combined, Some(tfvars));
  }

  #[tokio::test]
  async fn returns_none_when_nothing_to_merge() {
    let combined = combine_tfvars(&params(None, Map::new(), "empty")).await.unwrap();
    assert_eq!(combined, None);
  }

  #[tokio::test]
  async fn json_types_survive_the_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let tfvars = write_file(
      &dir,
      "base.tfvars.json",
      r#"{"a":"s","b":1,"c":true,"d":[1,2],"e":{"k":"v"},"f":null}"#,
    );

    let mut vars = Map::new();
    vars.insert("extra".to_string(), json!("x"));

    let combined = combine_tfvars(&params(Some(tfvars), vars, "round-trip"))
      .await
      .unwrap()
      .unwrap();
    let merged: Value =
      serde_json::from_str(&std::fs::read_to_string(&combined).unwrap()).unwrap();

    assert_eq!(merged["a"], json!("s"));
    assert_eq!(merged["b"], json!(1));
    assert_eq!(merged["c"], json!(true));
    assert_eq!(merged["d"], json!([1, 2]));
    assert_eq!(merged["e"], json!({"k": "v"}));
    assert_eq!(merged["f"], Value::Null);
  }

  #[tokio::test]
  async fn runtime_vars_override_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let tfvars = write_file(&dir, "base.tfvars.json", r#"{"a":"s","b":1}"#);

    let mut vars = Map::new();
    vars.insert("a".to_string(), json!("s2"));

    let combined = combine_tfvars(&params(Some(tfvars), vars, "override"))
      .await
      .unwrap()
      .unwrap();
    let merged: Value =
      serde_json::from_str(&std::fs::read_to_string(&combined).unwrap()).unwrap();

    assert_eq!(merged["a"], json!("s2"));
    assert_eq!(merged["b"], json!(1));
  }

  #[tokio::test]
  async fn hcl_attributes_are_lowered_to_json_types() {
    let dir = tempfile::tempdir().unwrap();
    let tfvars = write_file(
      &dir,
      "base.tfvars",
      r#"
region = "us-west-2"
count = 3
enabled = true
zones = ["a", "b"]
tags = { team = "infra" }
"#,
    );

    let mut vars = Map::new();
    vars.insert("injected".to_string(), json!(["x", "y"]));

    let combined = combine_tfvars(&params(Some(tfvars), vars, "hcl"))
      .await
      .unwrap()
      .unwrap();
    let merged: Value =
      serde_json::from_str(&std::fs::read_to_string(&combined).unwrap()).unwrap();

    assert_eq!(merged["region"], json!("us-west-2"));
    assert_eq!(merged["count"], json!(3));
    assert_eq!(merged["enabled"], json!(true));
    assert_eq!(merged["zones"], json!(["a", "b"]));
    assert_eq!(merged["tags"], json!({"team": "infra"}));
    assert_eq!(merged["injected"], json!(["x", "y"]));
  }

  #[test]
  fn unparseable_tfvars_reports_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let tfvars = write_file(&dir, "bad.tfvars", "region = [unterminated\n");

    let err = parse_vars_file(&tfvars).unwrap_err();
    assert!(matches!(err, ActivityError::TfvarsParse { .. }));
    assert!(err.to_string().contains("bad.tfvars"));
  }
}
