use std::path::Path;

use crate::config::InfrastructureConfig;
use crate::error::ConfigError;

/// Reads and parses an infrastructure configuration file.
///
/// `.yaml`/`.yml` files are parsed as YAML, `.json` as JSON; files with
/// any other (or no) extension are tried as JSON.
pub fn load_config(path: impl AsRef<Path>) -> Result<InfrastructureConfig, ConfigError> {
  let path = path.as_ref();
  let body = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
    path: path.to_path_buf(),
    source,
  })?;

  let ext = path
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| e.to_ascii_lowercase());

  match ext.as_deref() {
    Some("yaml") | Some("yml") => serde_yaml::from_str(&body).map_err(ConfigError::InvalidYaml),
    _ => serde_json::from_str(&body).map_err(ConfigError::InvalidJson),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  fn write_temp(name: &str, contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    (dir, path)
  }

  #[test]
  fn loads_yaml_config() {
    let (_dir, path) = write_temp(
      "infra.yaml",
      r#"
workspace_root: /infra
workspaces:
  - name: vpc
    dir: vpc
  - name: subnets
    dir: subnets
    dependsOn: [vpc]
    inputs:
      - sourceWorkspace: vpc
        sourceOutput: vpc_id
        targetVar: vpc_id
"#,
    );

    let cfg = load_config(&path).unwrap();
    assert_eq!(cfg.workspace_root, "/infra");
    assert_eq!(cfg.workspaces.len(), 2);
    assert_eq!(cfg.workspaces[1].depends_on, vec!["vpc"]);
    assert_eq!(cfg.workspaces[1].inputs[0].source_output, "vpc_id");
  }

  #[test]
  fn loads_json_config() {
    let (_dir, path) = write_temp(
      "infra.json",
      r#"{
        "workspace_root": "/infra",
        "workspaces": [
          {"name": "vpc", "dir": "vpc", "taskQueue": "net-queue"}
        ]
      }"#,
    );

    let cfg = load_config(&path).unwrap();
    assert_eq!(cfg.workspaces[0].task_queue, "net-queue");
  }

  #[test]
  fn unknown_extension_falls_back_to_json() {
    let (_dir, path) = write_temp(
      "infra.conf",
      r#"{"workspaces": [{"name": "vpc", "dir": "vpc"}]}"#,
    );

    let cfg = load_config(&path).unwrap();
    assert_eq!(cfg.workspaces[0].name, "vpc");
  }

  #[test]
  fn missing_file_reports_read_error() {
    let err = load_config("/definitely/not/here.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
  }

  #[test]
  fn invalid_yaml_reports_parse_error() {
    let (_dir, path) = write_temp("infra.yaml", "workspaces: [not: [valid");
    let err = load_config(&path).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidYaml(_)));
  }
}
