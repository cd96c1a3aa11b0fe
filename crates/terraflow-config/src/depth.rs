use std::collections::HashMap;

use crate::config::WorkspaceConfig;

/// Computes each workspace's depth in the dependency DAG.
///
/// Depth is the length of the longest path from any root (a workspace
/// with no dependencies) to the node; roots have depth 0. The
/// orchestrator nests a ready workspace under its deepest dependency, so
/// the executor hierarchy mirrors the longest chain leading into it.
///
/// Assumes the configuration has passed validation (acyclic, known
/// references); unknown dependency names count as roots.
pub fn calculate_depths(workspaces: &[WorkspaceConfig]) -> HashMap<String, usize> {
  let index: HashMap<&str, &WorkspaceConfig> =
    workspaces.iter().map(|ws| (ws.name.as_str(), ws)).collect();

  let mut depths: HashMap<String, usize> = HashMap::with_capacity(workspaces.len());
  for ws in workspaces {
    depth_of(&ws.name, &index, &mut depths);
  }
  depths
}

fn depth_of(
  name: &str,
  index: &HashMap<&str, &WorkspaceConfig>,
  depths: &mut HashMap<String, usize>,
) -> usize {
  if let Some(&d) = depths.get(name) {
    return d;
  }

  let depth = match index.get(name) {
    Some(ws) if !ws.depends_on.is_empty() => {
      let max_dep = ws
        .depends_on
        .iter()
        .map(|dep| depth_of(dep, index, depths))
        .max()
        .unwrap_or(0);
      max_dep + 1
    }
    _ => 0,
  };

  depths.insert(name.to_string(), depth);
  depth
}
