use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

/// Mutable state of one orchestration, owned exclusively by the
/// orchestration task. Executors never touch it; everything they learn
/// arrives via signals.
#[derive(Default)]
pub(crate) struct RunState {
  /// Workspaces that have signalled completion.
  pub completed: HashSet<String>,
  /// Captured outputs per completed workspace. Written exactly once, on
  /// the completion signal.
  pub outputs: HashMap<String, Map<String, Value>>,
  /// Workspace name → executor id for every dispatched workspace.
  /// Entries are never removed; completed executors keep hosting until
  /// shutdown.
  pub running: HashMap<String, String>,
}

impl RunState {
  pub fn new() -> Self {
    Self::default()
  }
}
