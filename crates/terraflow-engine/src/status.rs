use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle state of an orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationState {
  Running,
  Completed,
  Failed,
}

/// Queryable status of an orchestration.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationStatus {
  pub state: OrchestrationState,
  pub started_at: DateTime<Utc>,
  pub closed_at: Option<DateTime<Utc>>,
}

/// Run id → status, shared between the engine and its orchestration
/// tasks.
#[derive(Clone, Default)]
pub(crate) struct StatusRegistry {
  inner: Arc<Mutex<HashMap<String, OrchestrationStatus>>>,
}

impl StatusRegistry {
  pub fn mark_running(&self, run_id: &str) {
    self.inner.lock().unwrap().insert(
      run_id.to_string(),
      OrchestrationStatus {
        state: OrchestrationState::Running,
        started_at: Utc::now(),
        closed_at: None,
      },
    );
  }

  pub fn mark_closed(&self, run_id: &str, succeeded: bool) {
    if let Some(status) = self.inner.lock().unwrap().get_mut(run_id) {
      status.state = if succeeded {
        OrchestrationState::Completed
      } else {
        OrchestrationState::Failed
      };
      status.closed_at = Some(Utc::now());
    }
  }

  pub fn get(&self, run_id: &str) -> Option<OrchestrationStatus> {
    self.inner.lock().unwrap().get(run_id).cloned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lifecycle_transitions_are_recorded() {
    let registry = StatusRegistry::default();
    registry.mark_running("run-1");

    let status = registry.get("run-1").unwrap();
    assert_eq!(status.state, OrchestrationState::Running);
    assert!(status.closed_at.is_none());

    registry.mark_closed("run-1", true);
    let status = registry.get("run-1").unwrap();
    assert_eq!(status.state, OrchestrationState::Completed);
    assert!(status.closed_at.is_some());

    registry.mark_running("run-2");
    registry.mark_closed("run-2", false);
    assert_eq!(
      registry.get("run-2").unwrap().state,
      OrchestrationState::Failed
    );
  }

  #[test]
  fn unknown_run_id_yields_none() {
    let registry = StatusRegistry::default();
    assert!(registry.get("nope").is_none());
  }
}
