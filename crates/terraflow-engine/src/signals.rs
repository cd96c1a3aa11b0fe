//! Signals exchanged between the orchestrator and executors.
//!
//! Every running executor registers its inbound channels under its
//! executor id; the orchestrator delivers `start-child` and `shutdown`
//! through the registry, and executors report back on the shared
//! `workspace-finished` channel. Payloads are immutable once sent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use terraflow_config::WorkspaceConfig;
use thiserror::Error;
use tokio::sync::mpsc;

pub const SIGNAL_START_CHILD: &str = "start-child";
pub const SIGNAL_WORKSPACE_FINISHED: &str = "workspace-finished";
pub const SIGNAL_SHUTDOWN: &str = "shutdown";

/// Asks a hosting executor to spawn a nested executor for a workspace
/// whose `extra_vars` have already been resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartChildSignal {
  pub workspace: WorkspaceConfig,
}

/// Reports a workspace's completion, carrying its captured outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceFinishedSignal {
  pub name: String,
  pub outputs: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum SignalError {
  #[error("no executor registered under id '{0}'")]
  NotRegistered(String),
  #[error("executor '{0}' is no longer receiving signals")]
  Closed(String),
}

/// Inbound channels of one running executor.
pub(crate) struct ExecutorChannels {
  pub start_child: mpsc::UnboundedSender<StartChildSignal>,
  pub shutdown: mpsc::UnboundedSender<()>,
}

/// Executor id → inbound channels for one orchestration.
#[derive(Clone, Default)]
pub(crate) struct SignalRegistry {
  inner: Arc<Mutex<HashMap<String, ExecutorChannels>>>,
}

impl SignalRegistry {
  pub fn register(&self, executor_id: &str, channels: ExecutorChannels) {
    self
      .inner
      .lock()
      .unwrap()
      .insert(executor_id.to_string(), channels);
  }

  pub fn unregister(&self, executor_id: &str) {
    self.inner.lock().unwrap().remove(executor_id);
  }

  pub fn start_child(
    &self,
    executor_id: &str,
    signal: StartChildSignal,
  ) -> Result<(), SignalError> {
    let inner = self.inner.lock().unwrap();
    let channels = inner
      .get(executor_id)
      .ok_or_else(|| SignalError::NotRegistered(executor_id.to_string()))?;
    channels
      .start_child
      .send(signal)
      .map_err(|_| SignalError::Closed(executor_id.to_string()))
  }

  pub fn shutdown(&self, executor_id: &str) -> Result<(), SignalError> {
    let inner = self.inner.lock().unwrap();
    let channels = inner
      .get(executor_id)
      .ok_or_else(|| SignalError::NotRegistered(executor_id.to_string()))?;
    channels
      .shutdown
      .send(())
      .map_err(|_| SignalError::Closed(executor_id.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn signalling_an_unknown_executor_fails() {
    let registry = SignalRegistry::default();
    let err = registry.shutdown("iac-run-missing").unwrap_err();
    assert!(matches!(err, SignalError::NotRegistered(_)));
  }

  #[tokio::test]
  async fn registered_channels_deliver_signals() {
    let registry = SignalRegistry::default();
    let (child_tx, mut child_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel();
    registry.register(
      "iac-run-vpc",
      ExecutorChannels {
        start_child: child_tx,
        shutdown: shutdown_tx,
      },
    );

    registry
      .start_child(
        "iac-run-vpc",
        StartChildSignal {
          workspace: WorkspaceConfig {
            name: "subnets".to_string(),
            dir: "/tmp/subnets".into(),
            ..Default::default()
          },
        },
      )
      .unwrap();
    registry.shutdown("iac-run-vpc").unwrap();

    assert_eq!(child_rx.recv().await.unwrap().workspace.name, "subnets");
    assert!(shutdown_rx.recv().await.is_some());
  }

  #[tokio::test]
  async fn unregistering_closes_delivery() {
    let registry = SignalRegistry::default();
    let (child_tx, _child_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, _shutdown_rx) = mpsc::unbounded_channel();
    registry.register(
      "iac-run-vpc",
      ExecutorChannels {
        start_child: child_tx,
        shutdown: shutdown_tx,
      },
    );
    registry.unregister("iac-run-vpc");

    assert!(matches!(
      registry.shutdown("iac-run-vpc"),
      Err(SignalError::NotRegistered(_))
    ));
  }
}
