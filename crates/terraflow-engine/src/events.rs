//! Orchestration events and notifiers for observability.
//!
//! Events are emitted as workspaces progress so consumers can observe
//! runs, persist state, or stream to UIs.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during an orchestration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrchestrationEvent {
  OrchestrationStarted {
    run_id: String,
    workspaces: usize,
  },

  WorkspaceStarted {
    run_id: String,
    workspace: String,
  },

  WorkspaceCompleted {
    run_id: String,
    workspace: String,
    outputs: serde_json::Map<String, serde_json::Value>,
  },

  WorkspaceFailed {
    run_id: String,
    workspace: String,
    error: String,
  },

  OrchestrationCompleted {
    run_id: String,
  },

  OrchestrationFailed {
    run_id: String,
    error: String,
  },
}

/// Trait for receiving orchestration events.
///
/// The engine calls `notify` for each event; implementations decide what
/// to do with them (persist, broadcast, log, ignore).
pub trait EventNotifier: Send + Sync {
  fn notify(&self, event: OrchestrationEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl EventNotifier for NoopNotifier {
  fn notify(&self, _event: OrchestrationEvent) {
    // Intentionally empty
  }
}

/// A notifier that forwards events to an unbounded channel.
///
/// Unbounded so a slow consumer never stalls the engine; event volume is
/// a handful per workspace.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<OrchestrationEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<OrchestrationEvent>) -> Self {
    Self { sender }
  }
}

impl EventNotifier for ChannelNotifier {
  fn notify(&self, event: OrchestrationEvent) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
