//! Terraflow Engine
//!
//! The control plane for multi-workspace IaC runs: an orchestrator that
//! schedules workspaces against their dependency DAG and a per-workspace
//! executor that drives the tool's operation sequence.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                              │
//! │  - start(config) → OrchestrationHandle                      │
//! │  - status(run_id) → OrchestrationStatus                     │
//! │  - execute_workspace(ws) for standalone runs                │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Orchestration                          │
//! │  - validates + normalizes the config, computes depths       │
//! │  - launches root executors, routes workspace-finished       │
//! │  - resolves outputs into dependents' extra vars             │
//! │  - picks the deepest completed dependency as each           │
//! │    dependent's host, falls back to a new root on failure    │
//! │  - broadcasts shutdown, awaits every root future            │
//! └─────────────────────────────────────────────────────────────┘
//!                               │ start-child / shutdown signals
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkspaceRun                           │
//! │  - init / validate / plan / apply per the operation list    │
//! │  - plan's detailed exit code gates apply                    │
//! │  - always captures outputs, signals workspace-finished      │
//! │  - hosts dependent executors until shutdown                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Executors and the orchestrator exchange nothing but signals carrying
//! immutable payloads; the run state lives exclusively inside the
//! orchestration task.

mod engine;
mod error;
mod events;
mod executor;
mod orchestrator;
mod signals;
mod state;
mod status;
mod varcheck;

pub use engine::{Engine, OrchestrationHandle, OrchestrationOutcome};
pub use error::EngineError;
pub use events::{ChannelNotifier, EventNotifier, NoopNotifier, OrchestrationEvent};
pub use signals::{
  SIGNAL_SHUTDOWN, SIGNAL_START_CHILD, SIGNAL_WORKSPACE_FINISHED, SignalError, StartChildSignal,
  WorkspaceFinishedSignal,
};
pub use status::{OrchestrationState, OrchestrationStatus};
pub use varcheck::{
  NoopVarsValidator, VarsIssue, VarsValidator, VarsVerdict, WorkspaceContext,
  merged_workspace_vars,
};
