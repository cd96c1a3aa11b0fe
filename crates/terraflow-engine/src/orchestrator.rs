//! The orchestration control loop.
//!
//! One `Orchestration` instance per run: it validates and normalizes the
//! configuration, launches root executors, routes completion signals,
//! resolves outputs into dependents' extra vars, nests each dependent
//! under its deepest completed dependency, and coordinates shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use terraflow_config::{InfrastructureConfig, WorkspaceConfig, calculate_depths, normalize_config, validate_config};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::engine::OrchestrationOutcome;
use crate::error::EngineError;
use crate::events::{EventNotifier, OrchestrationEvent};
use crate::executor::{ExecutorEnv, ExecutorResult, spawn_executor};
use crate::signals::{SIGNAL_SHUTDOWN, StartChildSignal, WorkspaceFinishedSignal};
use crate::state::RunState;

/// A root executor future tagged with its workspace name.
type RootFuture = BoxFuture<'static, (String, Result<ExecutorResult, JoinError>)>;

pub(crate) struct Orchestration<N> {
  pub env: Arc<ExecutorEnv<N>>,
  pub config: InfrastructureConfig,
  pub run_id: String,
  pub cancel: CancellationToken,
  pub finished_rx: mpsc::UnboundedReceiver<WorkspaceFinishedSignal>,
}

impl<N> Orchestration<N>
where
  N: EventNotifier + Send + Sync + 'static,
{
  #[instrument(name = "orchestration", skip(self), fields(run_id = %self.run_id))]
  pub async fn run(mut self) -> Result<OrchestrationOutcome, EngineError> {
    validate_config(&self.config)?;
    let config = normalize_config(std::mem::take(&mut self.config));

    info!(workspaces = config.workspaces.len(), "starting orchestration");
    self
      .env
      .notifier
      .notify(OrchestrationEvent::OrchestrationStarted {
        run_id: self.run_id.clone(),
        workspaces: config.workspaces.len(),
      });

    let depths = calculate_depths(&config.workspaces);
    let mut state = RunState::new();
    let mut root_futures: FuturesUnordered<RootFuture> = FuturesUnordered::new();

    // Workspaces with no dependencies start immediately as roots.
    for ws in &config.workspaces {
      if ws.depends_on.is_empty() {
        self.launch_root(ws.clone(), &mut state, &mut root_futures);
      }
    }

    let total = config.workspaces.len();
    let mut first_err: Option<EngineError> = None;

    // Completion loop: each finished signal may make dependents ready.
    // Root futures are also watched so an executor that fails without
    // ever signalling completion terminates the orchestration instead of
    // stalling it.
    while state.completed.len() < total {
      tokio::select! {
        _ = self.cancel.cancelled() => {
          warn!("orchestration cancelled");
          first_err.get_or_insert(EngineError::Cancelled);
          break;
        }
        Some(signal) = self.finished_rx.recv() => {
          info!(workspace = %signal.name, "workspace completed");
          state.completed.insert(signal.name.clone());
          state.outputs.insert(signal.name, signal.outputs);

          for ws in &config.workspaces {
            if state.completed.contains(&ws.name) || state.running.contains_key(&ws.name) {
              continue;
            }
            if ws.depends_on.iter().all(|dep| state.completed.contains(dep)) {
              self.start_workspace(ws.clone(), &depths, &mut state, &mut root_futures);
            }
          }
        }
        Some((name, joined)) = root_futures.next(), if !root_futures.is_empty() => {
          match joined {
            Ok(Ok(_)) => {
              debug!(workspace = %name, "root executor returned");
            }
            Ok(Err(e)) => {
              error!(workspace = %name, error = %e, "root executor failed");
              first_err.get_or_insert(e);
              break;
            }
            Err(e) => {
              error!(workspace = %name, error = %e, "root executor panicked");
              first_err.get_or_insert(EngineError::ExecutorPanicked { workspace: name });
              break;
            }
          }
        }
      }
    }

    // Ask every executor still in its receive loop to wind down.
    for (name, executor_id) in &state.running {
      debug!(workspace = %name, executor_id = %executor_id, signal = SIGNAL_SHUTDOWN, "signalling shutdown");
      if let Err(e) = self.env.registry.shutdown(executor_id) {
        warn!(workspace = %name, executor_id = %executor_id, error = %e, "failed to send shutdown signal");
      }
    }

    // Await every root future; the first error observed wins, but all
    // roots are drained before returning.
    while let Some((name, joined)) = root_futures.next().await {
      match joined {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
          error!(workspace = %name, error = %e, "root executor failed");
          first_err.get_or_insert(e);
        }
        Err(e) => {
          error!(workspace = %name, error = %e, "root executor panicked");
          first_err.get_or_insert(EngineError::ExecutorPanicked { workspace: name });
        }
      }
    }

    match first_err {
      None => {
        info!(workspaces = total, "orchestration completed");
        self
          .env
          .notifier
          .notify(OrchestrationEvent::OrchestrationCompleted {
            run_id: self.run_id.clone(),
          });
        Ok(OrchestrationOutcome {
          run_id: self.run_id,
          outputs: state.outputs,
        })
      }
      Some(e) => {
        error!(error = %e, "orchestration failed");
        self
          .env
          .notifier
          .notify(OrchestrationEvent::OrchestrationFailed {
            run_id: self.run_id.clone(),
            error: e.to_string(),
          });
        Err(e)
      }
    }
  }

  /// Dispatches a workspace whose dependencies have all completed.
  fn start_workspace(
    &self,
    mut ws: WorkspaceConfig,
    depths: &HashMap<String, usize>,
    state: &mut RunState,
    root_futures: &mut FuturesUnordered<RootFuture>,
  ) {
    // 1. Resolve inputs from stored dependency outputs, preserving the
    // original JSON types. Absent source outputs are skipped; the tool
    // fails later if the variable is actually required.
    let inputs = ws.inputs.clone();
    for mapping in &inputs {
      let value = state
        .outputs
        .get(&mapping.source_workspace)
        .and_then(|outputs| outputs.get(&mapping.source_output));
      match value {
        Some(value) => {
          ws.extra_vars
            .insert(mapping.target_var.clone(), value.clone());
        }
        None => {
          debug!(
            workspace = %ws.name,
            source = %mapping.source_workspace,
            output = %mapping.source_output,
            "input mapping source output absent, skipping"
          );
        }
      }
    }

    // 2. Nest under the deepest dependency so the executor hierarchy
    // mirrors the DAG. Ties break to the first dependency in declared
    // order.
    if !ws.depends_on.is_empty() {
      let mut host = ws.depends_on[0].as_str();
      let mut max_depth = depths.get(host).copied().unwrap_or(0);
      for dep in &ws.depends_on {
        let depth = depths.get(dep.as_str()).copied().unwrap_or(0);
        if depth > max_depth {
          max_depth = depth;
          host = dep;
        }
      }

      let host_id = state.running.get(host).cloned().unwrap_or_default();
      let signal = StartChildSignal {
        workspace: ws.clone(),
      };
      match self.env.registry.start_child(&host_id, signal) {
        Ok(()) => {
          let executor_id = format!("iac-{}-{}", self.env.root_run_id, ws.name);
          debug!(workspace = %ws.name, host = %host, executor_id = %executor_id, "nested under host");
          state.running.insert(ws.name.clone(), executor_id);
          return;
        }
        Err(e) => {
          warn!(
            workspace = %ws.name,
            host = %host,
            error = %e,
            "failed to signal host, falling back to root executor"
          );
        }
      }
    }

    // 3. Start as a root executor (no dependencies, or host signalling
    // failed).
    self.launch_root(ws, state, root_futures);
  }

  fn launch_root(
    &self,
    ws: WorkspaceConfig,
    state: &mut RunState,
    root_futures: &mut FuturesUnordered<RootFuture>,
  ) {
    let name = ws.name.clone();
    if !ws.task_queue.is_empty() {
      debug!(workspace = %name, task_queue = %ws.task_queue, "routing executor to task queue");
    }
    let (executor_id, handle) = spawn_executor(self.env.clone(), ws, self.cancel.child_token());
    info!(workspace = %name, executor_id = %executor_id, "launched root executor");
    state.running.insert(name.clone(), executor_id);
    root_futures.push(async move { (name, handle.await) }.boxed());
  }
}
