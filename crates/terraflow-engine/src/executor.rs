//! Per-workspace executor.
//!
//! A `WorkspaceRun` drives one workspace through its configured
//! operation sequence, captures its outputs, reports completion to the
//! orchestrator, and then hosts dependent executors until shutdown.
//! Without an orchestrator handle it runs standalone and simply returns
//! its outputs.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde_json::{Map, Value};
use terraflow_activities::{ActivityError, ActivityParams, IacActivities, RetryPolicy, with_retry};
use terraflow_config::WorkspaceConfig;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::EngineError;
use crate::events::{EventNotifier, OrchestrationEvent};
use crate::signals::{
  ExecutorChannels, SIGNAL_WORKSPACE_FINISHED, SignalRegistry, StartChildSignal,
  WorkspaceFinishedSignal,
};
use crate::varcheck::{VarsValidator, WorkspaceContext, merged_workspace_vars};

pub(crate) type ExecutorResult = Result<Map<String, Value>, EngineError>;

/// A completed child future, tagged with the child's workspace name.
type NamedResult = (String, Result<ExecutorResult, JoinError>);

/// Everything executors share within one orchestration.
pub(crate) struct ExecutorEnv<N> {
  pub activities: Arc<dyn IacActivities>,
  pub retry: RetryPolicy,
  pub validator: Option<Arc<dyn VarsValidator>>,
  pub notifier: N,
  pub registry: SignalRegistry,
  /// Run id of the orchestration; executor ids and the scratch
  /// directory for combined variable files derive from it.
  pub root_run_id: String,
  /// Channel to the orchestrator's completion loop. `None` when the
  /// executor runs standalone.
  pub finished: Option<mpsc::UnboundedSender<WorkspaceFinishedSignal>>,
}

/// Registers the executor's signal channels and spawns its task.
///
/// Channels are registered before the task starts so a signal sent right
/// after spawning can never be lost.
pub(crate) fn spawn_executor<N>(
  env: Arc<ExecutorEnv<N>>,
  workspace: WorkspaceConfig,
  cancel: CancellationToken,
) -> (String, JoinHandle<ExecutorResult>)
where
  N: EventNotifier + Send + Sync + 'static,
{
  let executor_id = format!("iac-{}-{}", env.root_run_id, workspace.name);
  let (child_tx, child_rx) = mpsc::unbounded_channel();
  let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
  env.registry.register(
    &executor_id,
    ExecutorChannels {
      start_child: child_tx,
      shutdown: shutdown_tx,
    },
  );

  let run = WorkspaceRun {
    env,
    workspace,
    executor_id: executor_id.clone(),
    run_id: uuid::Uuid::new_v4().to_string(),
    start_child: child_rx,
    shutdown: shutdown_rx,
    cancel,
  };

  // Boxed so hosting can recursively spawn executors of the same type.
  let future: BoxFuture<'static, ExecutorResult> = Box::pin(run.run());
  (executor_id, tokio::spawn(future))
}

pub(crate) struct WorkspaceRun<N> {
  env: Arc<ExecutorEnv<N>>,
  workspace: WorkspaceConfig,
  executor_id: String,
  run_id: String,
  start_child: mpsc::UnboundedReceiver<StartChildSignal>,
  shutdown: mpsc::UnboundedReceiver<()>,
  cancel: CancellationToken,
}

impl<N> WorkspaceRun<N>
where
  N: EventNotifier + Send + Sync + 'static,
{
  #[instrument(
    name = "workspace_run",
    skip(self),
    fields(
      workspace = %self.workspace.name,
      executor_id = %self.executor_id,
    )
  )]
  async fn run(mut self) -> ExecutorResult {
    self.env.notifier.notify(OrchestrationEvent::WorkspaceStarted {
      run_id: self.env.root_run_id.clone(),
      workspace: self.workspace.name.clone(),
    });

    let result = self.run_operations().await;

    match result {
      Ok(outputs) => {
        info!(outputs = outputs.len(), "workspace_completed");
        self
          .env
          .notifier
          .notify(OrchestrationEvent::WorkspaceCompleted {
            run_id: self.env.root_run_id.clone(),
            workspace: self.workspace.name.clone(),
            outputs: outputs.clone(),
          });

        if self.env.finished.is_none() {
          // Standalone invocation: nothing to signal, nobody to host for.
          self.env.registry.unregister(&self.executor_id);
          return Ok(outputs);
        }

        self.signal_finished(&outputs);
        let hosted = self.host_children().await;
        self.env.registry.unregister(&self.executor_id);
        hosted?;
        Ok(outputs)
      }
      Err(e) => {
        error!(error = %e, "workspace_failed");
        self
          .env
          .notifier
          .notify(OrchestrationEvent::WorkspaceFailed {
            run_id: self.env.root_run_id.clone(),
            workspace: self.workspace.name.clone(),
            error: e.to_string(),
          });
        // A failed workspace never signals completion; its failure
        // surfaces through this executor's own future.
        self.env.registry.unregister(&self.executor_id);
        Err(e)
      }
    }
  }

  /// Interprets the configured operation sequence, then captures outputs.
  async fn run_operations(&self) -> ExecutorResult {
    let ws = &self.workspace;

    if let Some(validator) = &self.env.validator {
      self.check_vars(validator.as_ref())?;
    }

    let params = ActivityParams {
      dir: ws.dir.clone(),
      tfvars: ws.tfvars.clone(),
      plan_file: format!("tfplan-{}-{}.plan", self.run_id, ws.name),
      vars: ws.extra_vars.clone(),
      run_id: self.env.root_run_id.clone(),
    };

    let mut changes_present = false;
    for op in &ws.operations {
      if self.cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
      }

      match op.as_str() {
        "init" => {
          self
            .run_activity("init", || self.env.activities.init(&params))
            .await?;
        }
        "validate" => {
          self
            .run_activity("validate", || self.env.activities.validate(&params))
            .await?;
        }
        "plan" => {
          changes_present = self
            .run_activity("plan", || self.env.activities.plan(&params))
            .await?;
          if !changes_present {
            info!(workspace = %ws.name, dir = %ws.dir.display(), "no changes detected in plan");
          }
        }
        "apply" => {
          if !changes_present {
            info!(workspace = %ws.name, dir = %ws.dir.display(), "skipping apply: no changes to apply");
            continue;
          }
          self
            .run_activity("apply", || self.env.activities.apply(&params))
            .await?;
        }
        other => {
          return Err(EngineError::UnknownOperation {
            workspace: ws.name.clone(),
            operation: other.to_string(),
          });
        }
      }
    }

    // Outputs are captured unconditionally, even in plan-only mode or
    // when apply was skipped: dependents may want the existing state's
    // outputs.
    self
      .run_activity("output", || self.env.activities.output(&params))
      .await
  }

  /// Runs the configured validator over the merged variable map.
  fn check_vars(&self, validator: &dyn VarsValidator) -> Result<(), EngineError> {
    let ws = &self.workspace;
    let vars = merged_workspace_vars(ws)?;
    let ctx = WorkspaceContext {
      name: ws.name.clone(),
      kind: ws.kind.clone(),
      dir: ws.dir.clone(),
    };

    let verdict = validator.validate(&vars, &ctx);
    if !verdict.is_valid() {
      return Err(EngineError::VarsRejected {
        workspace: ws.name.clone(),
        report: verdict.report(),
      });
    }
    if !verdict.warnings.is_empty() {
      warn!(
        workspace = %ws.name,
        warnings = verdict.warnings.len(),
        report = %verdict.report(),
        "variable validation produced warnings"
      );
    }
    Ok(())
  }

  async fn run_activity<T, F, Fut>(&self, phase: &str, operation: F) -> Result<T, EngineError>
  where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ActivityError>>,
  {
    with_retry(&self.env.retry, phase, operation)
      .await
      .map_err(|source| EngineError::Workspace {
        workspace: self.workspace.name.clone(),
        phase: phase.to_string(),
        source,
      })
  }

  fn signal_finished(&self, outputs: &Map<String, Value>) {
    let Some(finished) = &self.env.finished else {
      return;
    };
    debug!(
      workspace = %self.workspace.name,
      signal = SIGNAL_WORKSPACE_FINISHED,
      "signalling orchestrator"
    );
    let signal = WorkspaceFinishedSignal {
      name: self.workspace.name.clone(),
      outputs: outputs.clone(),
    };
    if finished.send(signal).is_err() {
      warn!(workspace = %self.workspace.name, "failed to signal orchestrator: channel closed");
    }
  }

  /// Receive loop for hosting mode.
  ///
  /// Spawns a nested executor for every `start-child` signal and tracks
  /// its future. Exits once shutdown has been signalled and no child
  /// futures remain outstanding. A failing child is logged and does not
  /// fail the host; its error surfaces through the child's own
  /// completion path.
  async fn host_children(&mut self) -> Result<(), EngineError> {
    let mut children: FuturesUnordered<BoxFuture<'static, NamedResult>> = FuturesUnordered::new();
    let mut shutting_down = false;
    let mut inbound_open = true;

    loop {
      if shutting_down && children.is_empty() {
        return Ok(());
      }

      tokio::select! {
        _ = self.cancel.cancelled() => {
          warn!(workspace = %self.workspace.name, "host cancelled");
          return Err(EngineError::Cancelled);
        }
        signal = self.start_child.recv(), if inbound_open => match signal {
          Some(StartChildSignal { workspace }) => {
            let name = workspace.name.clone();
            info!(parent = %self.workspace.name, child = %name, "starting child executor");
            let (_, handle) =
              spawn_executor(self.env.clone(), workspace, self.cancel.child_token());
            children.push(async move { (name, handle.await) }.boxed());
          }
          None => {
            // Registry dropped our channels; treat as shutdown.
            inbound_open = false;
            shutting_down = true;
          }
        },
        _ = self.shutdown.recv(), if !shutting_down => {
          shutting_down = true;
        }
        Some((name, joined)) = children.next(), if !children.is_empty() => {
          match joined {
            Ok(Ok(_)) => info!(child = %name, "child executor completed"),
            Ok(Err(e)) => error!(child = %name, error = %e, "child executor failed"),
            Err(e) => error!(child = %name, error = %e, "child executor panicked"),
          }
        }
      }
    }
  }
}
