//! Public orchestration API.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use terraflow_activities::{IacActivities, RetryPolicy};
use terraflow_config::{InfrastructureConfig, WorkspaceConfig};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::events::{EventNotifier, NoopNotifier};
use crate::executor::{ExecutorEnv, spawn_executor};
use crate::orchestrator::Orchestration;
use crate::signals::SignalRegistry;
use crate::status::{OrchestrationStatus, StatusRegistry};
use crate::varcheck::VarsValidator;

/// Result of a successful orchestration: every workspace's captured
/// outputs, keyed by workspace name.
#[derive(Debug)]
pub struct OrchestrationOutcome {
  pub run_id: String,
  pub outputs: HashMap<String, Map<String, Value>>,
}

/// The front door of the engine.
///
/// Generic over `N: EventNotifier` to allow different observation
/// strategies. Use `Engine::new()` for a default engine with no-op
/// notifications, or `Engine::with_notifier()` to observe events.
pub struct Engine<N: EventNotifier = NoopNotifier> {
  activities: Arc<dyn IacActivities>,
  retry: RetryPolicy,
  validator: Option<Arc<dyn VarsValidator>>,
  notifier: N,
  statuses: StatusRegistry,
}

impl Engine<NoopNotifier> {
  /// An engine with no-op event notifications.
  pub fn new(activities: Arc<dyn IacActivities>) -> Self {
    Self::with_notifier(activities, NoopNotifier)
  }
}

impl<N> Engine<N>
where
  N: EventNotifier + Clone + Send + Sync + 'static,
{
  pub fn with_notifier(activities: Arc<dyn IacActivities>, notifier: N) -> Self {
    Self {
      activities,
      retry: RetryPolicy::default(),
      validator: None,
      notifier,
      statuses: StatusRegistry::default(),
    }
  }

  /// Installs a pre-dispatch variable validator.
  pub fn with_validator(mut self, validator: Arc<dyn VarsValidator>) -> Self {
    self.validator = Some(validator);
    self
  }

  /// Overrides the activity retry policy.
  pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  /// Starts an orchestration and returns immediately with its handle.
  ///
  /// Validation runs inside the orchestration; configuration errors
  /// surface through [`OrchestrationHandle::wait`].
  pub fn start(&self, config: InfrastructureConfig) -> OrchestrationHandle {
    let run_id = uuid::Uuid::new_v4().to_string();
    let cancel = CancellationToken::new();
    let (finished_tx, finished_rx) = mpsc::unbounded_channel();

    let env = Arc::new(ExecutorEnv {
      activities: self.activities.clone(),
      retry: self.retry.clone(),
      validator: self.validator.clone(),
      notifier: self.notifier.clone(),
      registry: SignalRegistry::default(),
      root_run_id: run_id.clone(),
      finished: Some(finished_tx),
    });

    self.statuses.mark_running(&run_id);
    let statuses = self.statuses.clone();

    let orchestration = Orchestration {
      env,
      config,
      run_id: run_id.clone(),
      cancel: cancel.clone(),
      finished_rx,
    };

    let status_id = run_id.clone();
    let handle = tokio::spawn(async move {
      let result = orchestration.run().await;
      statuses.mark_closed(&status_id, result.is_ok());
      result
    });

    OrchestrationHandle {
      run_id,
      handle,
      cancel,
    }
  }

  /// Runs an orchestration to completion.
  pub async fn run(&self, config: InfrastructureConfig) -> Result<OrchestrationOutcome, EngineError> {
    self.start(config).wait().await
  }

  /// Queries the status of an orchestration by run id.
  pub fn status(&self, run_id: &str) -> Option<OrchestrationStatus> {
    self.statuses.get(run_id)
  }

  /// Runs a single workspace standalone, with no orchestrator: no
  /// completion signalling, no hosting. Returns the workspace's outputs.
  pub async fn execute_workspace(
    &self,
    workspace: WorkspaceConfig,
  ) -> Result<Map<String, Value>, EngineError> {
    let name = workspace.name.clone();
    let env = Arc::new(ExecutorEnv {
      activities: self.activities.clone(),
      retry: self.retry.clone(),
      validator: self.validator.clone(),
      notifier: self.notifier.clone(),
      registry: SignalRegistry::default(),
      root_run_id: uuid::Uuid::new_v4().to_string(),
      finished: None,
    });

    let (_, handle) = spawn_executor(env, workspace, CancellationToken::new());
    handle
      .await
      .map_err(|_| EngineError::ExecutorPanicked { workspace: name })?
  }
}

/// A running orchestration.
pub struct OrchestrationHandle {
  run_id: String,
  handle: JoinHandle<Result<OrchestrationOutcome, EngineError>>,
  cancel: CancellationToken,
}

impl OrchestrationHandle {
  pub fn run_id(&self) -> &str {
    &self.run_id
  }

  /// Cancels the orchestration; outstanding executors and activities are
  /// cancelled transitively.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  /// Waits for the orchestration to finish.
  pub async fn wait(self) -> Result<OrchestrationOutcome, EngineError> {
    self
      .handle
      .await
      .map_err(|_| EngineError::OrchestrationPanicked)?
  }
}
