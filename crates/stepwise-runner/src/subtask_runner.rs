use stepwise_core::lifecycle::{Completed, Executing, Failed, Lifecycle, Pending};
use stepwise_core::{FailureKind, Subtask};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatch::Dispatcher;
use crate::error::OrchestrationError;
use crate::info_gathering::InfoGatherer;
use crate::orchestrator::OrchestratorConfig;
use crate::ports::Ports;
use crate::validation::{Validator, Verdict};

type Attempt = Result<Lifecycle<Completed>, Lifecycle<Failed>>;

/// Drives one subtask from `PENDING` to a terminal state, persisting after
/// every transition.
///
/// Returns the terminal subtask. Failures of the subtask itself, including
/// cancellation, are part of the returned record; `Err` is reserved for
/// store and state errors.
pub struct SubtaskRunner<'a> {
    ports: &'a Ports,
    config: &'a OrchestratorConfig,
    cancel: &'a CancellationToken,
}

impl<'a> SubtaskRunner<'a> {
    pub fn new(
        ports: &'a Ports,
        config: &'a OrchestratorConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            ports,
            config,
            cancel,
        }
    }

    pub async fn run(
        &self,
        requirement: &str,
        lifecycle: Lifecycle<Pending>,
    ) -> Result<Subtask, OrchestrationError> {
        let id = lifecycle.subtask().id.clone();
        info!("subtask {} started: {}", id, lifecycle.subtask().description);

        let mut gathering = lifecycle.begin_info_gathering();
        self.persist(gathering.subtask()).await?;
        let gatherer = InfoGatherer::new(self.ports, self.config.max_info_rounds, self.cancel);
        match gatherer.gather(requirement, &mut gathering).await {
            Ok(summary) => info!(
                "subtask {}: {} info rounds, {} context entries added",
                id, summary.rounds, summary.entries_added
            ),
            Err(OrchestrationError::Cancelled) => {
                return self.finish(gathering.cancel()).await;
            }
            Err(e) => return Err(e),
        }

        let mut executing = gathering.begin_execution();
        self.persist(executing.subtask()).await?;
        loop {
            let failed = match self.attempt(requirement, executing).await? {
                Ok(completed) => {
                    info!("subtask {} completed", id);
                    let subtask = completed.into_subtask();
                    self.persist(&subtask).await?;
                    return Ok(subtask);
                }
                Err(failed) => failed,
            };
            self.persist(failed.subtask()).await?;
            if let Some(failure) = failed.failure() {
                warn!("subtask {} attempt failed: {}", id, failure);
            }
            match failed.retry() {
                Ok(next) => {
                    info!(
                        "subtask {}: retrying ({} retries left)",
                        id,
                        next.retries_left()
                    );
                    self.persist(next.subtask()).await?;
                    executing = next;
                }
                Err(failed) => {
                    warn!("subtask {} failed with no retries left", id);
                    return self.finish(failed).await;
                }
            }
        }
    }

    /// One pass through `EXECUTING` and `VALIDATING`.
    async fn attempt(
        &self,
        requirement: &str,
        mut executing: Lifecycle<Executing>,
    ) -> Result<Attempt, OrchestrationError> {
        let dispatcher = Dispatcher::new(self.ports, self.cancel);
        let result = match dispatcher.execute(requirement, &mut executing).await {
            Ok(result) => result,
            Err(OrchestrationError::Cancelled) => return Ok(Err(executing.cancel())),
            Err(OrchestrationError::Dispatch(message)) => {
                return Ok(Err(executing.fail(FailureKind::Dispatch, message)));
            }
            Err(OrchestrationError::ToolExecution(message)) => {
                return Ok(Err(executing.fail(FailureKind::ToolExecution, message)));
            }
            Err(e) => return Err(e),
        };

        let mut validating = match executing.finish_execution(result) {
            Ok(validating) => validating,
            Err(failed) => return Ok(Err(failed)),
        };
        self.persist(validating.subtask()).await?;

        let validator = Validator::new(self.ports, self.config.validation(), self.cancel);
        let verdict = match validator.validate(requirement, &mut validating).await {
            Ok(verdict) => verdict,
            Err(OrchestrationError::Cancelled) => return Ok(Err(validating.cancel())),
            Err(e) => return Err(e),
        };
        let subtask_id = validating.subtask().id.clone();
        match verdict {
            Verdict::Pass(report) => {
                if let Some(ref report) = report {
                    self.ports
                        .store
                        .append_validation_report(&subtask_id, report)
                        .await?;
                }
                Ok(Ok(validating.accept(report)))
            }
            Verdict::Fail(report) => {
                self.ports
                    .store
                    .append_validation_report(&subtask_id, &report)
                    .await?;
                Ok(Err(validating.reject(report)))
            }
        }
    }

    async fn finish(&self, failed: Lifecycle<Failed>) -> Result<Subtask, OrchestrationError> {
        let subtask = failed.into_subtask();
        self.persist(&subtask).await?;
        Ok(subtask)
    }

    async fn persist(&self, subtask: &Subtask) -> Result<(), OrchestrationError> {
        self.ports.store.save_subtask(subtask).await?;
        Ok(())
    }
}
