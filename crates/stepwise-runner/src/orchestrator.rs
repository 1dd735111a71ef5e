use stepwise_core::{
    ContextEntry, Deliverable, FailureKind, Lifecycle, Purpose, Run, SubtaskSpec, SubtaskState,
};
use stepwise_prompts::ReasoningContext;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::decomposer;
use crate::error::OrchestrationError;
use crate::parse::parse_free_text;
use crate::ports::Ports;
use crate::review;
use crate::subtask_runner::SubtaskRunner;
use crate::validation::ValidationPolicy;

/// Per-run policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub max_info_rounds: u32,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    pub max_subtasks: usize,
    pub automated_validation: bool,
    pub human_validation: bool,
    /// Stop at the first subtask that exhausts its retries instead of
    /// continuing and reporting.
    pub abort_on_failure: bool,
    /// Let the operator edit the plan before subtasks are materialized.
    pub review_plan: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_info_rounds: 5,
            max_retries: 1,
            max_subtasks: 20,
            automated_validation: false,
            human_validation: true,
            abort_on_failure: false,
            review_plan: true,
        }
    }
}

impl OrchestratorConfig {
    pub fn validation(&self) -> ValidationPolicy {
        ValidationPolicy {
            automated: self.automated_validation,
            human: self.human_validation,
        }
    }
}

const CANCELLED: &str = "cancelled";

/// Owns a run from requirement to deliverable.
pub struct Orchestrator {
    ports: Ports,
    config: OrchestratorConfig,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(ports: Ports, config: OrchestratorConfig) -> Self {
        Self {
            ports,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Cancelling this token stops the run at the next port call.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn ports(&self) -> &Ports {
        &self.ports
    }

    pub async fn preflight(&self) -> anyhow::Result<()> {
        info!("reasoning backend: {}", self.ports.reasoning.name());
        self.ports.reasoning.preflight_check().await
    }

    /// Plan then execute.
    pub async fn run(&self, requirement: &str) -> Result<Run, OrchestrationError> {
        let run = self.plan(requirement).await?;
        self.execute(run).await
    }

    /// Decompose the requirement, let the operator review the plan, and
    /// persist the run as `pending` with its subtasks.
    ///
    /// A decomposition or review failure marks the persisted run `failed`
    /// and is returned.
    pub async fn plan(&self, requirement: &str) -> Result<Run, OrchestrationError> {
        let mut run =
            Run::new(requirement).map_err(|e| OrchestrationError::InvalidInput(e.to_string()))?;
        self.ports.store.create_run(&run).await?;
        info!("run {} created", run.id);

        let specs = match self.decompose_and_review(&run.requirement).await {
            Ok(specs) => specs,
            Err(e) => {
                error!("run {} planning failed: {}", run.id, e);
                let message = match &e {
                    OrchestrationError::Cancelled => CANCELLED.to_string(),
                    other => other.to_string(),
                };
                run.fail(message)?;
                self.ports.store.update_run(&run).await?;
                return Err(e);
            }
        };

        run.attach_subtasks(&specs)?;
        for subtask in run.subtasks() {
            self.ports.store.save_subtask(subtask).await?;
        }
        self.ports.store.update_run(&run).await?;
        info!("run {} planned with {} subtasks", run.id, run.subtasks().len());
        Ok(run)
    }

    async fn decompose_and_review(
        &self,
        requirement: &str,
    ) -> Result<Vec<SubtaskSpec>, OrchestrationError> {
        let specs = decomposer::decompose(
            self.ports.reasoning.as_ref(),
            requirement,
            self.config.max_subtasks,
            &self.cancel,
        )
        .await?;
        if !self.config.review_plan {
            return Ok(specs);
        }
        review::review_plan(self.ports.confirmation.as_ref(), specs, &self.cancel).await
    }

    /// Run every pending subtask in order, then integrate.
    ///
    /// Subtask failures are reported on the run, not returned. A cancelled
    /// or aborted run comes back `failed`. `Err` means the run could not be
    /// driven at all (store or state errors); the run is then marked failed
    /// in the store when the store still accepts the write.
    pub async fn execute(&self, mut run: Run) -> Result<Run, OrchestrationError> {
        run.start()?;
        self.ports.store.update_run(&run).await?;
        info!("run {} started", run.id);

        match self.drive(&mut run).await {
            Ok(()) => Ok(run),
            Err(e) => {
                self.abandon(&mut run, &e).await;
                Err(e)
            }
        }
    }

    /// Record a run that stopped on an error as failed, once.
    async fn abandon(&self, run: &mut Run, cause: &OrchestrationError) {
        error!("run {} aborted: {}", run.id, cause);
        if run.status().is_terminal() || run.fail(cause.to_string()).is_err() {
            return;
        }
        if let Err(e) = self.ports.store.update_run(run).await {
            warn!("run {}: could not record failure: {}", run.id, e);
        }
    }

    async fn drive(&self, run: &mut Run) -> Result<(), OrchestrationError> {
        let runner = SubtaskRunner::new(&self.ports, &self.config, &self.cancel);
        let subtasks = run.subtasks().to_vec();
        let mut stop: Option<String> = None;

        for subtask in subtasks {
            if subtask.state() != SubtaskState::Pending {
                continue;
            }
            if self.cancel.is_cancelled() {
                stop = Some(CANCELLED.into());
                break;
            }

            let mut lifecycle = Lifecycle::new(subtask, self.config.max_retries)?;
            lifecycle.seed(ContextEntry::requirement(run.requirement.clone()));
            if let Some(previous) = run.memory().last() {
                lifecycle.seed(previous.clone());
            }

            let done = runner.run(&run.requirement, lifecycle).await?;
            if done.state() == SubtaskState::Completed {
                if let Some(payload) = done.payload() {
                    run.remember(&done.id, payload)?;
                }
            }
            let failure = done.failure().cloned();
            let position = done.position;
            run.update_subtask(done)?;
            self.ports.store.update_run(run).await?;

            match failure {
                Some(f) if f.kind == FailureKind::Cancelled => {
                    stop = Some(CANCELLED.into());
                    break;
                }
                Some(f) if self.config.abort_on_failure => {
                    stop = Some(format!("subtask {} failed: {}", position + 1, f));
                    break;
                }
                _ => {}
            }
        }

        if let Some(reason) = stop {
            warn!("run {} stopped: {}", run.id, reason);
            run.fail(reason)?;
            self.ports.store.update_run(run).await?;
            return Ok(());
        }

        let total = run.subtasks().len();
        let failed = run.failed_subtasks().len();
        if failed == total {
            error!("run {}: all {} subtasks failed", run.id, total);
            run.fail(format!("all {total} subtasks failed"))?;
            self.ports.store.update_run(run).await?;
            return Ok(());
        }
        if failed > 0 {
            warn!("run {}: {} of {} subtasks failed", run.id, failed, total);
        }

        if self.cancel.is_cancelled() {
            run.fail(CANCELLED)?;
            self.ports.store.update_run(run).await?;
            return Ok(());
        }
        let deliverable = self.integrate(run).await;
        run.complete(deliverable)?;
        self.ports.store.update_run(run).await?;
        info!("run {} completed", run.id);
        Ok(())
    }

    /// Combine every subtask's result in order. Failure degrades to the raw
    /// sections flagged partial.
    async fn integrate(&self, run: &Run) -> Deliverable {
        let sections = run.result_sections();
        let ctx = ReasoningContext::for_requirement(run.requirement.clone())
            .with_sections(sections.clone());
        let integrated = match self.ports.reasoning.complete(Purpose::Integrate, &ctx).await {
            Ok(text) => parse_free_text(Purpose::Integrate, &text).map_err(|e| e.to_string()),
            Err(e) => Err(format!("{e:#}")),
        };
        match integrated {
            Ok(document) => Deliverable::Integrated { document },
            Err(message) => {
                let reason = OrchestrationError::Integration(message).to_string();
                warn!("run {}: {}, delivering partial results", run.id, reason);
                Deliverable::Partial { sections, reason }
            }
        }
    }
}
