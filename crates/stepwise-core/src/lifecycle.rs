//! Typed subtask lifecycle.
//!
//! `Lifecycle<P>` wraps a `Subtask` and exposes only the transitions that are
//! legal from phase `P`:
//!
//! ```text
//! Pending -> InfoGathering -> Executing -> Validating -> Completed
//!                                 |            |
//!                                 v            v
//!                                Failed <------+
//!                                 |
//!                                 +--(retry)--> Executing
//! ```
//!
//! Context can only be appended while `Pending` or `InfoGathering`; once a
//! subtask reaches `Executing` its context is frozen for good, including
//! across retries.

use std::marker::PhantomData;

use chrono::Utc;

use crate::attempts::Attempts;
use crate::context::ContextEntry;
use crate::error::CoreError;
use crate::execution::{ExecutionMode, ExecutionResult};
use crate::subtask::{ErrorKind, Failure, FailureKind, StateTransition, Subtask, SubtaskState};
use crate::validation::ValidationReport;

mod sealed {
    pub trait Sealed {}
}

pub trait Phase: sealed::Sealed {
    const STATE: SubtaskState;
}

/// Phases in which a run-level cancellation can interrupt the subtask.
pub trait Active: Phase {}

macro_rules! phase {
    ($name:ident, $state:expr) => {
        #[derive(Debug)]
        pub struct $name;

        impl sealed::Sealed for $name {}

        impl Phase for $name {
            const STATE: SubtaskState = $state;
        }
    };
}

phase!(Pending, SubtaskState::Pending);
phase!(InfoGathering, SubtaskState::InfoGathering);
phase!(Executing, SubtaskState::Executing);
phase!(Validating, SubtaskState::Validating);
phase!(Completed, SubtaskState::Completed);
phase!(Failed, SubtaskState::Failed);

impl Active for InfoGathering {}
impl Active for Executing {}
impl Active for Validating {}

#[derive(Debug)]
pub struct Lifecycle<P: Phase> {
    subtask: Subtask,
    retries: Attempts,
    _phase: PhantomData<P>,
}

impl<P: Phase> Lifecycle<P> {
    pub fn subtask(&self) -> &Subtask {
        &self.subtask
    }

    pub fn into_subtask(self) -> Subtask {
        self.subtask
    }

    pub fn state(&self) -> SubtaskState {
        P::STATE
    }

    pub fn retries_left(&self) -> u32 {
        self.retries.remaining()
    }

    pub fn record_error(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.subtask.record_error(kind, message);
    }

    fn transition<Q: Phase>(mut self) -> Lifecycle<Q> {
        let now = Utc::now();
        self.subtask.history.push(StateTransition {
            from: P::STATE,
            to: Q::STATE,
            at: now,
        });
        self.subtask.state = Q::STATE;
        self.subtask.updated_at = now;
        Lifecycle {
            subtask: self.subtask,
            retries: self.retries,
            _phase: PhantomData,
        }
    }

    fn push_context(&mut self, entry: ContextEntry) {
        self.subtask.context.push(entry);
        self.subtask.updated_at = Utc::now();
    }

    fn into_failed(mut self, kind: FailureKind, message: impl Into<String>) -> Lifecycle<Failed> {
        self.subtask.failure = Some(Failure {
            kind,
            message: message.into(),
        });
        self.transition()
    }
}

impl<P: Active> Lifecycle<P> {
    /// Stop the subtask where it stands. A cancelled subtask is never retried.
    pub fn cancel(mut self) -> Lifecycle<Failed> {
        self.retries.exhaust();
        self.into_failed(FailureKind::Cancelled, "cancelled")
    }
}

impl Lifecycle<Pending> {
    /// Take ownership of a subtask that has not started yet.
    pub fn new(subtask: Subtask, retry_budget: u32) -> Result<Self, CoreError> {
        if subtask.state != SubtaskState::Pending {
            return Err(CoreError::UnexpectedState {
                expected: SubtaskState::Pending.to_string(),
                found: subtask.state.to_string(),
            });
        }
        Ok(Self {
            subtask,
            retries: Attempts::up_to(retry_budget),
            _phase: PhantomData,
        })
    }

    /// Initial context (requirement, preceding result) before gathering.
    pub fn seed(&mut self, entry: ContextEntry) {
        self.push_context(entry);
    }

    pub fn begin_info_gathering(self) -> Lifecycle<InfoGathering> {
        self.transition()
    }
}

impl Lifecycle<InfoGathering> {
    pub fn append_context(&mut self, entry: ContextEntry) {
        self.push_context(entry);
    }

    pub fn begin_execution(self) -> Lifecycle<Executing> {
        let mut next: Lifecycle<Executing> = self.transition();
        next.subtask.attempts += 1;
        next
    }
}

impl Lifecycle<Executing> {
    /// Record the chosen mode. The mode is set once per subtask and reused by
    /// retries.
    pub fn record_mode(&mut self, mode: ExecutionMode) -> Result<(), CoreError> {
        if let Some(existing) = self.subtask.mode {
            return Err(CoreError::ModeAlreadyRecorded(existing.to_string()));
        }
        self.subtask.mode = Some(mode);
        self.subtask.updated_at = Utc::now();
        Ok(())
    }

    /// Store the result envelope. A successful result moves on to
    /// validation; a failed one fails the attempt.
    pub fn finish_execution(
        mut self,
        result: ExecutionResult,
    ) -> Result<Lifecycle<Validating>, Lifecycle<Failed>> {
        let success = result.success;
        let mode = result.mode;
        let error = result.error.clone().unwrap_or_default();
        self.subtask.result = Some(result);
        if success {
            return Ok(self.transition());
        }
        let (kind, error_kind) = match mode {
            ExecutionMode::Tool => (FailureKind::ToolExecution, ErrorKind::ToolExecution),
            ExecutionMode::Generated => (FailureKind::Generation, ErrorKind::Generation),
        };
        self.record_error(error_kind, error.clone());
        Err(self.into_failed(kind, error))
    }

    pub fn fail(mut self, kind: FailureKind, message: impl Into<String>) -> Lifecycle<Failed> {
        let message = message.into();
        let error_kind = match kind {
            FailureKind::ToolExecution => Some(ErrorKind::ToolExecution),
            FailureKind::Generation => Some(ErrorKind::Generation),
            FailureKind::Dispatch => Some(ErrorKind::Dispatch),
            FailureKind::ValidationRejected | FailureKind::Cancelled => None,
        };
        if let Some(error_kind) = error_kind {
            self.record_error(error_kind, message.clone());
        }
        self.into_failed(kind, message)
    }
}

impl Lifecycle<Validating> {
    /// Complete the subtask. `None` means validation was configured off.
    pub fn accept(mut self, report: Option<ValidationReport>) -> Lifecycle<Completed> {
        if let Some(report) = report {
            self.subtask.reports.push(report);
        }
        self.transition()
    }

    pub fn reject(mut self, report: ValidationReport) -> Lifecycle<Failed> {
        let message = if report.narrative.is_empty() {
            "validation rejected the result".to_string()
        } else {
            report.narrative.clone()
        };
        self.subtask.reports.push(report);
        self.into_failed(FailureKind::ValidationRejected, message)
    }
}

impl Lifecycle<Failed> {
    pub fn failure(&self) -> Option<&Failure> {
        self.subtask.failure.as_ref()
    }

    pub fn can_retry(&self) -> bool {
        let cancelled = matches!(
            self.subtask.failure,
            Some(Failure {
                kind: FailureKind::Cancelled,
                ..
            })
        );
        !self.retries.is_exhausted() && !cancelled
    }

    /// Re-enter `Executing` with the same frozen context. Returns the
    /// unchanged failed lifecycle when the budget is spent or the failure was
    /// a cancellation.
    pub fn retry(mut self) -> Result<Lifecycle<Executing>, Lifecycle<Failed>> {
        if !self.can_retry() || self.retries.next().is_none() {
            return Err(self);
        }
        let mut next: Lifecycle<Executing> = self.transition();
        next.subtask.attempts += 1;
        next.subtask.failure = None;
        next.subtask.result = None;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::InfoKind;
    use crate::subtask::SubtaskSpec;

    fn pending(retries: u32) -> Lifecycle<Pending> {
        let st = Subtask::new("run-1", 0, &SubtaskSpec::new("write hello.txt"));
        Lifecycle::new(st, retries).unwrap()
    }

    #[test]
    fn happy_path_records_every_state() {
        let mut lc = pending(1);
        lc.seed(ContextEntry::requirement("produce a hello-world file"));
        let mut lc = lc.begin_info_gathering();
        lc.append_context(ContextEntry::gathered(1, InfoKind::UserData, "hello.txt"));
        let mut lc = lc.begin_execution();
        lc.record_mode(ExecutionMode::Tool).unwrap();
        let lc = lc
            .finish_execution(ExecutionResult::succeeded(ExecutionMode::Tool, "wrote 12 bytes"))
            .unwrap();
        let done = lc.accept(None).into_subtask();

        assert_eq!(done.state(), SubtaskState::Completed);
        assert_eq!(done.context().len(), 2);
        assert_eq!(done.attempts(), 1);
        assert!(done.visited(SubtaskState::Executing));
        assert!(done.visited(SubtaskState::Validating));
        assert_eq!(done.payload(), Some("wrote 12 bytes"));
        assert!(done.reports().is_empty());
    }

    #[test]
    fn new_rejects_started_subtask() {
        let lc = pending(0).begin_info_gathering();
        let st = lc.into_subtask();
        let err = Lifecycle::new(st, 1).unwrap_err();
        assert!(matches!(err, CoreError::UnexpectedState { .. }));
    }

    #[test]
    fn mode_is_set_once() {
        let mut lc = pending(0).begin_info_gathering().begin_execution();
        lc.record_mode(ExecutionMode::Generated).unwrap();
        let err = lc.record_mode(ExecutionMode::Tool).unwrap_err();
        assert!(matches!(err, CoreError::ModeAlreadyRecorded(_)));
        assert_eq!(lc.subtask().mode(), Some(ExecutionMode::Generated));
    }

    #[test]
    fn failed_tool_result_fails_attempt() {
        let lc = pending(0).begin_info_gathering().begin_execution();
        let failed = lc
            .finish_execution(ExecutionResult::failed(ExecutionMode::Tool, "unknown tool"))
            .unwrap_err();
        assert_eq!(failed.failure().unwrap().kind, FailureKind::ToolExecution);
        assert_eq!(failed.subtask().errors().len(), 1);
        assert!(!failed.can_retry());
    }

    #[test]
    fn retry_keeps_context_and_mode() {
        let mut lc = pending(1);
        lc.seed(ContextEntry::requirement("req"));
        let mut lc = lc.begin_info_gathering().begin_execution();
        lc.record_mode(ExecutionMode::Generated).unwrap();
        let validating = lc
            .finish_execution(ExecutionResult::succeeded(ExecutionMode::Generated, "draft"))
            .unwrap();
        let report = ValidationReport::automated(1, false, 0.2, vec![], vec![], "too short");
        let failed = validating.reject(report);
        let before = failed.subtask().context().clone();

        let again = failed.retry().unwrap();
        assert_eq!(again.subtask().context(), &before);
        assert_eq!(again.subtask().mode(), Some(ExecutionMode::Generated));
        assert_eq!(again.subtask().attempts(), 2);
        assert_eq!(again.retries_left(), 0);
        assert!(again.subtask().result().is_none());
        assert_eq!(again.subtask().reports().len(), 1);

        let failed = again.fail(FailureKind::Dispatch, "bad tool call");
        let failed = failed.retry().unwrap_err();
        assert_eq!(failed.state(), SubtaskState::Failed);
    }

    #[test]
    fn cancelled_subtask_cannot_retry() {
        let lc = pending(3).begin_info_gathering();
        let failed = lc.cancel();
        assert_eq!(failed.failure().unwrap().kind, FailureKind::Cancelled);
        assert!(!failed.can_retry());
        assert!(failed.retry().is_err());
    }

    #[test]
    fn rejected_report_is_kept() {
        let lc = pending(0).begin_info_gathering().begin_execution();
        let validating = lc
            .finish_execution(ExecutionResult::succeeded(ExecutionMode::Generated, "x"))
            .unwrap();
        let failed =
            validating.reject(ValidationReport::automated(1, false, 0.1, vec![], vec![], ""));
        let st = failed.into_subtask();
        assert_eq!(st.reports().len(), 1);
        assert_eq!(st.failure().unwrap().message, "validation rejected the result");
    }
}
