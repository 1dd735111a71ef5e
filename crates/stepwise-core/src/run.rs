use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::{ContextEntry, ContextLog};
use crate::error::CoreError;
use crate::subtask::{Subtask, SubtaskSpec, SubtaskState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RunStatus::Pending),
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One subtask's contribution to the deliverable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSection {
    pub subtask_id: String,
    pub description: String,
    pub payload: Option<String>,
    /// Why there is no payload.
    pub failure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Deliverable {
    Integrated {
        document: String,
    },
    /// Integration failed; the raw per-subtask results, in original order.
    Partial {
        sections: Vec<ResultSection>,
        reason: String,
    },
}

impl Deliverable {
    pub fn is_partial(&self) -> bool {
        matches!(self, Deliverable::Partial { .. })
    }

    pub fn render(&self) -> String {
        match self {
            Deliverable::Integrated { document } => document.clone(),
            Deliverable::Partial { sections, reason } => {
                let mut out = format!("[partial result: {reason}]\n");
                for (i, section) in sections.iter().enumerate() {
                    out.push_str(&format!("\n## {}. {}\n\n", i + 1, section.description));
                    match (&section.payload, &section.failure) {
                        (Some(payload), _) => out.push_str(payload),
                        (None, Some(failure)) => out.push_str(&format!("(no result: {failure})")),
                        (None, None) => out.push_str("(no result)"),
                    }
                    out.push('\n');
                }
                out
            }
        }
    }
}

/// One end-to-end processing of a single requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub requirement: String,
    status: RunStatus,
    #[serde(default)]
    subtasks: Vec<Subtask>,
    /// Payloads of completed subtasks, in completion order.
    memory: ContextLog,
    deliverable: Option<Deliverable>,
    error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    pub fn new(requirement: impl Into<String>) -> Result<Self, CoreError> {
        let requirement = requirement.into();
        if requirement.trim().is_empty() {
            return Err(CoreError::InvalidInput("requirement is empty".into()));
        }
        let now = Utc::now();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            requirement,
            status: RunStatus::Pending,
            subtasks: Vec::new(),
            memory: ContextLog::new(),
            deliverable: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn subtasks(&self) -> &[Subtask] {
        &self.subtasks
    }

    pub fn memory(&self) -> &ContextLog {
        &self.memory
    }

    pub fn deliverable(&self) -> Option<&Deliverable> {
        self.deliverable.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Materialize the reviewed plan. Every item starts `Pending` whatever
    /// marker the decomposition gave it.
    pub fn attach_subtasks(&mut self, specs: &[SubtaskSpec]) -> Result<(), CoreError> {
        self.expect_status(RunStatus::Pending)?;
        if !self.subtasks.is_empty() {
            return Err(CoreError::InvalidInput("run already has subtasks".into()));
        }
        self.subtasks = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| Subtask::new(&self.id, i as u32, spec))
            .collect();
        self.touch();
        Ok(())
    }

    /// Reattach subtasks loaded separately from storage.
    pub fn with_subtasks(mut self, subtasks: Vec<Subtask>) -> Self {
        self.subtasks = subtasks;
        self
    }

    pub fn start(&mut self) -> Result<(), CoreError> {
        self.expect_status(RunStatus::Pending)?;
        if self.subtasks.is_empty() {
            return Err(CoreError::InvalidInput("run has no subtasks".into()));
        }
        self.status = RunStatus::Running;
        self.touch();
        Ok(())
    }

    /// Replace the stored copy of a subtask with its latest state.
    pub fn update_subtask(&mut self, subtask: Subtask) -> Result<(), CoreError> {
        self.ensure_mutable()?;
        let slot = self
            .subtasks
            .iter_mut()
            .find(|s| s.id == subtask.id)
            .ok_or_else(|| CoreError::InvalidInput(format!("unknown subtask {}", subtask.id)))?;
        *slot = subtask;
        self.touch();
        Ok(())
    }

    /// Append a completed subtask's payload to the run memory.
    pub fn remember(&mut self, subtask_id: &str, payload: &str) -> Result<(), CoreError> {
        self.ensure_mutable()?;
        self.memory.push(ContextEntry::prior_result(subtask_id, payload));
        self.touch();
        Ok(())
    }

    pub fn complete(&mut self, deliverable: Deliverable) -> Result<(), CoreError> {
        self.expect_status(RunStatus::Running)?;
        self.deliverable = Some(deliverable);
        self.status = RunStatus::Completed;
        self.touch();
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), CoreError> {
        self.ensure_mutable()?;
        self.error_message = Some(message.into());
        self.status = RunStatus::Failed;
        self.touch();
        Ok(())
    }

    pub fn failed_subtasks(&self) -> Vec<&Subtask> {
        self.subtasks
            .iter()
            .filter(|s| s.state() == SubtaskState::Failed)
            .collect()
    }

    /// Description/result pairs in original order.
    pub fn result_sections(&self) -> Vec<ResultSection> {
        self.subtasks
            .iter()
            .map(|s| ResultSection {
                subtask_id: s.id.clone(),
                description: s.description.clone(),
                payload: s.payload().map(str::to_string),
                failure: match s.state() {
                    SubtaskState::Completed => None,
                    SubtaskState::Failed => Some(
                        s.failure()
                            .map(|f| f.to_string())
                            .unwrap_or_else(|| "failed".into()),
                    ),
                    other => Some(format!("not run ({other})")),
                },
            })
            .collect()
    }

    fn expect_status(&self, expected: RunStatus) -> Result<(), CoreError> {
        if self.status != expected {
            return Err(CoreError::UnexpectedState {
                expected: expected.to_string(),
                found: self.status.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::UnexpectedState {
                expected: "pending or running".into(),
                found: self.status.to_string(),
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
