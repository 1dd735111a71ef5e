use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::ContextLog;
use crate::execution::{ExecutionMode, ExecutionResult};
use crate::validation::ValidationReport;

/// Status marker of a todo item as returned by decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoMarker {
    Pending,
    InProgress,
    Done,
}

impl TodoMarker {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            ' ' => Some(TodoMarker::Pending),
            '-' => Some(TodoMarker::InProgress),
            'x' | 'X' => Some(TodoMarker::Done),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            TodoMarker::Pending => ' ',
            TodoMarker::InProgress => '-',
            TodoMarker::Done => 'x',
        }
    }
}

/// A subtask definition parsed from the decomposition todo list, before it
/// is materialized into a `Subtask`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskSpec {
    pub description: String,
    /// What the subtask is expected to produce. Empty when the todo item
    /// did not say.
    pub expected_output: String,
    pub marker: TodoMarker,
}

impl SubtaskSpec {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            expected_output: String::new(),
            marker: TodoMarker::Pending,
        }
    }

    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = expected.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskState {
    Pending,
    InfoGathering,
    Executing,
    Validating,
    Completed,
    Failed,
}

impl SubtaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtaskState::Pending => "pending",
            SubtaskState::InfoGathering => "info_gathering",
            SubtaskState::Executing => "executing",
            SubtaskState::Validating => "validating",
            SubtaskState::Completed => "completed",
            SubtaskState::Failed => "failed",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SubtaskState::Pending),
            "info_gathering" => Some(SubtaskState::InfoGathering),
            "executing" => Some(SubtaskState::Executing),
            "validating" => Some(SubtaskState::Validating),
            "completed" => Some(SubtaskState::Completed),
            "failed" => Some(SubtaskState::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubtaskState::Completed | SubtaskState::Failed)
    }
}

impl fmt::Display for SubtaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a subtask attempt ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Dispatch,
    ToolExecution,
    Generation,
    ValidationRejected,
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Dispatch => "dispatch",
            FailureKind::ToolExecution => "tool_execution",
            FailureKind::Generation => "generation",
            FailureKind::ValidationRejected => "validation_rejected",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Category of a non-fatal error recorded against a subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InfoGathering,
    Dispatch,
    ToolExecution,
    Generation,
    Validation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InfoGathering => "info_gathering",
            ErrorKind::Dispatch => "dispatch",
            ErrorKind::ToolExecution => "tool_execution",
            ErrorKind::Generation => "generation",
            ErrorKind::Validation => "validation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: SubtaskState,
    pub to: SubtaskState,
    pub at: DateTime<Utc>,
}

/// One unit of decomposed work inside a run.
///
/// State, context, mode, result and reports are only mutated through
/// `Lifecycle`, which encodes the legal transitions in its type parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub run_id: String,
    /// 0-based position within the run.
    pub position: u32,
    pub description: String,
    pub expected_output: String,
    pub(crate) context: ContextLog,
    pub(crate) state: SubtaskState,
    pub(crate) mode: Option<ExecutionMode>,
    pub(crate) result: Option<ExecutionResult>,
    pub(crate) reports: Vec<ValidationReport>,
    pub(crate) attempts: u32,
    pub(crate) failure: Option<Failure>,
    pub(crate) errors: Vec<ErrorRecord>,
    pub(crate) history: Vec<StateTransition>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subtask {
    pub fn new(run_id: impl Into<String>, position: u32, spec: &SubtaskSpec) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            position,
            description: spec.description.clone(),
            expected_output: spec.expected_output.clone(),
            context: ContextLog::new(),
            state: SubtaskState::Pending,
            mode: None,
            result: None,
            reports: Vec::new(),
            attempts: 0,
            failure: None,
            errors: Vec::new(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> SubtaskState {
        self.state
    }

    pub fn context(&self) -> &ContextLog {
        &self.context
    }

    pub fn mode(&self) -> Option<ExecutionMode> {
        self.mode
    }

    pub fn result(&self) -> Option<&ExecutionResult> {
        self.result.as_ref()
    }

    /// Payload of a successful result, if any.
    pub fn payload(&self) -> Option<&str> {
        self.result
            .as_ref()
            .filter(|r| r.success)
            .and_then(|r| r.payload.as_deref())
    }

    /// Latest validation report.
    pub fn validation(&self) -> Option<&ValidationReport> {
        self.reports.last()
    }

    /// Every report produced, oldest first.
    pub fn reports(&self) -> &[ValidationReport] {
        &self.reports
    }

    /// Number of times this subtask has entered `Executing`.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// Whether the subtask ever entered `state`.
    pub fn visited(&self, state: SubtaskState) -> bool {
        self.history.iter().any(|t| t.to == state)
    }

    /// Append to the error log. Errors are never removed.
    pub fn record_error(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.errors.push(ErrorRecord {
            kind,
            message: message.into(),
            at: Utc::now(),
        });
        self.updated_at = Utc::now();
    }
}
