pub mod attempts;
pub mod context;
pub mod error;
pub mod execution;
pub mod info;
pub mod lifecycle;
pub mod purpose;
pub mod run;
pub mod subtask;
pub mod validation;

pub use attempts::Attempts;
pub use context::{ContextEntry, ContextLog, ContextSource};
pub use error::CoreError;
pub use execution::{ExecutionMode, ExecutionResult, ToolCall, ToolSpec};
pub use info::{InfoExchange, InfoKind, InfoRequest, InfoResponse};
pub use lifecycle::Lifecycle;
pub use purpose::Purpose;
pub use run::{Deliverable, ResultSection, Run, RunStatus};
pub use subtask::{
    ErrorKind, ErrorRecord, Failure, FailureKind, StateTransition, Subtask, SubtaskSpec,
    SubtaskState, TodoMarker,
};
pub use validation::{ValidationReport, VerdictSource};
