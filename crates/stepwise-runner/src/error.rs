use stepwise_core::{CoreError, Purpose};
use stepwise_db::DbError;
use thiserror::Error;

/// Reasoning Port output that does not have the shape its purpose requires.
#[derive(Debug, Error)]
#[error("unparseable {purpose} response: {message}")]
pub struct FormatError {
    pub purpose: Purpose,
    pub message: String,
}

impl FormatError {
    pub fn new(purpose: Purpose, message: impl Into<String>) -> Self {
        Self {
            purpose,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Fatal to the run.
    #[error("decomposition failed: {0}")]
    Decomposition(String),

    #[error("info gathering failed: {0}")]
    InfoGathering(String),

    #[error("dispatch failed: {0}")]
    Dispatch(String),

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("validation unavailable: {0}")]
    Validation(String),

    #[error("integration failed: {0}")]
    Integration(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid plan edit: {0}")]
    InvalidEdit(String),

    #[error("store error: {0}")]
    Store(#[from] DbError),

    #[error(transparent)]
    State(#[from] CoreError),
}
