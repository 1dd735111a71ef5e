use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("expected state {expected}, found {found}")]
    UnexpectedState { expected: String, found: String },

    #[error("execution mode already recorded as {0}")]
    ModeAlreadyRecorded(String),
}
