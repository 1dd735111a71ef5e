#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::path::PathBuf;

use async_trait::async_trait;
use stepwise_core::{InfoExchange, Run, Subtask, ValidationReport};
use thiserror::Error;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A subtask write would shrink its append-only context log.
    #[error("subtask {subtask_id}: context has {stored} entries, refusing write with {attempted}")]
    ContextRewrite {
        subtask_id: String,
        stored: usize,
        attempted: usize,
    },
}

/// Persistence for runs and everything hanging off them.
///
/// Identifiers are assigned by the core; the store only keys on them.
/// Validation reports and info exchanges are append-only.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a run together with its subtasks.
    async fn create_run(&self, run: &Run) -> Result<(), DbError>;
    /// Load a run and its subtasks, ordered by position.
    async fn get_run(&self, id: &str) -> Result<Run, DbError>;
    /// Persist run-level fields (status, memory, deliverable, error).
    async fn update_run(&self, run: &Run) -> Result<(), DbError>;
    /// Runs newest first, without their subtasks.
    async fn list_runs(&self) -> Result<Vec<Run>, DbError>;
    /// Delete a run and, by cascade, every record under it.
    async fn delete_run(&self, id: &str) -> Result<(), DbError>;

    /// Upsert a subtask. Rejects writes whose context is shorter than the
    /// stored one.
    async fn save_subtask(&self, subtask: &Subtask) -> Result<(), DbError>;
    async fn get_subtask(&self, id: &str) -> Result<Subtask, DbError>;
    async fn list_subtasks(&self, run_id: &str) -> Result<Vec<Subtask>, DbError>;

    async fn append_validation_report(
        &self,
        subtask_id: &str,
        report: &ValidationReport,
    ) -> Result<(), DbError>;
    async fn list_validation_reports(
        &self,
        subtask_id: &str,
    ) -> Result<Vec<ValidationReport>, DbError>;

    async fn append_info_exchange(&self, exchange: &InfoExchange) -> Result<(), DbError>;
    async fn list_info_exchanges(&self, subtask_id: &str) -> Result<Vec<InfoExchange>, DbError>;
}

/// Default data directory: `$XDG_DATA_HOME/stepwise` or
/// `~/.local/share/stepwise`.
pub fn data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("stepwise")
}
