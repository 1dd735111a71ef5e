pub(crate) mod migrations;
pub mod queries;

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;
use stepwise_core::{InfoExchange, Run, Subtask, ValidationReport};
use tracing::debug;

use crate::{DbError, Store};

/// Converts `rusqlite::Result<T>` into `Result<T, DbError>` so query code can
/// use `.to_db()?`.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    DbError::Internal(e.to_string())
}

/// Map a missing row to `NotFound(what)`, anything else to `Internal`.
pub(crate) fn not_found(what: String) -> impl FnOnce(rusqlite::Error) -> DbError {
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(what),
        other => map_sqlite_err(other),
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!("opening sqlite store at {}", path.display());
        let conn = Connection::open(path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().to_db()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").to_db()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn open_default() -> Result<Self, DbError> {
        Self::open_path(&crate::data_dir().join("stepwise.db"))
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&mut Connection) -> Result<T, DbError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))?;
        f(&mut conn)
    }

    fn run_migrations(&self) -> Result<(), DbError> {
        self.with_conn(|conn| migrations::run(conn))
    }
}

/// Run a sync query method on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, DbError>
where
    F: FnOnce() -> Result<T, DbError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DbError::Internal(e.to_string()))?
}

#[async_trait]
impl Store for SqliteStore {
    // -- Runs --
    async fn create_run(&self, run: &Run) -> Result<(), DbError> {
        let db = self.clone();
        let run = run.clone();
        blocking(move || db.create_run_sync(&run)).await
    }
    async fn get_run(&self, id: &str) -> Result<Run, DbError> {
        let db = self.clone();
        let id = id.to_string();
        blocking(move || db.get_run_sync(&id)).await
    }
    async fn update_run(&self, run: &Run) -> Result<(), DbError> {
        let db = self.clone();
        let run = run.clone();
        blocking(move || db.update_run_sync(&run)).await
    }
    async fn list_runs(&self) -> Result<Vec<Run>, DbError> {
        let db = self.clone();
        blocking(move || db.list_runs_sync()).await
    }
    async fn delete_run(&self, id: &str) -> Result<(), DbError> {
        let db = self.clone();
        let id = id.to_string();
        blocking(move || db.delete_run_sync(&id)).await
    }

    // -- Subtasks --
    async fn save_subtask(&self, subtask: &Subtask) -> Result<(), DbError> {
        let db = self.clone();
        let subtask = subtask.clone();
        blocking(move || db.save_subtask_sync(&subtask)).await
    }
    async fn get_subtask(&self, id: &str) -> Result<Subtask, DbError> {
        let db = self.clone();
        let id = id.to_string();
        blocking(move || db.get_subtask_sync(&id)).await
    }
    async fn list_subtasks(&self, run_id: &str) -> Result<Vec<Subtask>, DbError> {
        let db = self.clone();
        let run_id = run_id.to_string();
        blocking(move || db.list_subtasks_sync(&run_id)).await
    }

    // -- Validation reports --
    async fn append_validation_report(
        &self,
        subtask_id: &str,
        report: &ValidationReport,
    ) -> Result<(), DbError> {
        let db = self.clone();
        let subtask_id = subtask_id.to_string();
        let report = report.clone();
        blocking(move || db.append_validation_report_sync(&subtask_id, &report)).await
    }
    async fn list_validation_reports(
        &self,
        subtask_id: &str,
    ) -> Result<Vec<ValidationReport>, DbError> {
        let db = self.clone();
        let subtask_id = subtask_id.to_string();
        blocking(move || db.list_validation_reports_sync(&subtask_id)).await
    }

    // -- Info exchanges --
    async fn append_info_exchange(&self, exchange: &InfoExchange) -> Result<(), DbError> {
        let db = self.clone();
        let exchange = exchange.clone();
        blocking(move || db.append_info_exchange_sync(&exchange)).await
    }
    async fn list_info_exchanges(&self, subtask_id: &str) -> Result<Vec<InfoExchange>, DbError> {
        let db = self.clone();
        let subtask_id = subtask_id.to_string();
        blocking(move || db.list_info_exchanges_sync(&subtask_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_runs_migrations() {
        let db = SqliteStore::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type = 'table'
                     AND name IN ('runs', 'subtasks', 'validation_reports', 'info_exchanges')",
                    [],
                    |row| row.get(0),
                )
                .to_db()?;
            assert_eq!(count, 4);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn open_path_creates_file_and_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("stepwise.db");
        assert!(!db_path.exists());

        let _db = SqliteStore::open_path(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn migrations_are_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("stepwise.db");
        drop(SqliteStore::open_path(&db_path).unwrap());
        SqliteStore::open_path(&db_path).unwrap();
    }
}
