use rusqlite::{params, OptionalExtension, Row};
use stepwise_core::Subtask;
use tracing::warn;

use super::super::{not_found, SqliteResultExt, SqliteStore};
use crate::DbError;

fn row_to_subtask(row: &Row) -> rusqlite::Result<Result<Subtask, DbError>> {
    let body: String = row.get("body")?;
    Ok(serde_json::from_str(&body).map_err(DbError::from))
}

impl SqliteStore {
    pub fn save_subtask_sync(&self, subtask: &Subtask) -> Result<(), DbError> {
        let body = serde_json::to_string(subtask)?;
        let attempted = subtask.context().len();
        self.with_conn(|conn| {
            let tx = conn.transaction().to_db()?;
            let stored: Option<i64> = tx
                .query_row(
                    "SELECT context_len FROM subtasks WHERE id = ?1",
                    params![subtask.id],
                    |row| row.get(0),
                )
                .optional()
                .to_db()?;
            if let Some(stored) = stored {
                let stored = stored as usize;
                if attempted < stored {
                    warn!(
                        "rejecting write to subtask {}: context {} -> {}",
                        subtask.id, stored, attempted
                    );
                    return Err(DbError::ContextRewrite {
                        subtask_id: subtask.id.clone(),
                        stored,
                        attempted,
                    });
                }
            }
            tx.execute(
                "INSERT INTO subtasks (id, run_id, position, state, context_len, body, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    state = excluded.state,
                    context_len = excluded.context_len,
                    body = excluded.body,
                    updated_at = excluded.updated_at",
                params![
                    subtask.id,
                    subtask.run_id,
                    subtask.position,
                    subtask.state().as_str(),
                    attempted as i64,
                    body,
                    subtask.updated_at
                ],
            )
            .to_db()?;
            tx.commit().to_db()
        })
    }

    pub fn get_subtask_sync(&self, id: &str) -> Result<Subtask, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT body FROM subtasks WHERE id = ?1",
                params![id],
                row_to_subtask,
            )
            .map_err(not_found(format!("subtask {id}")))?
        })
    }

    pub fn list_subtasks_sync(&self, run_id: &str) -> Result<Vec<Subtask>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT body FROM subtasks WHERE run_id = ?1 ORDER BY position ASC")
                .to_db()?;
            let rows = stmt
                .query_map(params![run_id], row_to_subtask)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            rows.into_iter().collect()
        })
    }
}
