use rusqlite::{params, Connection, Row};
use stepwise_core::Run;

use super::super::{not_found, SqliteResultExt, SqliteStore};
use crate::DbError;

/// Run rows carry everything except subtasks, which live in their own table.
fn run_body(run: &Run) -> Result<String, DbError> {
    let mut value = serde_json::to_value(run)?;
    if let Some(obj) = value.as_object_mut() {
        obj.remove("subtasks");
    }
    Ok(value.to_string())
}

fn row_to_run(row: &Row) -> rusqlite::Result<Result<Run, DbError>> {
    let body: String = row.get("body")?;
    Ok(serde_json::from_str(&body).map_err(DbError::from))
}

fn load_run(conn: &Connection, id: &str) -> Result<Run, DbError> {
    conn.query_row(
        "SELECT body FROM runs WHERE id = ?1",
        params![id],
        row_to_run,
    )
    .map_err(not_found(format!("run {id}")))?
}

impl SqliteStore {
    pub fn create_run_sync(&self, run: &Run) -> Result<(), DbError> {
        let body = run_body(run)?;
        let subtasks = run
            .subtasks()
            .iter()
            .map(|s| -> Result<_, DbError> { Ok((s, serde_json::to_string(s)?)) })
            .collect::<Result<Vec<_>, DbError>>()?;
        self.with_conn(|conn| {
            let tx = conn.transaction().to_db()?;
            tx.execute(
                "INSERT INTO runs (id, requirement, status, body, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    run.id,
                    run.requirement,
                    run.status().as_str(),
                    body,
                    run.created_at,
                    run.updated_at
                ],
            )
            .to_db()?;
            for (subtask, body) in &subtasks {
                tx.execute(
                    "INSERT INTO subtasks (id, run_id, position, state, context_len, body, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        subtask.id,
                        subtask.run_id,
                        subtask.position,
                        subtask.state().as_str(),
                        subtask.context().len() as i64,
                        body,
                        subtask.updated_at
                    ],
                )
                .to_db()?;
            }
            tx.commit().to_db()
        })
    }

    pub fn get_run_sync(&self, id: &str) -> Result<Run, DbError> {
        let run = self.with_conn(|conn| load_run(conn, id))?;
        let subtasks = self.list_subtasks_sync(id)?;
        Ok(run.with_subtasks(subtasks))
    }

    pub fn update_run_sync(&self, run: &Run) -> Result<(), DbError> {
        let body = run_body(run)?;
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE runs SET status = ?1, body = ?2, updated_at = ?3 WHERE id = ?4",
                    params![run.status().as_str(), body, run.updated_at, run.id],
                )
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("run {}", run.id)));
            }
            Ok(())
        })
    }

    pub fn list_runs_sync(&self) -> Result<Vec<Run>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT body FROM runs ORDER BY created_at DESC")
                .to_db()?;
            let rows = stmt
                .query_map([], row_to_run)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            rows.into_iter().collect()
        })
    }

    pub fn delete_run_sync(&self, id: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM runs WHERE id = ?1", params![id])
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("run {id}")));
            }
            Ok(())
        })
    }
}
