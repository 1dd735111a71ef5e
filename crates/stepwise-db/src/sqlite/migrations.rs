use rusqlite::Connection;

use super::SqliteResultExt;
use crate::DbError;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    // Idempotent; safe to run on every open.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS runs (
            id          TEXT PRIMARY KEY,
            requirement TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'pending'
                            CHECK(status IN ('pending', 'running', 'completed', 'failed')),
            body        TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS subtasks (
            id          TEXT PRIMARY KEY,
            run_id      TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
            position    INTEGER NOT NULL,
            state       TEXT NOT NULL
                            CHECK(state IN (
                                'pending', 'info_gathering', 'executing',
                                'validating', 'completed', 'failed'
                            )),
            context_len INTEGER NOT NULL DEFAULT 0,
            body        TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_subtasks_run_position
            ON subtasks(run_id, position);

        CREATE TABLE IF NOT EXISTS validation_reports (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            subtask_id  TEXT NOT NULL REFERENCES subtasks(id) ON DELETE CASCADE,
            attempt     INTEGER NOT NULL,
            is_valid    INTEGER NOT NULL,
            score       REAL NOT NULL,
            source      TEXT NOT NULL,
            body        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_reports_subtask ON validation_reports(subtask_id);

        CREATE TABLE IF NOT EXISTS info_exchanges (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            subtask_id  TEXT NOT NULL REFERENCES subtasks(id) ON DELETE CASCADE,
            round       INTEGER NOT NULL,
            kind        TEXT NOT NULL,
            declined    INTEGER NOT NULL DEFAULT 0,
            body        TEXT NOT NULL,
            recorded_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_info_subtask ON info_exchanges(subtask_id);
        ",
    )
    .to_db()?;
    Ok(())
}
