use rusqlite::{params, Row};
use stepwise_core::ValidationReport;

use super::super::{SqliteResultExt, SqliteStore};
use crate::DbError;

fn row_to_report(row: &Row) -> rusqlite::Result<Result<ValidationReport, DbError>> {
    let body: String = row.get("body")?;
    Ok(serde_json::from_str(&body).map_err(DbError::from))
}

impl SqliteStore {
    pub fn append_validation_report_sync(
        &self,
        subtask_id: &str,
        report: &ValidationReport,
    ) -> Result<(), DbError> {
        let body = serde_json::to_string(report)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO validation_reports
                    (subtask_id, attempt, is_valid, score, source, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    subtask_id,
                    report.attempt,
                    report.is_valid,
                    report.score,
                    report.source.as_str(),
                    body,
                    report.created_at
                ],
            )
            .to_db()?;
            Ok(())
        })
    }

    pub fn list_validation_reports_sync(
        &self,
        subtask_id: &str,
    ) -> Result<Vec<ValidationReport>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT body FROM validation_reports WHERE subtask_id = ?1 ORDER BY id ASC",
                )
                .to_db()?;
            let rows = stmt
                .query_map(params![subtask_id], row_to_report)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            rows.into_iter().collect()
        })
    }
}
