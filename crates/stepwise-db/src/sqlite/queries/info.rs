use rusqlite::{params, Row};
use stepwise_core::InfoExchange;

use super::super::{SqliteResultExt, SqliteStore};
use crate::DbError;

fn row_to_exchange(row: &Row) -> rusqlite::Result<Result<InfoExchange, DbError>> {
    let body: String = row.get("body")?;
    Ok(serde_json::from_str(&body).map_err(DbError::from))
}

impl SqliteStore {
    pub fn append_info_exchange_sync(&self, exchange: &InfoExchange) -> Result<(), DbError> {
        let body = serde_json::to_string(exchange)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO info_exchanges (subtask_id, round, kind, declined, body, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    exchange.subtask_id,
                    exchange.request.round,
                    exchange.request.kind.as_str(),
                    exchange.response.declined,
                    body,
                    exchange.recorded_at
                ],
            )
            .to_db()?;
            Ok(())
        })
    }

    pub fn list_info_exchanges_sync(&self, subtask_id: &str) -> Result<Vec<InfoExchange>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT body FROM info_exchanges WHERE subtask_id = ?1 ORDER BY id ASC")
                .to_db()?;
            let rows = stmt
                .query_map(params![subtask_id], row_to_exchange)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            rows.into_iter().collect()
        })
    }
}
