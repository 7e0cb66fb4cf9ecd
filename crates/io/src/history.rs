// Matched-row history in SQLite

use std::path::Path;

use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use tallyguard_recon::{CellValue, Dataset};

use crate::error::HistoryError;

/// Rows read back when training without an explicit history file.
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS matched_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recorded_at TEXT NOT NULL,
    row_json TEXT NOT NULL       -- one dataset row, column order preserved
);
"#;

/// Append-only store of rows the model labelled as normal. Rows are kept as
/// JSON objects so files with different column sets can share one table.
pub struct SqliteHistoryStore {
    conn: Connection,
}

impl SqliteHistoryStore {
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("cannot create {}: {e}", parent.display());
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, HistoryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Record every row of `rows`. Returns how many were written.
    pub fn append(&mut self, rows: &Dataset) -> Result<usize, HistoryError> {
        let recorded_at = chrono::Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT INTO matched_records (recorded_at, row_json) VALUES (?1, ?2)")?;
            for i in 0..rows.row_count() {
                let json = serde_json::to_string(&rows.row(i)).map_err(|e| HistoryError::Encode(e.to_string()))?;
                stmt.execute(params![recorded_at, json])?;
            }
        }
        tx.commit()?;
        log::info!("recorded {} matched row(s)", rows.row_count());
        Ok(rows.row_count())
    }

    pub fn count(&self) -> Result<usize, HistoryError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM matched_records", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    /// The newest `limit` rows, oldest first. Columns are the union of all
    /// rows' keys in first-seen order; absent keys become missing cells.
    pub fn load_recent(&self, limit: usize) -> Result<Dataset, HistoryError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, row_json FROM matched_records ORDER BY id DESC LIMIT ?1")?;
        let mut raw: Vec<(i64, String)> = stmt
            .query_map(params![limit as i64], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<_, _>>()?;
        raw.reverse();

        let mut objects = Vec::with_capacity(raw.len());
        for (id, json) in raw {
            let object: Map<String, Value> = serde_json::from_str(&json).map_err(|e| HistoryError::BadRow {
                id,
                message: e.to_string(),
            })?;
            objects.push(object);
        }

        let mut headers: Vec<String> = Vec::new();
        for object in &objects {
            for key in object.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }

        let rows = objects
            .iter()
            .map(|object| {
                headers
                    .iter()
                    .map(|h| object.get(h).map(json_cell).unwrap_or(CellValue::Missing))
                    .collect()
            })
            .collect();

        log::debug!("loaded {} history row(s)", objects.len());
        Ok(Dataset::from_rows(headers, rows))
    }
}

fn json_cell(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Missing,
        Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Missing),
        Value::String(s) => CellValue::Text(s.clone()),
        Value::Bool(b) => CellValue::Text(b.to_string()),
        other => CellValue::Text(other.to_string()),
    }
}
