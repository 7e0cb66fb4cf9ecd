use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },
    #[error("CSV parse error: {0}")]
    Csv(String),
    #[error("failed to open Excel file: {0}")]
    Excel(String),
    #[error("Excel file contains no sheets")]
    NoSheets,
    #[error("{0} has no header row")]
    NoHeader(String),
    #[error("cannot write {path}: {message}")]
    Write { path: String, message: String },
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("history row {id} is not a JSON object: {message}")]
    BadRow { id: i64, message: String },
    #[error("cannot encode history row: {0}")]
    Encode(String),
}
