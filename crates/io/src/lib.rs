//! Getting datasets in and out: CSV / Excel loading, CSV export, and the
//! SQLite store of previously matched rows used as training history.

pub mod csv;
pub mod error;
pub mod history;
pub mod xlsx;

use std::path::Path;

use tallyguard_recon::{CellValue, Dataset};

pub use error::{HistoryError, LoadError};
pub use history::{SqliteHistoryStore, DEFAULT_HISTORY_LIMIT};

/// Load a tabular file, choosing the reader by extension. Anything that is
/// not a spreadsheet extension is read as delimited text.
pub fn load(path: &Path) -> Result<Dataset, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let dataset = match ext.as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => xlsx::import(path)?,
        "tsv" | "tab" => csv::import_with_delimiter(path, b'\t')?,
        _ => csv::import(path)?,
    };

    log::info!(
        "loaded {} row(s) x {} column(s) from {}",
        dataset.row_count(),
        dataset.columns().len(),
        path.display()
    );
    Ok(dataset)
}

/// Cell from a raw text field: blank is missing, a finite number is numeric,
/// anything else stays text.
pub(crate) fn parse_cell(field: &str) -> CellValue {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return CellValue::Missing;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::Text(field.to_string()),
    }
}
