// Excel import (xlsx, xls, xlsb, ods) via calamine. First worksheet only.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tallyguard_recon::{CellValue, Dataset};

use crate::error::LoadError;
use crate::parse_cell;

pub fn import(path: &Path) -> Result<Dataset, LoadError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| LoadError::Excel(format!("{}: {e}", path.display())))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let Some(first) = sheet_names.first() else {
        return Err(LoadError::NoSheets);
    };
    if sheet_names.len() > 1 {
        log::debug!("{}: reading sheet '{first}', ignoring {} other(s)", path.display(), sheet_names.len() - 1);
    }

    let range = workbook
        .worksheet_range(first)
        .map_err(|e| LoadError::Excel(format!("failed to read sheet '{first}': {e}")))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(header_text).collect(),
        None => return Err(LoadError::NoHeader(path.display().to_string())),
    };

    let records: Vec<Vec<CellValue>> = rows
        .map(|row| row.iter().map(cell_value).collect::<Vec<_>>())
        .filter(|row| !row.iter().all(CellValue::is_missing))
        .collect();

    Ok(Dataset::from_rows(headers, records))
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        other => other.to_string(),
    }
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Missing,
        Data::Float(n) if n.is_finite() => CellValue::Number(*n),
        Data::Float(_) => CellValue::Missing,
        Data::Int(n) => CellValue::Number(*n as f64),
        // stored-as-text numbers are common in exported ledgers
        Data::String(s) => parse_cell(s),
        Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.into()),
        Data::Error(e) => CellValue::Text(format!("#{e:?}")),
        // serial date number, same as the sheet stores it
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}
