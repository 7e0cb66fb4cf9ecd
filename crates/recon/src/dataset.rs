//! Column-oriented in-memory table.
//!
//! Every column shares the dataset's row count and row order. Row order is
//! never changed by any pipeline stage; labels, differences and comments are
//! all index-aligned to the rows as loaded.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::ReconError;

/// A single cell. Loaders produce numbers and text; missing marks an empty
/// cell or a value that failed numeric coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if !n.is_nan() => Some(*n),
            _ => None,
        }
    }

    /// Numeric view of the cell: numbers pass through, text is parsed after
    /// trimming, anything else is missing.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if !n.is_nan() => Some(*n),
            Self::Number(_) | Self::Missing => None,
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Number(n) => n.is_nan(),
            Self::Text(_) => false,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Text(s) => Value::String(s.clone()),
            Self::Missing => Value::Null,
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<Option<f64>> for CellValue {
    fn from(n: Option<f64>) -> Self {
        n.map(Self::Number).unwrap_or(Self::Missing)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) if n.is_nan() => Ok(()),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Missing => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        Self { name: name.into(), values }
    }

    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self::new(name, values.into_iter().map(CellValue::from).collect())
    }

    pub fn text(name: impl Into<String>, values: Vec<String>) -> Self {
        Self::new(name, values.into_iter().map(CellValue::Text).collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from whole columns. All columns must have the same length.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, ReconError> {
        let mut dataset = Self::new();
        for column in columns {
            dataset.set_column(column)?;
        }
        Ok(dataset)
    }

    /// Build from a header row and record rows. Short rows are padded with
    /// missing cells; extra trailing cells are dropped.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let row_count = rows.len();
        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(row_count)))
            .collect();

        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.values.push(cells.next().unwrap_or(CellValue::Missing));
            }
        }

        Self { columns, row_count }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Replace the column with the same name, or append a new one.
    pub fn set_column(&mut self, column: Column) -> Result<(), ReconError> {
        if self.columns.is_empty() {
            self.row_count = column.values.len();
        } else if column.values.len() != self.row_count {
            return Err(ReconError::RowCountMismatch {
                column: column.name,
                expected: self.row_count,
                found: column.values.len(),
            });
        }

        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Numeric view of a column (no coercion of text).
    pub fn numeric_column(&self, name: &str) -> Result<Vec<Option<f64>>, ReconError> {
        let column = self
            .column(name)
            .ok_or_else(|| ReconError::MissingColumn(name.to_string()))?;
        Ok(column.values.iter().map(CellValue::as_number).collect())
    }

    pub fn trim_column_names(&mut self) {
        for column in &mut self.columns {
            let trimmed = column.name.trim();
            if trimmed.len() != column.name.len() {
                column.name = trimmed.to_string();
            }
        }
    }

    /// One row as an ordered `column -> value` map.
    pub fn row(&self, index: usize) -> Map<String, Value> {
        self.columns
            .iter()
            .map(|c| {
                let value = c.values.get(index).map(CellValue::to_json).unwrap_or(Value::Null);
                (c.name.clone(), value)
            })
            .collect()
    }

    /// New dataset holding only the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Dataset {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: indices
                    .iter()
                    .map(|&i| c.values.get(i).cloned().unwrap_or(CellValue::Missing))
                    .collect(),
            })
            .collect();

        Dataset {
            columns,
            row_count: indices.len(),
        }
    }
}
