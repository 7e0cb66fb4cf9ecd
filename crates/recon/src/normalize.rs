//! Column label cleanup and numeric coercion of criteria columns.

use crate::dataset::{CellValue, Dataset};
use crate::error::ReconError;

/// Trim every column label, keep the criteria columns that exist, and coerce
/// them to numbers. Returns the retained criteria in configured order.
///
/// Fails before touching the dataset when no criteria column is present.
pub fn normalize(dataset: &mut Dataset, criteria_columns: &[String]) -> Result<Vec<String>, ReconError> {
    let present = present_criteria(dataset, criteria_columns);
    if present.is_empty() {
        return Err(ReconError::NoValidCriteriaColumns {
            configured: criteria_columns.to_vec(),
        });
    }

    dataset.trim_column_names();

    for name in &present {
        let missing = coerce_numeric(dataset, name)?;
        if missing > 0 {
            log::debug!("criteria column '{name}': {missing} value(s) missing after numeric coercion");
        }
    }

    Ok(present)
}

/// Configured criteria whose trimmed label exists in `dataset`, in
/// configured order. Does not modify the dataset.
pub fn present_criteria(dataset: &Dataset, criteria_columns: &[String]) -> Vec<String> {
    criteria_columns
        .iter()
        .filter(|c| dataset.column_names().any(|name| name.trim() == c.as_str()))
        .cloned()
        .collect()
}

/// Coerce a column in place. Unparseable values become missing; never fails
/// per value. Returns how many cells are missing afterwards.
pub fn coerce_numeric(dataset: &mut Dataset, name: &str) -> Result<usize, ReconError> {
    let column = dataset
        .column_mut(name)
        .ok_or_else(|| ReconError::MissingColumn(name.to_string()))?;

    let mut missing = 0;
    for value in column.values.iter_mut() {
        let coerced = CellValue::from(value.coerce_number());
        if coerced.is_missing() {
            missing += 1;
        }
        *value = coerced;
    }
    Ok(missing)
}
