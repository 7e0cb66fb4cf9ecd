use crate::dataset::{Column, Dataset};
use crate::diff::DiffColumn;
use crate::error::ReconError;

pub const MATCH_STATUS_COLUMN: &str = "Match Status";
pub const MATCH: &str = "Match";

/// Per-row status from the diff columns, scanned in creation order.
///
/// The first nonzero diff decides the label (`"<criterion> Break"`);
/// magnitude of later columns is irrelevant. A missing diff counts as
/// nonzero. No nonzero diff, or no diff columns at all, gives `"Match"`.
pub fn classify_rows(dataset: &Dataset, diffs: &[DiffColumn]) -> Result<Vec<String>, ReconError> {
    let values: Vec<Vec<Option<f64>>> = diffs
        .iter()
        .map(|d| dataset.numeric_column(&d.name))
        .collect::<Result<_, _>>()?;
    let labels: Vec<String> = diffs.iter().map(DiffColumn::break_label).collect();

    let mut statuses = Vec::with_capacity(dataset.row_count());
    for row in 0..dataset.row_count() {
        let mut status = MATCH.to_string();
        for (column, label) in values.iter().zip(&labels) {
            if column[row] != Some(0.0) {
                status = label.clone();
                break;
            }
        }
        statuses.push(status);
    }
    Ok(statuses)
}

/// Classify and store the result in the `Match Status` column.
pub fn apply_match_status(dataset: &mut Dataset, diffs: &[DiffColumn]) -> Result<(), ReconError> {
    let statuses = classify_rows(dataset, diffs)?;
    dataset.set_column(Column::text(MATCH_STATUS_COLUMN, statuses))
}
