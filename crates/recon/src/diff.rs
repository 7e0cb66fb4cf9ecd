//! Difference columns.
//!
//! Self-compare mode produces a single derived column from the first two
//! criteria. Paired-source mode produces one `Difference <criterion>` column
//! per criterion whose two prefixed source columns are both present;
//! criteria without both columns are skipped.

use crate::config::ReconConfig;
use crate::dataset::{Column, Dataset};
use crate::error::ReconError;
use crate::normalize::coerce_numeric;

/// Prefix of paired-source diff column names.
pub const DIFFERENCE_PREFIX: &str = "Difference ";

/// A created difference column and the criterion it reports breaks under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffColumn {
    pub name: String,
    pub criterion: String,
}

impl DiffColumn {
    pub fn break_label(&self) -> String {
        format!("{} Break", self.criterion)
    }
}

/// Column pairing resolved from config, before any dataset is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffPlan {
    SelfCompare { derived_column: String },
    PairedSource { left_prefix: String, right_prefix: String },
}

impl DiffPlan {
    pub fn from_config(config: &ReconConfig) -> Result<Self, ReconError> {
        if config.compare_current_criteria_column {
            return Ok(Self::SelfCompare {
                derived_column: config.derived_column.clone(),
            });
        }

        let prefixes = config.db_prefixes();
        if prefixes.len() < 2 {
            return Err(ReconError::NeedsTwoDbColumns(config.db_columns.clone()));
        }
        Ok(Self::PairedSource {
            left_prefix: prefixes[0].to_string(),
            right_prefix: prefixes[1].to_string(),
        })
    }
}

/// Add the difference columns for `plan` and return them in creation order.
/// `criteria` must already be normalized.
///
/// The self-compare column reports breaks under the first criterion; paired
/// columns report under their own criterion.
pub fn compute_diffs(
    dataset: &mut Dataset,
    plan: &DiffPlan,
    criteria: &[String],
) -> Result<Vec<DiffColumn>, ReconError> {
    match plan {
        DiffPlan::SelfCompare { derived_column } => {
            if criteria.len() < 2 {
                return Err(ReconError::SelfCompareNeedsTwoCriteria { found: criteria.len() });
            }
            let values = subtract(dataset, &criteria[0], &criteria[1])?;
            dataset.set_column(Column::numeric(derived_column.clone(), values))?;
            Ok(vec![DiffColumn {
                name: derived_column.clone(),
                criterion: criteria[0].clone(),
            }])
        }
        DiffPlan::PairedSource { left_prefix, right_prefix } => {
            let mut created = Vec::new();
            for criterion in criteria {
                let left = paired_column_name(left_prefix, criterion);
                let right = paired_column_name(right_prefix, criterion);

                if !(dataset.has_column(&left) && dataset.has_column(&right)) {
                    log::debug!("skipping '{criterion}': need both '{left}' and '{right}'");
                    continue;
                }

                coerce_numeric(dataset, &left)?;
                coerce_numeric(dataset, &right)?;
                let values = subtract(dataset, &left, &right)?;
                let name = format!("{DIFFERENCE_PREFIX}{criterion}");
                dataset.set_column(Column::numeric(name.clone(), values))?;
                created.push(DiffColumn {
                    name,
                    criterion: criterion.clone(),
                });
            }
            Ok(created)
        }
    }
}

/// `"<prefix> <criterion>"` with surrounding whitespace trimmed.
pub fn paired_column_name(prefix: &str, criterion: &str) -> String {
    format!("{prefix} {criterion}").trim().to_string()
}

/// Row-wise `left - right`; a missing operand gives a missing result.
fn subtract(dataset: &Dataset, left: &str, right: &str) -> Result<Vec<Option<f64>>, ReconError> {
    let a = dataset.numeric_column(left)?;
    let b = dataset.numeric_column(right)?;
    Ok(a
        .into_iter()
        .zip(b)
        .map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) => Some(a - b),
            _ => None,
        })
        .collect())
}
