//! End-to-end reconcile and train runs.
//!
//! ```text
//! normalize -> diff -> classify -> features -> predict -> narrate -> partition
//! ```
//!
//! Every config-shaped failure is raised before the dataset is mutated.

use crate::classify::apply_match_status;
use crate::config::{CompareMode, ReconConfig};
use crate::dataset::{CellValue, Column, Dataset};
use crate::diff::{compute_diffs, DiffColumn, DiffPlan};
use crate::error::ReconError;
use crate::model::{ReconMeta, ReconOutcome, TrainOutcome};
use crate::narrative::{render_prompt, Narrator};
use crate::normalize::{normalize, present_criteria};
use crate::outlier::{self, anomaly_column, AnomalyLabel, ArtifactStore};

/// Reference value substituted for `{historical_value}`.
const HISTORICAL_REFERENCE: f64 = 0.0;

/// Dataset after normalize, diff and classify.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub criteria: Vec<String>,
    pub diffs: Vec<DiffColumn>,
    /// Columns the outlier model scores: raw criteria in self-compare mode,
    /// diff columns in paired-source mode.
    pub features: Vec<String>,
}

pub fn prepare(config: &ReconConfig, dataset: &mut Dataset) -> Result<Prepared, ReconError> {
    let plan = DiffPlan::from_config(config)?;
    if config.mode() == CompareMode::SelfCompare {
        let found = present_criteria(dataset, &config.criteria_columns).len();
        // zero present is reported by normalize
        if found == 1 || config.criteria_columns.len() < 2 {
            return Err(ReconError::SelfCompareNeedsTwoCriteria { found });
        }
    }

    let criteria = normalize(dataset, &config.criteria_columns)?;
    let diffs = compute_diffs(dataset, &plan, &criteria)?;
    apply_match_status(dataset, &diffs)?;

    let features = match config.mode() {
        CompareMode::SelfCompare => criteria.clone(),
        CompareMode::PairedSource => diffs.iter().map(|d| d.name.clone()).collect(),
    };
    log::debug!(
        "prepared {} row(s): {} diff column(s), features {:?}",
        dataset.row_count(),
        diffs.len(),
        features
    );

    Ok(Prepared {
        criteria,
        diffs,
        features,
    })
}

/// Reconcile one dataset against the store's current model.
///
/// `narrator` is optional; without one no comment column is added.
pub fn reconcile(
    config: &ReconConfig,
    mut dataset: Dataset,
    store: &ArtifactStore,
    narrator: Option<&Narrator>,
) -> Result<ReconOutcome, ReconError> {
    let prepared = prepare(config, &mut dataset)?;

    let artifact = store.load_current()?;
    let labels = if prepared.features.is_empty() {
        log::info!("no feature columns to score; every row is unscored");
        vec![AnomalyLabel::Unknown; dataset.row_count()]
    } else {
        outlier::predict_with(artifact.as_ref(), &dataset, &prepared.features)?
    };
    dataset.set_column(anomaly_column(&labels))?;

    let mut matched_rows = Vec::new();
    let mut anomalous_rows = Vec::new();
    let mut unscored_rows = Vec::new();
    for (row, label) in labels.iter().enumerate() {
        match label {
            AnomalyLabel::No => matched_rows.push(row),
            AnomalyLabel::Yes => anomalous_rows.push(row),
            AnomalyLabel::Unknown => unscored_rows.push(row),
        }
    }

    let mut comments_generated = 0;
    if config.mode() == CompareMode::SelfCompare && !anomalous_rows.is_empty() {
        if let Some(narrator) = narrator {
            comments_generated = narrate(config, &mut dataset, &anomalous_rows, narrator)?;
        }
    }

    log::info!(
        "reconciled {} row(s): {} matched, {} anomalous, {} unscored",
        dataset.row_count(),
        matched_rows.len(),
        anomalous_rows.len(),
        unscored_rows.len()
    );

    Ok(ReconOutcome {
        meta: ReconMeta {
            mode: config.mode().to_string(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            model_trained_at: artifact.map(|a| a.created_at),
        },
        dataset,
        diff_columns: prepared.diffs,
        feature_columns: prepared.features,
        labels,
        matched_rows,
        anomalous_rows,
        unscored_rows,
        comments_generated,
    })
}

/// Fill the comment column for `rows`; other rows stay missing.
fn narrate(
    config: &ReconConfig,
    dataset: &mut Dataset,
    rows: &[usize],
    narrator: &Narrator,
) -> Result<usize, ReconError> {
    let derived = dataset.numeric_column(&config.derived_column)?;
    let prompts: Vec<String> = rows
        .iter()
        .map(|&row| render_prompt(&config.comment_prompt, derived[row], HISTORICAL_REFERENCE))
        .collect();

    let comments = narrator.comments(&prompts);

    let mut values = vec![CellValue::Missing; dataset.row_count()];
    for (&row, comment) in rows.iter().zip(&comments) {
        values[row] = CellValue::Text(comment.clone());
    }
    dataset.set_column(Column::new(config.comment_column.clone(), values))?;
    Ok(comments.len())
}

/// Train the model on `history`, prepared the same way as a reconcile input.
pub fn train(config: &ReconConfig, mut history: Dataset, store: &ArtifactStore) -> Result<TrainOutcome, ReconError> {
    if history.is_empty() {
        log::info!("history is empty, model left unchanged");
        return Ok(TrainOutcome::Skipped);
    }

    let prepared = prepare(config, &mut history)?;
    if prepared.features.is_empty() {
        log::info!("history has no feature columns, model left unchanged");
        return Ok(TrainOutcome::Skipped);
    }

    match outlier::train(&history, &prepared.features, store)? {
        Some(published) => Ok(TrainOutcome::Trained {
            artifact: published.id,
            rows: published.training_rows,
            feature_columns: prepared.features,
        }),
        None => Ok(TrainOutcome::Skipped),
    }
}
