use serde::Serialize;
use serde_json::{Map, Value};

use crate::dataset::Dataset;
use crate::diff::DiffColumn;
use crate::outlier::{AnomalyLabel, ArtifactId};

// ---------------------------------------------------------------------------
// Reconcile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub mode: String,
    pub engine_version: String,
    pub run_at: String,
    /// Creation time of the artifact used for scoring, if any.
    pub model_trained_at: Option<String>,
}

/// Everything one reconcile run produced. `dataset` is the full input with
/// the diff, `Match Status`, `Anomaly` and (when generated) comment columns
/// added; the row index lists partition it.
#[derive(Debug, Clone)]
pub struct ReconOutcome {
    pub meta: ReconMeta,
    pub dataset: Dataset,
    pub diff_columns: Vec<DiffColumn>,
    pub feature_columns: Vec<String>,
    pub labels: Vec<AnomalyLabel>,
    /// Rows labelled `No`.
    pub matched_rows: Vec<usize>,
    /// Rows labelled `Yes`.
    pub anomalous_rows: Vec<usize>,
    /// Rows labelled `Unknown` (no trained model).
    pub unscored_rows: Vec<usize>,
    pub comments_generated: usize,
}

impl ReconOutcome {
    pub fn processed_count(&self) -> usize {
        self.dataset.row_count()
    }

    pub fn anomalous_count(&self) -> usize {
        self.anomalous_rows.len()
    }

    pub fn matched_records(&self) -> Dataset {
        self.dataset.select_rows(&self.matched_rows)
    }

    pub fn anomalous_records(&self) -> Dataset {
        self.dataset.select_rows(&self.anomalous_rows)
    }

    pub fn to_response(&self) -> ReconResponse {
        ReconResponse {
            message: "Processing complete.".into(),
            processed_count: self.processed_count(),
            matched_count: self.matched_rows.len(),
            anomalous_count: self.anomalous_count(),
            unscored_count: self.unscored_rows.len(),
            anomalous_records: self.anomalous_rows.iter().map(|&i| self.dataset.row(i)).collect(),
            meta: self.meta.clone(),
        }
    }
}

/// Serialized reconcile result.
#[derive(Debug, Clone, Serialize)]
pub struct ReconResponse {
    pub message: String,
    pub processed_count: usize,
    pub matched_count: usize,
    pub anomalous_count: usize,
    pub unscored_count: usize,
    pub anomalous_records: Vec<Map<String, Value>>,
    pub meta: ReconMeta,
}

// ---------------------------------------------------------------------------
// Train
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainOutcome {
    Trained {
        artifact: ArtifactId,
        rows: usize,
        feature_columns: Vec<String>,
    },
    /// Nothing usable to train on; the current artifact was not touched.
    Skipped,
}

impl TrainOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::Trained { artifact, rows, .. } => {
                format!("Model has been updated with the current history file (artifact {artifact}, {rows} rows).")
            }
            Self::Skipped => "No historical data found; model left unchanged.".into(),
        }
    }
}
