//! Unsupervised anomaly scoring: standard scaler + isolation forest.
//!
//! `train` fits on a historical dataset and publishes the pair as one
//! artifact; `predict` loads the current artifact and labels rows. With no
//! artifact every row is `Unknown`.

mod forest;
mod scaler;
mod store;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::{Column, Dataset};

pub use forest::{ForestParams, IsolationForest};
pub use scaler::StandardScaler;
pub use store::{ArtifactId, ArtifactStore};

pub const ANOMALY_COLUMN: &str = "Anomaly";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model store IO error: {0}")]
    Io(String),
    #[error("cannot serialize model artifact: {0}")]
    Serialize(String),
    #[error("corrupt model artifact {0}")]
    CorruptArtifact(String),
    #[error("unsupported model artifact format version {0} (expected {FORMAT_VERSION})")]
    UnsupportedVersion(u32),
    #[error("feature column '{0}' not found")]
    MissingFeature(String),
    #[error("model was trained on features {expected:?}, this run has {found:?}")]
    FeatureMismatch { expected: Vec<String>, found: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyLabel {
    Yes,
    No,
    Unknown,
}

impl AnomalyLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for AnomalyLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trained (scaler, model) pair plus what it was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub created_at: String,
    pub feature_columns: Vec<String>,
    pub training_rows: usize,
    pub scaler: StandardScaler,
    pub forest: IsolationForest,
}

impl ModelArtifact {
    /// Fit on `history`. Rows with any missing or non-finite feature are
    /// skipped; `None` when no usable row remains.
    pub fn fit(history: &Dataset, features: &[String], params: &ForestParams) -> Result<Option<Self>, ModelError> {
        let columns = feature_values(history, features)?;

        let rows: Vec<Vec<f64>> = (0..history.row_count())
            .filter_map(|row| columns.iter().map(|c| c[row]).collect::<Option<Vec<f64>>>())
            .collect();

        let skipped = history.row_count() - rows.len();
        if skipped > 0 {
            log::warn!("training skipped {skipped} row(s) with missing feature values");
        }

        let Some(scaler) = StandardScaler::fit(&rows) else {
            return Ok(None);
        };
        let scaled: Vec<Vec<f64>> = rows.iter().map(|r| scaler.transform(r)).collect();
        let forest = IsolationForest::fit(&scaled, params);

        Ok(Some(Self {
            format_version: FORMAT_VERSION,
            created_at: chrono::Utc::now().to_rfc3339(),
            feature_columns: features.to_vec(),
            training_rows: rows.len(),
            scaler,
            forest,
        }))
    }

    /// Label each row with the persisted scaler and model. Missing feature
    /// values are imputed with the training mean.
    ///
    /// `features` must name the same columns the model was trained on; they
    /// are read in training order whatever order the caller lists them in.
    pub fn predict(&self, dataset: &Dataset, features: &[String]) -> Result<Vec<AnomalyLabel>, ModelError> {
        let same_set = features.len() == self.feature_columns.len()
            && self.feature_columns.iter().all(|f| features.contains(f));
        if !same_set {
            return Err(ModelError::FeatureMismatch {
                expected: self.feature_columns.clone(),
                found: features.to_vec(),
            });
        }

        let features = self.feature_columns.as_slice();
        let columns = feature_values(dataset, features)?;
        let labels = (0..dataset.row_count())
            .map(|row| {
                let raw: Vec<Option<f64>> = columns.iter().map(|c| c[row]).collect();
                let scaled = self.scaler.transform_partial(&raw);
                if self.forest.is_outlier(&scaled) {
                    AnomalyLabel::Yes
                } else {
                    AnomalyLabel::No
                }
            })
            .collect();
        Ok(labels)
    }
}

/// A freshly published artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub id: ArtifactId,
    pub training_rows: usize,
}

/// Train on `history` and publish the artifact. An empty history is a no-op
/// that leaves the current artifact untouched.
pub fn train(
    history: &Dataset,
    features: &[String],
    store: &ArtifactStore,
) -> Result<Option<Published>, ModelError> {
    if history.is_empty() {
        log::info!("empty history, model left unchanged");
        return Ok(None);
    }

    match ModelArtifact::fit(history, features, &ForestParams::default())? {
        Some(artifact) => {
            let id = store.publish(&artifact)?;
            Ok(Some(Published {
                id,
                training_rows: artifact.training_rows,
            }))
        }
        None => {
            log::info!("no complete history rows, model left unchanged");
            Ok(None)
        }
    }
}

/// Label every row with the store's current artifact. Without a trained
/// artifact every row is `Unknown`.
pub fn predict(
    dataset: &Dataset,
    features: &[String],
    store: &ArtifactStore,
) -> Result<Vec<AnomalyLabel>, ModelError> {
    predict_with(store.load_current()?.as_ref(), dataset, features)
}

/// Same as [`predict`] for an artifact the caller already loaded.
pub fn predict_with(
    artifact: Option<&ModelArtifact>,
    dataset: &Dataset,
    features: &[String],
) -> Result<Vec<AnomalyLabel>, ModelError> {
    match artifact {
        Some(artifact) => artifact.predict(dataset, features),
        None => {
            log::info!("no trained model, labelling {} row(s) Unknown", dataset.row_count());
            Ok(vec![AnomalyLabel::Unknown; dataset.row_count()])
        }
    }
}

pub fn anomaly_column(labels: &[AnomalyLabel]) -> Column {
    Column::text(ANOMALY_COLUMN, labels.iter().map(|l| l.as_str().to_string()).collect())
}

fn feature_values(dataset: &Dataset, features: &[String]) -> Result<Vec<Vec<Option<f64>>>, ModelError> {
    features
        .iter()
        .map(|name| -> Result<Vec<Option<f64>>, ModelError> {
            let column = dataset
                .column(name)
                .ok_or_else(|| ModelError::MissingFeature(name.clone()))?;
            Ok(column
                .values
                .iter()
                .map(|v| v.as_number().filter(|n| n.is_finite()))
                .collect())
        })
        .collect()
}
