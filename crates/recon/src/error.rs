use thiserror::Error;

use crate::narrative::GenerationError;
use crate::outlier::ModelError;

#[derive(Debug, Error)]
pub enum ReconError {
    /// JSON / TOML parse or deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Static config validation error.
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// None of the configured criteria columns exist in the dataset.
    #[error("no valid criteria columns found in dataset (configured: {configured:?})")]
    NoValidCriteriaColumns { configured: Vec<String> },
    /// Self-compare mode subtracts criteria[1] from criteria[0].
    #[error("self-compare mode needs at least two criteria columns present, found {found}")]
    SelfCompareNeedsTwoCriteria { found: usize },
    /// Paired-source mode needs two comma-separated prefixes in `db_columns`.
    #[error("please provide at least two column prefixes in 'db_columns' (comma-separated), got '{0}'")]
    NeedsTwoDbColumns(String),
    /// A column the caller asked for does not exist.
    #[error("missing column '{0}'")]
    MissingColumn(String),
    /// A column was built with the wrong number of rows.
    #[error("column '{column}' has {found} rows, dataset has {expected}")]
    RowCountMismatch { column: String, expected: usize, found: usize },
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Narrative worker pool could not be started.
    #[error("narrative pool error: {0}")]
    NarrativePool(String),
    /// `next_step_options` has no such key.
    #[error("unknown next-step option '{key}' (available: {known:?})")]
    UnknownOption { key: String, known: Vec<String> },
    /// Text generation failed outside the per-row narrative fallback.
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("next-step code scan failed: {0}")]
    NextStep(String),
    /// IO error (config read, etc.).
    #[error("IO error: {0}")]
    Io(String),
}

impl ReconError {
    /// True for errors caused by the config / input shape rather than the runtime.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse(_)
                | Self::ConfigValidation(_)
                | Self::NoValidCriteriaColumns { .. }
                | Self::SelfCompareNeedsTwoCriteria { .. }
                | Self::NeedsTwoDbColumns(_)
        )
    }
}
