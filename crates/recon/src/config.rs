use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Immutable snapshot of one reconciliation setup. Threaded by reference
/// into every pipeline call; never mutated during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconConfig {
    /// Identifying columns carried through untouched.
    #[serde(default)]
    pub key_columns: Vec<String>,
    pub criteria_columns: Vec<String>,
    #[serde(default = "default_derived_column")]
    pub derived_column: String,
    #[serde(default = "default_comment_column")]
    pub comment_column: String,
    /// Template with `{derived_value}` and `{historical_value}` placeholders.
    #[serde(default)]
    pub comment_prompt: String,
    /// `true` = self-compare (criteria[0] - criteria[1]),
    /// `false` = paired-source (prefix pair from `db_columns`).
    #[serde(default = "default_true")]
    pub compare_current_criteria_column: bool,
    #[serde(default)]
    pub db_columns: String,
    #[serde(default = "default_next_step_options")]
    pub next_step_options: BTreeMap<String, String>,
}

fn default_derived_column() -> String {
    "Balance Difference".into()
}

fn default_comment_column() -> String {
    "Comments".into()
}

fn default_true() -> bool {
    true
}

fn default_next_step_options() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("1".into(), "Send an Email".into()),
        ("2".into(), "Create a Jira Ticket".into()),
        ("3".into(), "Generate a Report".into()),
        ("4".into(), "Update Source".into()),
    ])
}

/// How the diff engine pairs columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    SelfCompare,
    PairedSource,
}

impl std::fmt::Display for CompareMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfCompare => write!(f, "self_compare"),
            Self::PairedSource => write!(f, "paired_source"),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_json(input: &str) -> Result<Self, ReconError> {
        serde_json::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))
    }

    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))
    }

    /// Load from a `.json` or `.toml` file, chosen by extension (JSON otherwise).
    pub fn from_path(path: &Path) -> Result<Self, ReconError> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| ReconError::Io(format!("cannot read {}: {e}", path.display())))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::from_toml(&input),
            _ => Self::from_json(&input),
        }
    }

    pub fn mode(&self) -> CompareMode {
        if self.compare_current_criteria_column {
            CompareMode::SelfCompare
        } else {
            CompareMode::PairedSource
        }
    }

    /// Prefixes from `db_columns`, split on `,` with no other cleanup.
    pub fn db_prefixes(&self) -> Vec<&str> {
        self.db_columns.split(',').collect()
    }

    /// Static checks that don't need a dataset. The pipeline re-checks
    /// against the actual columns at run time.
    pub fn validate(&self) -> Result<(), ReconError> {
        if self.criteria_columns.is_empty() {
            return Err(ReconError::ConfigValidation(
                "criteria_columns must list at least one column".into(),
            ));
        }

        match self.mode() {
            CompareMode::SelfCompare => {
                if self.criteria_columns.len() < 2 {
                    return Err(ReconError::SelfCompareNeedsTwoCriteria {
                        found: self.criteria_columns.len(),
                    });
                }
                if self.derived_column.trim().is_empty() {
                    return Err(ReconError::ConfigValidation(
                        "derived_column must not be empty".into(),
                    ));
                }
            }
            CompareMode::PairedSource => {
                if self.db_prefixes().len() < 2 {
                    return Err(ReconError::NeedsTwoDbColumns(self.db_columns.clone()));
                }
            }
        }

        if !self.comment_prompt.is_empty()
            && !(self.comment_prompt.contains("{derived_value}")
                && self.comment_prompt.contains("{historical_value}"))
        {
            log::warn!(
                "comment_prompt lacks {{derived_value}} or {{historical_value}}; comments will not reference row values"
            );
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
