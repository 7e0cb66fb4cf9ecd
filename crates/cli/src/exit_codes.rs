//! CLI Exit Code Registry
//!
//! Single source of truth for `tguard` exit codes. Scripts rely on these.
//!
//! | Code | Meaning                                           |
//! |------|---------------------------------------------------|
//! | 0    | Success                                           |
//! | 1    | Anomalies found (`reconcile --strict` only)       |
//! | 2    | Usage error (bad arguments)                       |
//! | 3    | Invalid reconciliation config                     |
//! | 4    | Input file could not be loaded                    |
//! | 5    | Model artifact error                              |
//! | 6    | Runtime error (history store, output, LLM client) |

use tallyguard_io::{HistoryError, LoadError};
use tallyguard_llm_client::LlmError;
use tallyguard_recon::{ModelError, ReconError};

use crate::CliError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// `reconcile --strict` labelled at least one row anomalous.
pub const EXIT_ANOMALIES: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Config failed to parse or validate, or does not fit the input columns.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Input or history file missing, unreadable, or malformed.
pub const EXIT_INPUT: u8 = 4;

/// Model artifact could not be read, written, or applied.
pub const EXIT_MODEL: u8 = 5;

/// Anything else that went wrong while running.
pub const EXIT_RUNTIME: u8 = 6;

pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        e if e.is_config_error() => EXIT_INVALID_CONFIG,
        ReconError::UnknownOption { .. } => EXIT_USAGE,
        ReconError::Io(_) => EXIT_INPUT,
        ReconError::Model(_) => EXIT_MODEL,
        _ => EXIT_RUNTIME,
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::NoValidCriteriaColumns { .. } => {
                Some("criteria_columns must name columns of the input file (labels are trimmed)".to_string())
            }
            ReconError::UnknownOption { .. } => Some("run `tguard options list` to see the configured keys".to_string()),
            ReconError::NeedsTwoDbColumns(_) => Some("set db_columns to e.g. \"Current,Prior\"".to_string()),
            ReconError::Model(ModelError::FeatureMismatch { .. }) => {
                Some("the input yields different feature columns than the trained model; retrain with `tguard train` on matching history".to_string())
            }
            _ => None,
        };
        Self {
            code: recon_exit_code(&err),
            message: err.to_string(),
            hint,
        }
    }
}

impl From<ModelError> for CliError {
    fn from(err: ModelError) -> Self {
        Self {
            code: EXIT_MODEL,
            message: err.to_string(),
            hint: None,
        }
    }
}

impl From<LoadError> for CliError {
    fn from(err: LoadError) -> Self {
        let code = match err {
            LoadError::Write { .. } => EXIT_RUNTIME,
            _ => EXIT_INPUT,
        };
        Self {
            code,
            message: err.to_string(),
            hint: None,
        }
    }
}

impl From<HistoryError> for CliError {
    fn from(err: HistoryError) -> Self {
        Self {
            code: EXIT_RUNTIME,
            message: err.to_string(),
            hint: Some("check --history-db / TALLYGUARD_HISTORY_DB".to_string()),
        }
    }
}

impl From<LlmError> for CliError {
    fn from(err: LlmError) -> Self {
        let hint = match err {
            LlmError::Network(_) | LlmError::Timeout(_) => {
                Some("is the Ollama server running? see --llm-endpoint / TALLYGUARD_LLM_ENDPOINT".to_string())
            }
            _ => None,
        };
        Self {
            code: EXIT_RUNTIME,
            message: err.to_string(),
            hint,
        }
    }
}
