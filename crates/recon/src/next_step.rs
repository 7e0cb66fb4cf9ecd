//! Follow-up actions for reviewed rows.
//!
//! Selecting one of the configured `next_step_options` asks the text
//! generator for a Python function that performs the action and reads its
//! parameters with `input(...)`. The prompt strings of those calls are the
//! fields a reviewer has to fill in.

use regex::Regex;
use serde::Serialize;

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::narrative::TextGenerator;

/// `input("Recipient")` / `input( 'Amount' )`; the quoted prompt is captured.
const INPUT_CALL: &str = r#"input\s*\(\s*["'](.*?)["']\s*\)"#;

/// Generated code for one selected follow-up action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextStepPlan {
    pub option: String,
    pub action: String,
    pub message: String,
    pub generated_code: String,
    pub input_fields: Vec<String>,
}

pub fn action_prompt(action: &str) -> String {
    format!(
        "Write one complete Python function that will {}.\n\
         Requirements:\n\
         - Read every value it needs from the user with input().\n\
         - Reply with Python code only: no prose, no comments, no placeholders.\n\
         - It must run as-is, properly indented.\n\
         - No example calls or sample output.\n\
         - No import statements; the function alone.",
        action.to_lowercase()
    )
}

/// Prompt strings of every `input(...)` call in `code`, in source order.
pub fn extract_input_fields(code: &str) -> Result<Vec<String>, ReconError> {
    let re = Regex::new(INPUT_CALL).map_err(|e| ReconError::NextStep(e.to_string()))?;
    Ok(re.captures_iter(code).map(|c| c[1].to_string()).collect())
}

/// Resolve `key` against the config and generate the action's code.
/// Unknown keys are rejected before the generator is called.
pub fn select(config: &ReconConfig, key: &str, generator: &dyn TextGenerator) -> Result<NextStepPlan, ReconError> {
    let action = config
        .next_step_options
        .get(key)
        .ok_or_else(|| ReconError::UnknownOption {
            key: key.to_string(),
            known: config.next_step_options.keys().cloned().collect(),
        })?;

    log::info!("generating code for next step {key} ({action})");
    let generated_code = generator.generate(&action_prompt(action))?.trim().to_string();
    let input_fields = extract_input_fields(&generated_code)?;
    log::debug!("next step {key} needs {:?}", input_fields);

    Ok(NextStepPlan {
        option: key.to_string(),
        action: action.clone(),
        message: format!("{action} selected."),
        generated_code,
        input_fields,
    })
}
