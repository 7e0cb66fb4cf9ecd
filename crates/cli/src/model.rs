//! `tguard model status`

use clap::Subcommand;
use serde_json::json;

use crate::exit_codes::EXIT_RUNTIME;
use crate::settings::RuntimeArgs;
use crate::CliError;

#[derive(Subcommand, Debug)]
pub enum ModelCommands {
    /// Show the artifact predictions currently use
    #[command(after_help = "\
Examples:
  tguard model status
  tguard model status --json")]
    Status {
        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },
}

pub fn cmd_model(cmd: ModelCommands, runtime: &RuntimeArgs) -> Result<(), CliError> {
    match cmd {
        ModelCommands::Status { json } => cmd_model_status(json, runtime),
    }
}

fn cmd_model_status(json_output: bool, runtime: &RuntimeArgs) -> Result<(), CliError> {
    let store = runtime.open_store()?;
    let current = store.current_id()?;

    let Some(id) = current else {
        if json_output {
            println!("{}", json!({ "status": "untrained", "artifact_dir": store.root().display().to_string() }));
        }
        eprintln!("no model trained yet ({})", store.root().display());
        return Ok(());
    };

    let artifact = store.load(&id)?;

    if json_output {
        let value = json!({
            "status": "trained",
            "artifact": id.as_str(),
            "artifact_dir": store.root().display().to_string(),
            "created_at": artifact.created_at,
            "format_version": artifact.format_version,
            "training_rows": artifact.training_rows,
            "feature_columns": artifact.feature_columns,
            "threshold": artifact.forest.threshold(),
        });
        let json_str = serde_json::to_string_pretty(&value).map_err(|e| CliError {
            code: EXIT_RUNTIME,
            message: format!("JSON serialization error: {e}"),
            hint: None,
        })?;
        println!("{json_str}");
    } else {
        println!("artifact:  {id}");
        println!("trained:   {}", artifact.created_at);
        println!("rows:      {}", artifact.training_rows);
        println!("features:  {}", artifact.feature_columns.join(", "));
    }
    Ok(())
}
