//! `tguard reconcile | train | validate | options`: config-driven
//! reconciliation runs and model training.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use serde_json::json;
use tallyguard_io::DEFAULT_HISTORY_LIMIT;
use tallyguard_recon::{CompareMode, ReconConfig, TrainOutcome};

use crate::exit_codes::{EXIT_ANOMALIES, EXIT_RUNTIME};
use crate::settings::RuntimeArgs;
use crate::CliError;

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Data file to reconcile (.csv, .tsv, .xlsx, .xls, .ods)
    pub file: PathBuf,

    /// Reconciliation config (.json or .toml)
    #[arg(long, short = 'c')]
    pub config: PathBuf,

    /// Output JSON to stdout instead of human summary
    #[arg(long)]
    pub json: bool,

    /// Write JSON output to file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Write every row with its Match Status, Anomaly and comment columns to CSV
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Append rows labelled normal to the history store for later training
    #[arg(long)]
    pub record_matches: bool,

    /// Skip comment generation for anomalous rows
    #[arg(long)]
    pub no_comments: bool,

    /// Exit 1 if any row is anomalous
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Reconciliation config (.json or .toml)
    #[arg(long, short = 'c')]
    pub config: PathBuf,

    /// Historical data file; defaults to rows recorded with --record-matches
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Maximum recorded rows to read when --history is not given
    #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
    pub limit: usize,

    /// Output JSON to stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum OptionsCommands {
    /// List the configured next-step options
    #[command(after_help = "\
Examples:
  tguard options list --config recon.json
  tguard options list -c recon.toml --json")]
    List {
        /// Reconciliation config (.json or .toml)
        #[arg(long, short = 'c')]
        config: PathBuf,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Generate code for one option and list the inputs it asks for
    #[command(after_help = "\
Examples:
  tguard options select 1 --config recon.json
  tguard options select 2 -c recon.json --json")]
    Select {
        /// Option key, as shown by `tguard options list`
        key: String,

        /// Reconciliation config (.json or .toml)
        #[arg(long, short = 'c')]
        config: PathBuf,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },
}

pub fn load_config(path: &Path) -> Result<ReconConfig, CliError> {
    let config = ReconConfig::from_path(path)?;
    config.validate()?;
    Ok(config)
}

fn runtime_err(msg: impl Into<String>) -> CliError {
    CliError {
        code: EXIT_RUNTIME,
        message: msg.into(),
        hint: None,
    }
}

pub fn cmd_reconcile(args: ReconcileArgs, runtime: &RuntimeArgs) -> Result<(), CliError> {
    let config = load_config(&args.config)?;
    let dataset = tallyguard_io::load(&args.file)?;
    let store = runtime.open_store()?;

    let narrator = if args.no_comments {
        None
    } else {
        Some(runtime.narrator()?)
    };

    let outcome = tallyguard_recon::reconcile(&config, dataset, &store, narrator.as_ref())?;

    if args.record_matches && !outcome.matched_rows.is_empty() {
        let mut history = runtime.open_history()?;
        history.append(&outcome.matched_records())?;
    }

    if let Some(ref path) = args.csv {
        tallyguard_io::csv::export(&outcome.dataset, path)?;
        eprintln!("wrote {}", path.display());
    }

    let response = outcome.to_response();
    let json_str = serde_json::to_string_pretty(&response)
        .map_err(|e| runtime_err(format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &json_str).map_err(|e| runtime_err(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if args.json {
        println!("{json_str}");
    }

    eprintln!(
        "{} rows ({}): {} matched, {} anomalous, {} unscored",
        response.processed_count, response.meta.mode, response.matched_count, response.anomalous_count,
        response.unscored_count,
    );
    if response.unscored_count > 0 && outcome.meta.model_trained_at.is_none() {
        eprintln!("no trained model; run `tguard train` to enable anomaly scoring");
    }
    if outcome.comments_generated > 0 {
        eprintln!("comments written for {} anomalous row(s)", outcome.comments_generated);
    }

    if args.strict && response.anomalous_count > 0 {
        return Err(CliError {
            code: EXIT_ANOMALIES,
            message: format!("{} anomalous row(s) found", response.anomalous_count),
            hint: None,
        });
    }
    Ok(())
}

pub fn cmd_train(args: TrainArgs, runtime: &RuntimeArgs) -> Result<(), CliError> {
    let config = load_config(&args.config)?;

    let history = match args.history {
        Some(ref path) => tallyguard_io::load(path)?,
        None => {
            let store = runtime.open_history()?;
            store.load_recent(args.limit)?
        }
    };

    let store = runtime.open_store()?;
    let outcome = tallyguard_recon::train(&config, history, &store)?;

    if args.json {
        let value = match &outcome {
            TrainOutcome::Trained {
                artifact,
                rows,
                feature_columns,
            } => json!({
                "status": "trained",
                "artifact": artifact.as_str(),
                "rows": rows,
                "feature_columns": feature_columns,
                "message": outcome.message(),
            }),
            TrainOutcome::Skipped => json!({
                "status": "skipped",
                "message": outcome.message(),
            }),
        };
        println!("{}", serde_json::to_string_pretty(&value).map_err(|e| runtime_err(e.to_string()))?);
    }

    eprintln!("{}", outcome.message());
    Ok(())
}

pub fn cmd_validate(config_path: PathBuf, check_llm: bool, runtime: &RuntimeArgs) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    eprintln!("config OK: {}", config_path.display());
    eprintln!("  mode:      {}", config.mode());
    eprintln!("  criteria:  {}", config.criteria_columns.join(", "));
    match config.mode() {
        CompareMode::SelfCompare => eprintln!("  derived:   {}", config.derived_column),
        CompareMode::PairedSource => eprintln!("  prefixes:  {}", config.db_prefixes().join(" / ")),
    }

    if check_llm {
        runtime.llm_client()?.ping()?;
        eprintln!("  llm:       {} reachable ({})", runtime.llm_endpoint, runtime.llm_model);
    }
    Ok(())
}

pub fn cmd_options(cmd: OptionsCommands, runtime: &RuntimeArgs) -> Result<(), CliError> {
    match cmd {
        OptionsCommands::List { config, json } => cmd_options_list(config, json),
        OptionsCommands::Select { key, config, json } => cmd_options_select(&key, config, json, runtime),
    }
}

fn cmd_options_list(config_path: PathBuf, json_output: bool) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    if json_output {
        let json_str = serde_json::to_string_pretty(&config.next_step_options)
            .map_err(|e| runtime_err(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    } else {
        for (key, label) in &config.next_step_options {
            println!("{key}  {label}");
        }
    }
    Ok(())
}

fn cmd_options_select(key: &str, config_path: PathBuf, json_output: bool, runtime: &RuntimeArgs) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let client = runtime.llm_client()?;
    let plan = tallyguard_recon::next_step::select(&config, key, &client)?;

    if json_output {
        let json_str = serde_json::to_string_pretty(&plan)
            .map_err(|e| runtime_err(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    } else {
        eprintln!("{}", plan.message);
        println!("{}", plan.generated_code);
        if plan.input_fields.is_empty() {
            eprintln!("inputs:  none");
        } else {
            eprintln!("inputs:  {}", plan.input_fields.join(", "));
        }
    }
    Ok(())
}
