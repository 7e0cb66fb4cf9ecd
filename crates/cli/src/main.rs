// tallyguard CLI - reconcile tabular ledgers and flag anomalous rows

mod exit_codes;
mod model;
mod recon;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use env_logger::Env;

use exit_codes::{EXIT_SUCCESS, EXIT_USAGE};
use model::ModelCommands;
use recon::{OptionsCommands, ReconcileArgs, TrainArgs};
use settings::RuntimeArgs;

#[derive(Parser)]
#[command(name = "tguard")]
#[command(about = "Column reconciliation with anomaly scoring and narrative comments")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    runtime: RuntimeArgs,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Diff, classify and score every row of a data file
    #[command(after_help = "\
Examples:
  tguard reconcile balances.csv --config recon.json
  tguard reconcile balances.xlsx -c recon.toml --json
  tguard reconcile balances.csv -c recon.json --csv reviewed.csv --record-matches
  tguard reconcile balances.csv -c recon.json --no-comments --strict")]
    Reconcile(ReconcileArgs),

    /// Fit the anomaly model on historical rows
    #[command(after_help = "\
Examples:
  tguard train --config recon.json --history last-quarter.csv
  tguard train --config recon.json            # rows saved by --record-matches")]
    Train(TrainArgs),

    /// Validate a reconciliation config without running
    #[command(after_help = "\
Examples:
  tguard validate --config recon.json
  tguard validate --config recon.toml --check-llm")]
    Validate {
        /// Reconciliation config (.json or .toml)
        #[arg(long, short = 'c')]
        config: PathBuf,

        /// Also check that the chat service answers
        #[arg(long)]
        check_llm: bool,
    },

    /// Follow-up actions offered for reviewed rows
    #[command(subcommand)]
    Options(OptionsCommands),

    /// Inspect the trained model
    #[command(subcommand)]
    Model(ModelCommands),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS });
        }
    };
    init_logging(cli.verbose);

    let runtime = cli.runtime;
    let result = match cli.command {
        Commands::Reconcile(args) => recon::cmd_reconcile(args, &runtime),
        Commands::Train(args) => recon::cmd_train(args, &runtime),
        Commands::Validate { config, check_llm } => recon::cmd_validate(config, check_llm, &runtime),
        Commands::Options(cmd) => recon::cmd_options(cmd, &runtime),
        Commands::Model(cmd) => model::cmd_model(cmd, &runtime),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}
