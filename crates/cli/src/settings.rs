//! Runtime settings shared by every subcommand: where models and history
//! live, and how to reach the text-generation service.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tallyguard_io::SqliteHistoryStore;
use tallyguard_llm_client::{LlmSettings, OllamaClient, DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
use tallyguard_recon::narrative::DEFAULT_POOL_WIDTH;
use tallyguard_recon::{ArtifactStore, Narrator};

use crate::CliError;

const APP_DIR: &str = "tallyguard";
const LOCAL_DIR: &str = ".tallyguard";

#[derive(Args, Debug, Clone)]
pub struct RuntimeArgs {
    /// Directory holding trained model artifacts
    #[arg(long, env = "TALLYGUARD_ARTIFACT_DIR", global = true)]
    pub artifact_dir: Option<PathBuf>,

    /// SQLite database of recorded matched rows
    #[arg(long, env = "TALLYGUARD_HISTORY_DB", global = true)]
    pub history_db: Option<PathBuf>,

    /// Base URL of the Ollama-compatible chat service
    #[arg(long, env = "TALLYGUARD_LLM_ENDPOINT", default_value = DEFAULT_ENDPOINT, global = true)]
    pub llm_endpoint: String,

    /// Model name sent with each chat request
    #[arg(long, env = "TALLYGUARD_LLM_MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub llm_model: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "TALLYGUARD_LLM_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    pub llm_timeout: u64,

    /// Comment requests in flight at once
    #[arg(long, env = "TALLYGUARD_LLM_CONCURRENCY", default_value_t = DEFAULT_POOL_WIDTH, global = true)]
    pub llm_concurrency: usize,
}

impl RuntimeArgs {
    /// Explicit flag/env, else the per-user data dir, else `./.tallyguard`.
    pub fn artifact_dir(&self) -> PathBuf {
        self.artifact_dir
            .clone()
            .unwrap_or_else(|| data_root().join("models"))
    }

    pub fn history_db(&self) -> PathBuf {
        self.history_db
            .clone()
            .unwrap_or_else(|| data_root().join("history.db"))
    }

    pub fn open_store(&self) -> Result<ArtifactStore, CliError> {
        Ok(ArtifactStore::open(self.artifact_dir())?)
    }

    pub fn open_history(&self) -> Result<SqliteHistoryStore, CliError> {
        Ok(SqliteHistoryStore::open(&self.history_db())?)
    }

    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            endpoint: self.llm_endpoint.clone(),
            model: self.llm_model.clone(),
            timeout: Duration::from_secs(self.llm_timeout.max(1)),
        }
    }

    pub fn llm_client(&self) -> Result<OllamaClient, CliError> {
        Ok(OllamaClient::new(&self.llm_settings())?)
    }

    pub fn narrator(&self) -> Result<Narrator, CliError> {
        let client = self.llm_client()?;
        Ok(Narrator::new(Arc::new(client), self.llm_concurrency)?)
    }
}

fn data_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(LOCAL_DIR))
}
