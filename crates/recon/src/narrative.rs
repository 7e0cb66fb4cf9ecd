//! Narrative comments for anomalous rows.
//!
//! Prompts are rendered from the config template and sent to a
//! [`TextGenerator`] through a fixed-width worker pool. Results come back in
//! submission order no matter which call finishes first. A failed call only
//! affects its own row: it gets a placeholder comment.

use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;

use crate::error::ReconError;

pub const DEFAULT_POOL_WIDTH: usize = 5;
pub const FALLBACK_COMMENT: &str = "Comment unavailable: narrative generation failed for this row.";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("text generation timed out: {0}")]
    Timeout(String),
    #[error("text generation failed: {0}")]
    Failed(String),
}

/// External text-generation service. One blocking request/response per
/// prompt; implementations must be safe to call from several threads.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Fill `{derived_value}` and `{historical_value}` in `template`.
pub fn render_prompt(template: &str, derived: Option<f64>, historical: f64) -> String {
    let derived = derived.map(|v| v.to_string()).unwrap_or_else(|| "missing".into());
    template
        .replace("{derived_value}", &derived)
        .replace("{historical_value}", &historical.to_string())
}

/// Reusable bounded pool. `map_ordered` submits every job and waits for all
/// of them; output index `i` always belongs to input `i`.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    width: usize,
}

impl WorkerPool {
    pub fn new(width: usize) -> Result<Self, ReconError> {
        let width = width.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(width)
            .thread_name(|i| format!("narrative-{i}"))
            .build()
            .map_err(|e| ReconError::NarrativePool(e.to_string()))?;
        Ok(Self { pool, width })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn map_ordered<T, R, F>(&self, jobs: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        self.pool.install(|| jobs.par_iter().map(|job| f(job)).collect())
    }
}

/// Generator + pool, built once and reused across runs.
pub struct Narrator {
    generator: Arc<dyn TextGenerator>,
    pool: WorkerPool,
    fallback: String,
}

impl Narrator {
    pub fn new(generator: Arc<dyn TextGenerator>, width: usize) -> Result<Self, ReconError> {
        Ok(Self {
            generator,
            pool: WorkerPool::new(width)?,
            fallback: FALLBACK_COMMENT.to_string(),
        })
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    pub fn width(&self) -> usize {
        self.pool.width()
    }

    /// One comment per prompt, same order.
    pub fn comments(&self, prompts: &[String]) -> Vec<String> {
        log::info!(
            "generating {} comment(s) with {} worker(s)",
            prompts.len(),
            self.pool.width()
        );

        let generator = &self.generator;
        let results = self
            .pool
            .map_ordered(prompts, |prompt| generator.generate(prompt));

        results
            .into_iter()
            .enumerate()
            .map(|(i, result)| match result {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    log::warn!("comment {i}: {e}");
                    self.fallback.clone()
                }
            })
            .collect()
    }
}
