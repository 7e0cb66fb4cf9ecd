//! `tallyguard-recon`: column reconciliation and anomaly scoring engine.
//!
//! Pure engine crate: receives a loaded [`Dataset`], returns labelled rows.
//! File loading, history storage and the text-generation client live in
//! sibling crates.

pub mod classify;
pub mod config;
pub mod dataset;
pub mod diff;
pub mod error;
pub mod model;
pub mod narrative;
pub mod next_step;
pub mod normalize;
pub mod outlier;
pub mod pipeline;

pub use config::{CompareMode, ReconConfig};
pub use dataset::{CellValue, Column, Dataset};
pub use error::ReconError;
pub use model::{ReconMeta, ReconOutcome, ReconResponse, TrainOutcome};
pub use narrative::{GenerationError, Narrator, TextGenerator};
pub use next_step::NextStepPlan;
pub use outlier::{AnomalyLabel, ArtifactStore, ModelArtifact, ModelError};
pub use pipeline::{reconcile, train};
