//! Durable home for trained model artifacts.
//!
//! Layout under the store root:
//!
//! ```text
//! anomaly-model-<hash>.json   immutable, content-addressed artifact
//! CURRENT                     id of the artifact predictions should use
//! ```
//!
//! Artifacts and the pointer are both written to a temp file in the same
//! directory and renamed into place, so a reader sees either the previous
//! artifact or the new one, never a partial write. Last writer wins.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::NamedTempFile;

use super::{ModelArtifact, ModelError, FORMAT_VERSION};

const CURRENT_POINTER: &str = "CURRENT";
const ARTIFACT_PREFIX: &str = "anomaly-model-";
const ARTIFACT_SUFFIX: &str = ".json";
const DEFAULT_RETAIN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn file_name(&self) -> String {
        format!("{ARTIFACT_PREFIX}{}{ARTIFACT_SUFFIX}", self.0)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    retain: usize,
}

impl ArtifactStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ModelError> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| ModelError::Io(format!("cannot create {}: {e}", root.display())))?;
        Ok(Self {
            root,
            retain: DEFAULT_RETAIN,
        })
    }

    /// Number of artifacts kept on disk, the current one included.
    pub fn with_retention(mut self, retain: usize) -> Self {
        self.retain = retain.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `artifact` and make it current. Returns its id.
    pub fn publish(&self, artifact: &ModelArtifact) -> Result<ArtifactId, ModelError> {
        let bytes = serde_json::to_vec(artifact).map_err(|e| ModelError::Serialize(e.to_string()))?;
        let hash = blake3::hash(&bytes).to_hex();
        let id = ArtifactId(hash.as_str()[..16].to_string());

        let path = self.root.join(id.file_name());
        if !path.exists() {
            self.write_atomic(&path, &bytes)?;
        }
        self.write_atomic(&self.root.join(CURRENT_POINTER), id.as_str().as_bytes())?;
        log::info!("published model artifact {id} ({} rows)", artifact.training_rows);

        if let Err(e) = self.prune(&id) {
            log::warn!("artifact prune failed: {e}");
        }
        Ok(id)
    }

    pub fn current_id(&self) -> Result<Option<ArtifactId>, ModelError> {
        let pointer = self.root.join(CURRENT_POINTER);
        match std::fs::read_to_string(&pointer) {
            Ok(s) if s.trim().is_empty() => Ok(None),
            Ok(s) => Ok(Some(ArtifactId(s.trim().to_string()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ModelError::Io(format!("cannot read {}: {e}", pointer.display()))),
        }
    }

    /// The current artifact, or `None` if nothing has been trained yet.
    pub fn load_current(&self) -> Result<Option<ModelArtifact>, ModelError> {
        match self.current_id()? {
            Some(id) => self.load_resolved(id).map(Some),
            None => Ok(None),
        }
    }

    /// Load the artifact `CURRENT` named when it was read. A concurrent
    /// publish can prune that file before we open it; the pointer has moved
    /// on by then, so follow it once more.
    fn load_resolved(&self, id: ArtifactId) -> Result<ModelArtifact, ModelError> {
        if let Some(artifact) = self.try_load(&id)? {
            return Ok(artifact);
        }
        match self.current_id()? {
            Some(latest) if latest != id => {
                log::debug!("artifact {id} pruned while loading, retrying with {latest}");
                self.load(&latest)
            }
            _ => Err(self.not_found(&id)),
        }
    }

    pub fn load(&self, id: &ArtifactId) -> Result<ModelArtifact, ModelError> {
        self.try_load(id)?.ok_or_else(|| self.not_found(id))
    }

    /// `None` when the artifact file does not exist.
    fn try_load(&self, id: &ArtifactId) -> Result<Option<ModelArtifact>, ModelError> {
        let path = self.root.join(id.file_name());
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ModelError::Io(format!("cannot read {}: {e}", path.display()))),
        };
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)
            .map_err(|e| ModelError::CorruptArtifact(format!("{id}: {e}")))?;
        if artifact.format_version != FORMAT_VERSION {
            return Err(ModelError::UnsupportedVersion(artifact.format_version));
        }
        Ok(Some(artifact))
    }

    fn not_found(&self, id: &ArtifactId) -> ModelError {
        ModelError::Io(format!("model artifact {} not found in {}", id, self.root.display()))
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), ModelError> {
        let io_err = |e: std::io::Error| ModelError::Io(format!("cannot write {}: {e}", path.display()));

        let mut tmp = NamedTempFile::new_in(&self.root).map_err(io_err)?;
        tmp.write_all(bytes).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    /// Delete the oldest artifacts beyond the retention count. Never touches
    /// the current one.
    fn prune(&self, current: &ArtifactId) -> Result<(), ModelError> {
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| ModelError::Io(format!("cannot list {}: {e}", self.root.display())))?;

        let current_name = current.file_name();
        let mut others: Vec<(SystemTime, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.starts_with(ARTIFACT_PREFIX) && name.ends_with(ARTIFACT_SUFFIX) && name != current_name
            })
            .map(|entry| {
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, entry.path())
            })
            .collect();

        if others.len() < self.retain {
            return Ok(());
        }

        // newest first
        others.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, path) in others.into_iter().skip(self.retain - 1) {
            log::debug!("pruning old artifact {}", path.display());
            std::fs::remove_file(&path)
                .map_err(|e| ModelError::Io(format!("cannot remove {}: {e}", path.display())))?;
        }
        Ok(())
    }
}
