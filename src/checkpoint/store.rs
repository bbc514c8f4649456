use chrono::Local;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{Checkpoint, SCHEMA_VERSION};
use crate::errors::CheckpointError;
use crate::job::{ConfigurationDiff, JobConfiguration, Phase, WorkItem};

/// Directory under a staging root that holds derived checkpoint paths.
pub const CHECKPOINT_DIR: &str = ".checkpoints";

/// Checkpoint files above this size are treated as corrupt without parsing.
pub const MAX_CHECKPOINT_SIZE: u64 = 16 * 1024 * 1024;

/// Derive the checkpoint path for a configuration.
///
/// Identical parameters always map to the same file, so repeated invocations
/// naturally resume the same job.
pub fn default_checkpoint_path(configuration: &JobConfiguration) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(configuration.source.as_bytes());
    hasher.update(b"\n");
    hasher.update(configuration.destination.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    configuration.staging_root.join(CHECKPOINT_DIR).join(format!(
        "{}_{}_{}.json",
        configuration.kind,
        slugify(&configuration.target_name),
        &digest[..12]
    ))
}

fn slugify(name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "job".to_string()
    } else {
        slug.to_string()
    }
}

/// Durable owner of one job's checkpoint.
///
/// Every mutation is written through to disk before the call returns.
pub struct CheckpointStore {
    path: PathBuf,
    checkpoint: Checkpoint,
}

impl CheckpointStore {
    /// Read a checkpoint from disk.
    ///
    /// A missing file is `Ok(None)`. An unparsable file is `Corrupt`, and a
    /// file written by a different schema is `UnsupportedVersion`.
    pub fn load(path: &Path) -> Result<Option<Checkpoint>, CheckpointError> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No checkpoint found");
                return Ok(None);
            }
            Err(source) => {
                return Err(CheckpointError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        if metadata.len() > MAX_CHECKPOINT_SIZE {
            return Err(CheckpointError::Corrupt {
                path: path.to_path_buf(),
                reason: format!(
                    "file is {} bytes, larger than the {} byte limit",
                    metadata.len(),
                    MAX_CHECKPOINT_SIZE
                ),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|source| CheckpointError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let corrupt = |reason: String| CheckpointError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };

        // Version is checked on the raw document so older layouts report the
        // version mismatch instead of a field error.
        let raw: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
        let found = raw
            .get("schema_version")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| corrupt("missing schema_version".to_string()))?;
        if found != u64::from(SCHEMA_VERSION) {
            return Err(CheckpointError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: u32::try_from(found).unwrap_or(u32::MAX),
                supported: SCHEMA_VERSION,
            });
        }

        let checkpoint: Checkpoint =
            serde_json::from_value(raw).map_err(|e| corrupt(e.to_string()))?;
        info!(
            path = %path.display(),
            job_id = %checkpoint.job_id,
            completed_items = checkpoint.completed_items.len(),
            "Checkpoint loaded"
        );
        Ok(Some(checkpoint))
    }

    /// Start tracking a brand new job and persist it immediately.
    pub fn create(path: PathBuf, configuration: JobConfiguration) -> Result<Self, CheckpointError> {
        let store = Self {
            path,
            checkpoint: Checkpoint::initialize(configuration),
        };
        store.save()?;
        info!(
            path = %store.path.display(),
            job_id = %store.checkpoint.job_id,
            "Checkpoint initialized"
        );
        Ok(store)
    }

    /// Continue tracking a checkpoint that was loaded from `path`.
    pub fn resume(path: PathBuf, checkpoint: Checkpoint) -> Self {
        Self { path, checkpoint }
    }

    /// Move an unreadable checkpoint aside so a fresh one can take its place.
    pub fn quarantine(path: &Path) -> Result<PathBuf, CheckpointError> {
        let mut name = path.as_os_str().to_owned();
        name.push(format!(".corrupt-{}", Local::now().format("%Y%m%d_%H%M%S")));
        let target = PathBuf::from(name);
        std::fs::rename(path, &target).map_err(|source| CheckpointError::Persistence {
            path: path.to_path_buf(),
            source,
        })?;
        warn!(
            path = %path.display(),
            moved_to = %target.display(),
            "Corrupt checkpoint moved aside"
        );
        Ok(target)
    }

    /// Write the full checkpoint atomically: temp file in the same directory,
    /// fsync, then rename over the target.
    pub fn save(&self) -> Result<(), CheckpointError> {
        let persistence = |source: std::io::Error| CheckpointError::Persistence {
            path: self.path.clone(),
            source,
        };

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(persistence)?;

        let json = serde_json::to_string_pretty(&self.checkpoint)
            .map_err(|e| persistence(std::io::Error::other(e)))?;

        let mut temp = tempfile::NamedTempFile::new_in(&parent).map_err(persistence)?;
        temp.write_all(json.as_bytes()).map_err(persistence)?;
        temp.flush().map_err(persistence)?;
        temp.as_file().sync_all().map_err(persistence)?;
        temp.persist(&self.path)
            .map_err(|e| persistence(e.error))?;

        if let Ok(dir) = std::fs::File::open(&parent) {
            let _ = dir.sync_all();
        }

        debug!(
            path = %self.path.display(),
            completed_items = self.checkpoint.completed_items.len(),
            "Checkpoint saved"
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn job_id(&self) -> &str {
        &self.checkpoint.job_id
    }

    pub fn is_phase_complete(&self, item: &str, phase: Phase) -> bool {
        self.checkpoint.is_phase_complete(item, phase)
    }

    pub fn is_item_complete(&self, item: &str) -> bool {
        self.checkpoint.is_item_complete(item)
    }

    pub fn validate_configuration(&self, candidate: &JobConfiguration) -> ConfigurationDiff {
        self.checkpoint.validate_configuration(candidate)
    }

    pub fn mark_phase_complete(
        &mut self,
        item: &str,
        phase: Phase,
        artifacts: Vec<String>,
    ) -> Result<(), CheckpointError> {
        self.checkpoint.mark_phase_complete(item, phase, artifacts);
        self.save()
    }

    pub fn mark_item_complete(&mut self, item: &str) -> Result<(), CheckpointError> {
        self.checkpoint.mark_item_complete(item);
        self.save()
    }

    pub fn record_discovered_items(&mut self, items: Vec<WorkItem>) -> Result<(), CheckpointError> {
        self.checkpoint.record_discovered_items(items);
        self.save()
    }
}
