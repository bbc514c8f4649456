//! Versioned checkpoint record for one job.
//!
//! The checkpoint is the single source of truth for resumability. Progress is
//! tracked per item and per phase; single-target jobs use one implicit item.
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "job_id": "20250101_120000",
//!   "configuration": { ... },
//!   "discovered_items": [{"id": "api", "locator": "https://github.com/acme/api.git"}],
//!   "items": {"api": {"phases": {"download": {"complete": true, "artifacts": ["..."]}}}},
//!   "completed_items": ["api"]
//! }
//! ```

pub mod store;

pub use store::{CHECKPOINT_DIR, CheckpointStore, default_checkpoint_path};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::job::{ConfigurationDiff, JobConfiguration, Phase, WorkItem};

/// Schema version written by this build. Any other version is rejected on load.
pub const SCHEMA_VERSION: u32 = 1;

/// Completion record for one phase of one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStatus {
    pub complete: bool,
    /// Identifiers produced by the phase (volume names, paths, destinations)
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Per-item progress across phases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemProgress {
    #[serde(default)]
    pub phases: BTreeMap<Phase, PhaseStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub schema_version: u32,
    pub job_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub configuration: JobConfiguration,
    /// Frozen snapshot of the listing; `None` until the listing has run once
    #[serde(default)]
    pub discovered_items: Option<Vec<WorkItem>>,
    #[serde(default)]
    pub items: BTreeMap<String, ItemProgress>,
    /// Items that finished every planned phase
    #[serde(default)]
    pub completed_items: BTreeSet<String>,
}

impl Checkpoint {
    /// Create a fresh checkpoint with every phase incomplete.
    ///
    /// The job id is the local start time, so staging and destination paths
    /// derived from it sort chronologically.
    pub fn initialize(configuration: JobConfiguration) -> Self {
        let now = Utc::now();
        Self {
            schema_version: SCHEMA_VERSION,
            job_id: Local::now().format("%Y%m%d_%H%M%S").to_string(),
            created_at: now,
            updated_at: now,
            configuration,
            discovered_items: None,
            items: BTreeMap::new(),
            completed_items: BTreeSet::new(),
        }
    }

    pub fn is_phase_complete(&self, item: &str, phase: Phase) -> bool {
        self.items
            .get(item)
            .and_then(|progress| progress.phases.get(&phase))
            .is_some_and(|status| status.complete)
    }

    pub fn is_item_complete(&self, item: &str) -> bool {
        self.completed_items.contains(item)
    }

    pub fn phase_status(&self, item: &str, phase: Phase) -> Option<&PhaseStatus> {
        self.items.get(item).and_then(|p| p.phases.get(&phase))
    }

    /// Record a phase as complete. Completion is monotonic: a phase that is
    /// already complete stays complete, only its artifacts are refreshed.
    pub fn mark_phase_complete(&mut self, item: &str, phase: Phase, artifacts: Vec<String>) {
        let now = Utc::now();
        let status = self
            .items
            .entry(item.to_string())
            .or_default()
            .phases
            .entry(phase)
            .or_default();
        if !status.complete {
            status.completed_at = Some(now);
        }
        status.complete = true;
        if !artifacts.is_empty() || status.artifacts.is_empty() {
            status.artifacts = artifacts;
        }
        self.updated_at = now;
    }

    pub fn mark_item_complete(&mut self, item: &str) {
        self.completed_items.insert(item.to_string());
        self.updated_at = Utc::now();
    }

    pub fn record_discovered_items(&mut self, items: Vec<WorkItem>) {
        self.discovered_items = Some(items);
        self.updated_at = Utc::now();
    }

    /// Structural comparison of the stored configuration against the current run's.
    pub fn validate_configuration(&self, candidate: &JobConfiguration) -> ConfigurationDiff {
        self.configuration.diff(candidate)
    }

    /// Number of phases recorded complete across all items.
    pub fn completed_phase_count(&self) -> usize {
        self.items
            .values()
            .flat_map(|p| p.phases.values())
            .filter(|s| s.complete)
            .count()
    }
}
