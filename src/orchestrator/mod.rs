//! The job state machine.
//!
//! `INIT -> LISTING -> PROCESSING -> CLEANUP -> DONE`, with any fatal
//! precondition, persistence or listing error ending the run early.
//! Processing walks items in listing order and phases in plan order, asking
//! the checkpoint before every unit of work and recording it right after.

pub mod runner;

pub use runner::PhaseRunner;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::errors::{CheckpointError, OrchestratorError};
use crate::executor::CommandRunner;
use crate::gates::{AutoApprove, ConfirmDecision, Confirmer, StepPrompt};
use crate::job::{Phase, WorkItem};
use crate::listing::ListingProvider;
use crate::plan::{CleanupTarget, JobContext, JobPlan};
use crate::preflight::{Preflight, SystemPreflight};
use crate::ui::JobUI;

/// How a run treats the checkpoint and the end of the job.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub checkpoint_path: PathBuf,
    /// Continue from an existing checkpoint instead of starting fresh
    pub resume: bool,
    pub cleanup: bool,
}

/// Aggregate result of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job_id: String,
    /// Items complete at the end of the run, including ones finished by earlier runs
    pub succeeded: usize,
    pub total: usize,
    pub failed: usize,
    pub skipped: usize,
    pub aborted: bool,
}

impl JobOutcome {
    /// Lenient policy: one completed item makes the job a success.
    pub fn is_success(&self) -> bool {
        self.succeeded > 0
    }
}

enum ItemResult {
    Completed,
    Failed(String),
    Skipped,
    Aborted,
}

pub struct JobOrchestrator {
    plan: Box<dyn JobPlan>,
    lister: Box<dyn ListingProvider>,
    phase_runner: PhaseRunner,
    confirmer: Box<dyn Confirmer>,
    preflight: Box<dyn Preflight>,
    ui: Option<Arc<JobUI>>,
}

impl JobOrchestrator {
    pub fn new(
        plan: Box<dyn JobPlan>,
        lister: Box<dyn ListingProvider>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            plan,
            lister,
            phase_runner: PhaseRunner::new(runner),
            confirmer: Box::new(AutoApprove),
            preflight: Box::new(SystemPreflight),
            ui: None,
        }
    }

    pub fn with_confirmer(mut self, confirmer: Box<dyn Confirmer>) -> Self {
        self.confirmer = confirmer;
        self
    }

    pub fn with_preflight(mut self, preflight: Box<dyn Preflight>) -> Self {
        self.preflight = preflight;
        self
    }

    pub fn with_ui(mut self, ui: Arc<JobUI>) -> Self {
        self.ui = Some(ui);
        self
    }

    fn ui(&self) -> Option<&JobUI> {
        self.ui.as_deref()
    }

    fn confirm(&mut self, prompt: StepPrompt) -> Result<ConfirmDecision, OrchestratorError> {
        self.confirmer
            .confirm(&prompt)
            .map_err(|e| OrchestratorError::Confirmation(e.to_string()))
    }

    /// Run the job to completion (or to the first fatal error).
    pub async fn run(&mut self, options: &RunOptions) -> Result<JobOutcome, OrchestratorError> {
        let path = options.checkpoint_path.clone();

        // INIT: nothing is written until the checkpoint is validated and preconditions pass
        let existing = if options.resume {
            match CheckpointStore::load(&path) {
                Ok(found) => Existing::from(found),
                Err(CheckpointError::Corrupt { reason, .. }) => {
                    warn!(path = %path.display(), %reason, "Checkpoint is corrupt, starting fresh");
                    Existing::Corrupt
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            Existing::None
        };

        if let Existing::Found(ref checkpoint) = existing {
            let diff = checkpoint.validate_configuration(self.plan.configuration());
            if !diff.is_match() {
                error!(path = %path.display(), fields = ?diff.mismatched, "Checkpoint configuration mismatch");
                return Err(OrchestratorError::ConfigurationMismatch {
                    path,
                    fields: diff.mismatched,
                });
            }
        }

        self.preflight.check(&self.plan.requirements())?;

        let (mut store, resumed) = match existing {
            Existing::Found(checkpoint) => (CheckpointStore::resume(path.clone(), checkpoint), true),
            Existing::Corrupt => {
                CheckpointStore::quarantine(&path)?;
                (CheckpointStore::create(path.clone(), self.plan.configuration().clone())?, false)
            }
            Existing::None => (
                CheckpointStore::create(path.clone(), self.plan.configuration().clone())?,
                false,
            ),
        };
        let ctx = JobContext::new(store.job_id());
        let configuration = self.plan.configuration();
        info!(
            job_id = %ctx.job_id,
            kind = %configuration.kind,
            source = %configuration.source,
            destination = %configuration.destination,
            resumed,
            checkpoint = %path.display(),
            "Job started"
        );
        if let Some(ui) = self.ui() {
            let title = format!("{} backup: {}", configuration.kind, configuration.target_name);
            ui.print_header(&title, &ctx.job_id, resumed);
        }

        // LISTING
        let items = match self.discover_items(&mut store).await? {
            Some(items) => items,
            None => {
                return Ok(JobOutcome {
                    job_id: ctx.job_id,
                    succeeded: 0,
                    total: 0,
                    failed: 0,
                    skipped: 0,
                    aborted: true,
                });
            }
        };

        // PROCESSING
        let total = items.len();
        if let Some(ui) = self.ui() {
            ui.set_total(total as u64);
        }
        let mut succeeded = 0;
        let mut failed = 0;
        let mut skipped = 0;
        let mut aborted = false;

        for (index, item) in items.iter().enumerate() {
            if store.is_item_complete(&item.id) {
                info!(job_id = %ctx.job_id, item = %item.id, "Item already complete, skipping");
                if let Some(ui) = self.ui() {
                    ui.item_done(&item.id, true);
                }
                succeeded += 1;
                continue;
            }

            if let Some(ui) = self.ui() {
                ui.start_item(index, total, &item.id);
            }
            match self.run_item(&mut store, &ctx, item).await? {
                ItemResult::Completed => {
                    info!(job_id = %ctx.job_id, item = %item.id, "Item complete");
                    if let Some(ui) = self.ui() {
                        ui.item_done(&item.id, false);
                    }
                    succeeded += 1;
                }
                ItemResult::Failed(reason) => {
                    error!(job_id = %ctx.job_id, item = %item.id, error = %reason, "Item failed, continuing with next item");
                    if let Some(ui) = self.ui() {
                        ui.item_failed(&item.id, &reason);
                    }
                    failed += 1;
                }
                ItemResult::Skipped => {
                    info!(job_id = %ctx.job_id, item = %item.id, "Item skipped by user");
                    if let Some(ui) = self.ui() {
                        ui.item_skipped(&item.id);
                    }
                    skipped += 1;
                }
                ItemResult::Aborted => {
                    warn!(job_id = %ctx.job_id, item = %item.id, "Job aborted by user");
                    skipped += 1;
                    aborted = true;
                    succeeded += items[index + 1..]
                        .iter()
                        .filter(|later| store.is_item_complete(&later.id))
                        .count();
                    break;
                }
            }
        }

        // CLEANUP
        if options.cleanup {
            if succeeded > 0 && !aborted {
                self.cleanup(&ctx, &store, &items)?;
            } else {
                info!(job_id = %ctx.job_id, succeeded, aborted, "Skipping cleanup");
            }
        }

        let outcome = JobOutcome {
            job_id: ctx.job_id.clone(),
            succeeded,
            total,
            failed,
            skipped,
            aborted,
        };
        if let Some(ui) = self.ui() {
            ui.print_summary(&outcome);
        }
        info!(
            job_id = %outcome.job_id,
            succeeded = outcome.succeeded,
            total = outcome.total,
            failed = outcome.failed,
            "Job finished"
        );
        Ok(outcome)
    }

    /// Reuse the frozen listing, or query the source once and persist the result.
    /// `None` when the user declined the listing step.
    async fn discover_items(
        &mut self,
        store: &mut CheckpointStore,
    ) -> Result<Option<Vec<WorkItem>>, OrchestratorError> {
        if let Some(items) = store.checkpoint().discovered_items.clone() {
            info!(count = items.len(), "Reusing item list from checkpoint");
            return Ok(Some(items));
        }

        let decision = self.confirm(StepPrompt::new(self.lister.describe(), None))?;
        if !decision.proceeds() {
            warn!("Listing declined, nothing to do");
            return Ok(None);
        }

        let items = self.lister.list_items().await?;
        store.record_discovered_items(items.clone())?;
        info!(count = items.len(), "Item list saved to checkpoint");
        Ok(Some(items))
    }

    /// Run every incomplete phase of one item.
    ///
    /// `Err` is reserved for job-fatal conditions; anything that only affects
    /// this item comes back as `ItemResult::Failed`.
    async fn run_item(
        &mut self,
        store: &mut CheckpointStore,
        ctx: &JobContext,
        item: &WorkItem,
    ) -> Result<ItemResult, OrchestratorError> {
        for phase in self.plan.phases() {
            if store.is_phase_complete(&item.id, phase) {
                info!(item = %item.id, %phase, "Phase already complete, skipping");
                if let Some(ui) = self.ui() {
                    ui.phase_done(phase.as_str(), true);
                }
                continue;
            }

            let work = match self.plan.phase_work(ctx, item, phase) {
                Ok(work) => work,
                Err(e) => return Ok(ItemResult::Failed(format!("{}: {}", phase, e))),
            };

            let prompt = StepPrompt::new(
                describe_phase(phase, &item.id),
                work.primary_command().map(|c| c.to_string()),
            );
            match self.confirm(prompt)? {
                ConfirmDecision::Approved | ConfirmDecision::ApprovedAll => {}
                // Later phases depend on this one, so the rest of the item goes too
                ConfirmDecision::Skipped => return Ok(ItemResult::Skipped),
                ConfirmDecision::Aborted => return Ok(ItemResult::Aborted),
            }

            info!(item = %item.id, %phase, "Phase started");
            if let Some(ui) = self.ui() {
                ui.start_phase(phase.as_str(), &item.id);
            }
            if let Err(e) = self.phase_runner.run(&item.id, &work, self.ui.as_deref()).await {
                let reason = e.summary();
                error!(item = %item.id, %phase, error = %reason, "Phase failed");
                return Ok(ItemResult::Failed(format!("{}: {}", phase, reason)));
            }

            let artifacts = self.plan.artifacts(ctx, item, phase);
            store.mark_phase_complete(&item.id, phase, artifacts)?;
            info!(item = %item.id, %phase, "Phase complete");
            if let Some(ui) = self.ui() {
                ui.phase_done(phase.as_str(), false);
            }
        }

        store.mark_item_complete(&item.id)?;
        Ok(ItemResult::Completed)
    }

    /// Remove the local staging of completed items. Failures are warnings only.
    ///
    /// Unfinished items keep their staging: their completed phases are
    /// recorded, so a resumed run depends on those files still being there.
    fn cleanup(
        &mut self,
        ctx: &JobContext,
        store: &CheckpointStore,
        items: &[WorkItem],
    ) -> Result<(), OrchestratorError> {
        let targets: Vec<CleanupTarget> = items
            .iter()
            .filter(|item| store.is_item_complete(&item.id))
            .flat_map(|item| self.plan.cleanup_targets(ctx, item))
            .filter(|target| target.path.exists())
            .collect();
        let kept = items.iter().filter(|item| !store.is_item_complete(&item.id)).count();
        if kept > 0 {
            info!(job_id = %ctx.job_id, items = kept, "Keeping staging of unfinished items");
        }
        if targets.is_empty() {
            return Ok(());
        }
        let listing: Vec<String> = targets.iter().map(|t| t.path.display().to_string()).collect();
        let decision = self.confirm(StepPrompt::new(
            format!("Remove local staging: {}", listing.join(", ")),
            None,
        ))?;
        if !decision.proceeds() {
            info!(job_id = %ctx.job_id, "Cleanup skipped by user");
            return Ok(());
        }

        for target in &targets {
            match remove_target(target) {
                Ok(true) => {
                    info!(path = %target.path.display(), "Removed staging directory");
                    if let Some(ui) = self.ui() {
                        ui.cleanup(&target.path.display().to_string());
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %target.path.display(), error = %e, "Cleanup failed");
                    if let Some(ui) = self.ui() {
                        ui.warning(&format!("Could not remove {}: {}", target.path.display(), e));
                    }
                }
            }
        }
        Ok(())
    }
}

enum Existing {
    None,
    Found(crate::checkpoint::Checkpoint),
    Corrupt,
}

impl From<Option<crate::checkpoint::Checkpoint>> for Existing {
    fn from(value: Option<crate::checkpoint::Checkpoint>) -> Self {
        match value {
            Some(checkpoint) => Existing::Found(checkpoint),
            None => Existing::None,
        }
    }
}

fn describe_phase(phase: Phase, item: &str) -> String {
    match phase {
        Phase::Download => format!("Download {}", item),
        Phase::Archive => format!("Archive {}", item),
        Phase::Upload => format!("Upload {}", item),
        Phase::Extract => format!("Extract {}", item),
    }
}

/// Remove a cleanup target. `Ok(false)` when it did not exist.
fn remove_target(target: &CleanupTarget) -> std::io::Result<bool> {
    if !target.path.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(&target.path)?;
    if let Some(ref root) = target.prune_until {
        prune_empty_parents(&target.path, root);
    }
    Ok(true)
}

/// Remove empty directories above `path`, stopping at (and keeping) `root`.
pub fn prune_empty_parents(path: &Path, root: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        let is_empty = std::fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty || std::fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_prune_empty_parents_stops_at_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("staging");
        let leaf = root.join("default/bucket/folder");
        std::fs::create_dir_all(&leaf).unwrap();
        std::fs::remove_dir(&leaf).unwrap();

        prune_empty_parents(&leaf, &root);
        assert!(root.is_dir());
        assert!(!root.join("default").exists());
    }

    #[test]
    fn test_prune_empty_parents_keeps_non_empty() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("staging");
        let leaf = root.join("default/bucket/folder");
        std::fs::create_dir_all(&leaf).unwrap();
        std::fs::create_dir_all(root.join("default/bucket/other")).unwrap();
        std::fs::remove_dir(&leaf).unwrap();

        prune_empty_parents(&leaf, &root);
        assert!(root.join("default/bucket/other").is_dir());
    }

    #[test]
    fn test_remove_target_missing_is_noop() {
        let dir = tempdir().unwrap();
        let target = CleanupTarget::dir(dir.path().join("absent"));
        assert!(!remove_target(&target).unwrap());
    }

    #[test]
    fn test_outcome_success_policy() {
        let outcome = JobOutcome {
            job_id: "j".into(),
            succeeded: 2,
            total: 3,
            failed: 1,
            skipped: 0,
            aborted: false,
        };
        assert!(outcome.is_success());
        assert!(!JobOutcome { succeeded: 0, ..outcome }.is_success());
    }
}
