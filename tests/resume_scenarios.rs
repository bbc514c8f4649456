//! End-to-end orchestrator runs against a scripted tool layer.
//!
//! Every run goes through the real checkpoint store on disk; only the
//! external tools, the listing source and the operator are scripted.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::{TempDir, tempdir};

use coldstore::checkpoint::CheckpointStore;
use coldstore::errors::{CheckpointError, ExecutionError, ListingError, OrchestratorError, PhaseError};
use coldstore::executor::{CommandRunner, ToolCommand, ToolOutput};
use coldstore::gates::{AutoApprove, ConfirmDecision, Confirmer, StepPrompt};
use coldstore::job::{JobConfiguration, JobKind, JobOptions, Phase, S3Locator, WorkItem};
use coldstore::listing::ListingProvider;
use coldstore::orchestrator::{JobOrchestrator, JobOutcome, RunOptions};
use coldstore::plan::{CleanupTarget, GithubPlan, JobContext, JobPlan, PhaseStep, PhaseWork, Toolchain};
use coldstore::preflight::{NoPreflight, Preflight, Requirements};

const THREE_PHASES: [Phase; 3] = [Phase::Download, Phase::Archive, Phase::Upload];

/// Records `item:phase` for every command and fails the chosen pairs.
#[derive(Default)]
struct ScriptedRunner {
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    fn fail_on(&self, item: &str, phase: Phase) {
        self.failing
            .lock()
            .unwrap()
            .insert(format!("{}:{}", item, phase));
    }

    fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn execute(&self, command: &ToolCommand, _description: &str) -> Result<ToolOutput, ExecutionError> {
        let key = format!("{}:{}", command.args[0], command.program);
        self.calls.lock().unwrap().push(key.clone());
        if self.failing.lock().unwrap().contains(&key) {
            return Err(ExecutionError::NonZeroExit {
                code: 2,
                stdout: String::new(),
                stderr: format!("{} failed", key),
            });
        }
        Ok(ToolOutput::default())
    }
}

/// Stands in for git, dar and aws by producing or consuming the files the
/// real tools would. dar needs the mirror it archives and aws needs the
/// directory it syncs, so a missing input fails the command.
#[derive(Default)]
struct FilesystemRunner {
    failing_archives: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl FilesystemRunner {
    fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn arg_after<'a>(command: &'a ToolCommand, flag: &str) -> Option<&'a str> {
        let at = command.args.iter().position(|a| a == flag)?;
        command.args.get(at + 1).map(String::as_str)
    }
}

fn last_component(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn exit_failure(stderr: String) -> ExecutionError {
    ExecutionError::NonZeroExit {
        code: 1,
        stdout: String::new(),
        stderr,
    }
}

#[async_trait]
impl CommandRunner for FilesystemRunner {
    async fn execute(&self, command: &ToolCommand, _description: &str) -> Result<ToolOutput, ExecutionError> {
        match command.program.as_str() {
            "git" => {
                let Some(target) = command.args.last() else {
                    return Err(exit_failure("git: no target".into()));
                };
                self.calls.lock().unwrap().push(format!("git:{}", last_component(target)));
                let mirror = PathBuf::from(target);
                std::fs::create_dir_all(&mirror).unwrap();
                std::fs::write(mirror.join("HEAD"), "ref: refs/heads/main").unwrap();
            }
            "dar" => {
                let source = Self::arg_after(command, "-R").unwrap_or_default().to_string();
                let base = Self::arg_after(command, "-c").unwrap_or_default().to_string();
                let item = last_component(&source);
                self.calls.lock().unwrap().push(format!("dar:{}", item));
                if !Path::new(&source).join("HEAD").exists() {
                    return Err(exit_failure(format!("dar: cannot open {}", source)));
                }
                if self.failing_archives.lock().unwrap().contains(&item) {
                    return Err(exit_failure("dar: disk full".into()));
                }
                std::fs::write(format!("{}.1.dar", base), "volume").unwrap();
            }
            "aws" => {
                let source = command.args[2].clone();
                self.calls.lock().unwrap().push(format!("aws:{}", last_component(&source)));
                if !Path::new(&source).is_dir() {
                    return Err(exit_failure(format!("aws: {} does not exist", source)));
                }
            }
            other => return Err(ExecutionError::ToolNotFound { program: other.into() }),
        }
        Ok(ToolOutput::default())
    }
}

/// One command per phase: program is the phase name, first argument the item.
struct ScriptedPlan {
    configuration: JobConfiguration,
    phases: Vec<Phase>,
    /// Each item owns `<cleanup_root>/<item>`
    cleanup_root: Option<PathBuf>,
}

impl JobPlan for ScriptedPlan {
    fn configuration(&self) -> &JobConfiguration {
        &self.configuration
    }

    fn phases(&self) -> Vec<Phase> {
        self.phases.clone()
    }

    fn requirements(&self) -> Requirements {
        Requirements::default()
    }

    fn phase_work(&self, _ctx: &JobContext, item: &WorkItem, phase: Phase) -> Result<PhaseWork, PhaseError> {
        let command = ToolCommand::new(phase.as_str()).arg(item.id.clone());
        Ok(PhaseWork {
            steps: vec![PhaseStep::required(format!("{} {}", phase, item.id), command)],
            ..Default::default()
        })
    }

    fn artifacts(&self, ctx: &JobContext, item: &WorkItem, phase: Phase) -> Vec<String> {
        vec![format!("{}/{}/{}", ctx.job_id, item.id, phase)]
    }

    fn cleanup_targets(&self, _ctx: &JobContext, item: &WorkItem) -> Vec<CleanupTarget> {
        self.cleanup_root
            .iter()
            .map(|root| CleanupTarget::dir(root.join(&item.id)))
            .collect()
    }
}

struct ScriptedLister {
    items: Vec<WorkItem>,
    calls: Arc<AtomicUsize>,
    fail: bool,
}

#[async_trait]
impl ListingProvider for ScriptedLister {
    fn describe(&self) -> String {
        "List scripted items".to_string()
    }

    async fn list_items(&self) -> Result<Vec<WorkItem>, ListingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ListingError::Http {
                status: 502,
                body: "bad gateway".into(),
            });
        }
        Ok(self.items.clone())
    }
}

/// Answers a fixed decision for one prompt and approves the rest.
struct ScriptedConfirmer {
    target: String,
    decision: ConfirmDecision,
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&mut self, prompt: &StepPrompt) -> anyhow::Result<ConfirmDecision> {
        if prompt.description == self.target {
            Ok(self.decision)
        } else {
            Ok(ConfirmDecision::Approved)
        }
    }
}

struct RejectingPreflight;

impl Preflight for RejectingPreflight {
    fn check(&self, _requirements: &Requirements) -> Result<(), OrchestratorError> {
        Err(OrchestratorError::precondition(
            "Required tool 'dar' not found",
            "Install dar or set COLDSTORE_DAR",
        ))
    }
}

struct Harness {
    dir: TempDir,
    runner: Arc<ScriptedRunner>,
    listings: Arc<AtomicUsize>,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: tempdir().unwrap(),
            runner: Arc::new(ScriptedRunner::default()),
            listings: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn checkpoint_path(&self) -> PathBuf {
        self.dir.path().join("checkpoints").join("job.json")
    }

    fn configuration(&self) -> JobConfiguration {
        JobConfiguration {
            kind: JobKind::Github,
            source: "github:acme".into(),
            destination: "s3://acme-github-backups/github_backups/acme/".into(),
            target_name: "acme".into(),
            staging_root: self.dir.path().join("staging"),
            source_profile: String::new(),
            dest_profile: String::new(),
            storage_class: None,
            volume_size: None,
            options: JobOptions {
                create_archives: true,
                upload: true,
                ..Default::default()
            },
        }
    }

    fn orchestrator(&self, configuration: JobConfiguration, ids: &[&str]) -> JobOrchestrator {
        self.orchestrator_with(configuration, ids, None, false)
    }

    fn lister(&self, ids: &[&str], fail: bool) -> ScriptedLister {
        ScriptedLister {
            items: ids
                .iter()
                .map(|id| WorkItem::new(*id, format!("https://github.com/acme/{}.git", id)))
                .collect(),
            calls: self.listings.clone(),
            fail,
        }
    }

    fn orchestrator_with(
        &self,
        configuration: JobConfiguration,
        ids: &[&str],
        cleanup_root: Option<PathBuf>,
        failing_listing: bool,
    ) -> JobOrchestrator {
        let plan = ScriptedPlan {
            configuration,
            phases: THREE_PHASES.to_vec(),
            cleanup_root,
        };
        let lister = self.lister(ids, failing_listing);
        JobOrchestrator::new(Box::new(plan), Box::new(lister), self.runner.clone())
            .with_preflight(Box::new(NoPreflight))
            .with_confirmer(Box::new(AutoApprove))
    }

    fn options(&self, resume: bool, cleanup: bool) -> RunOptions {
        RunOptions {
            checkpoint_path: self.checkpoint_path(),
            resume,
            cleanup,
        }
    }

    async fn run(&self, ids: &[&str]) -> Result<JobOutcome, OrchestratorError> {
        self.orchestrator(self.configuration(), ids)
            .run(&self.options(true, false))
            .await
    }

    fn checkpoint(&self) -> coldstore::checkpoint::Checkpoint {
        CheckpointStore::load(&self.checkpoint_path())
            .unwrap()
            .expect("checkpoint exists")
    }
}

fn calls(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn quarantined_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.to_string_lossy().contains(".corrupt-"))
        .collect()
}

#[tokio::test]
async fn test_full_run_then_rerun_is_noop() {
    let h = Harness::new();

    let first = h.run(&["A", "B"]).await.unwrap();
    assert_eq!((first.succeeded, first.total, first.failed), (2, 2, 0));
    assert_eq!(h.runner.take_calls().len(), 6);

    let second = h.run(&["A", "B"]).await.unwrap();
    assert_eq!((second.succeeded, second.total), (2, 2));
    assert_eq!(second.job_id, first.job_id);
    assert!(h.runner.take_calls().is_empty());
}

#[tokio::test]
async fn test_one_failure_does_not_stop_other_items() {
    let h = Harness::new();
    h.runner.fail_on("B", Phase::Archive);

    let outcome = h.run(&["A", "B", "C"]).await.unwrap();
    assert_eq!((outcome.succeeded, outcome.total, outcome.failed), (2, 3, 1));
    assert!(outcome.is_success());
    assert_eq!(
        h.runner.take_calls(),
        calls(&[
            "A:download", "A:archive", "A:upload",
            "B:download", "B:archive",
            "C:download", "C:archive", "C:upload",
        ])
    );

    let checkpoint = h.checkpoint();
    assert!(checkpoint.is_phase_complete("B", Phase::Download));
    assert!(!checkpoint.is_phase_complete("B", Phase::Archive));
    assert!(!checkpoint.is_item_complete("B"));
    assert!(checkpoint.is_item_complete("A"));
    assert!(checkpoint.is_item_complete("C"));
}

#[tokio::test]
async fn test_resume_retries_only_failed_item_from_failed_phase() {
    let h = Harness::new();
    h.runner.fail_on("B", Phase::Archive);
    h.run(&["A", "B", "C"]).await.unwrap();
    h.runner.take_calls();
    h.runner.clear_failures();

    let outcome = h.run(&["A", "B", "C"]).await.unwrap();
    assert_eq!((outcome.succeeded, outcome.total, outcome.failed), (3, 3, 0));
    assert_eq!(h.runner.take_calls(), calls(&["B:archive", "B:upload"]));
}

#[tokio::test]
async fn test_completed_phases_are_never_redone_or_restamped() {
    let h = Harness::new();
    h.runner.fail_on("B", Phase::Upload);
    h.run(&["A", "B"]).await.unwrap();
    let before = h.checkpoint();
    h.runner.clear_failures();

    h.run(&["A", "B"]).await.unwrap();
    let after = h.checkpoint();

    for phase in [Phase::Download, Phase::Archive] {
        assert_eq!(
            before.phase_status("B", phase).unwrap().completed_at,
            after.phase_status("B", phase).unwrap().completed_at
        );
    }
    assert!(after.completed_phase_count() >= before.completed_phase_count());
    assert_eq!(
        after.phase_status("B", Phase::Upload).unwrap().artifacts,
        vec![format!("{}/B/upload", after.job_id)]
    );
}

#[tokio::test]
async fn test_all_items_failing_is_not_success() {
    let h = Harness::new();
    h.runner.fail_on("A", Phase::Download);
    h.runner.fail_on("B", Phase::Download);

    let outcome = h.run(&["A", "B"]).await.unwrap();
    assert_eq!((outcome.succeeded, outcome.failed), (0, 2));
    assert!(!outcome.is_success());
}

#[tokio::test]
async fn test_configuration_mismatch_refuses_to_resume() {
    let h = Harness::new();
    h.runner.fail_on("A", Phase::Upload);
    h.run(&["A"]).await.unwrap();
    h.runner.take_calls();
    let stored = std::fs::read_to_string(h.checkpoint_path()).unwrap();

    let mut other = h.configuration();
    other.destination = "s3://elsewhere/acme/".into();
    other.options.mirror_delete = true;
    let err = h
        .orchestrator(other, &["A"])
        .run(&h.options(true, false))
        .await
        .unwrap_err();

    match err {
        OrchestratorError::ConfigurationMismatch { fields, .. } => {
            assert_eq!(fields, vec!["destination", "mirror_delete"]);
        }
        other => panic!("expected mismatch, got {other:?}"),
    }
    assert!(h.runner.take_calls().is_empty());
    assert_eq!(std::fs::read_to_string(h.checkpoint_path()).unwrap(), stored);
}

#[tokio::test]
async fn test_no_resume_starts_over() {
    let h = Harness::new();
    h.run(&["A"]).await.unwrap();
    h.runner.take_calls();

    let mut other = h.configuration();
    other.destination = "s3://elsewhere/acme/".into();
    let outcome = h
        .orchestrator(other, &["A"])
        .run(&h.options(false, false))
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 1);
    assert_eq!(h.runner.take_calls(), calls(&["A:download", "A:archive", "A:upload"]));
    assert_eq!(h.checkpoint().configuration.destination, "s3://elsewhere/acme/");
    assert_eq!(h.listings.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_listing_is_frozen_after_first_run() {
    let h = Harness::new();
    h.runner.fail_on("B", Phase::Download);
    h.run(&["A", "B"]).await.unwrap();
    h.runner.clear_failures();
    h.runner.take_calls();

    // The source has grown since; the resumed job keeps its original item set
    let outcome = h.run(&["A", "B", "D"]).await.unwrap();
    assert_eq!(outcome.total, 2);
    assert_eq!(h.listings.load(Ordering::SeqCst), 1);
    assert!(!h.runner.take_calls().iter().any(|c| c.starts_with("D:")));
}

#[tokio::test]
async fn test_listing_failure_is_fatal_and_runs_nothing() {
    let h = Harness::new();
    let err = h
        .orchestrator_with(h.configuration(), &["A"], None, true)
        .run(&h.options(true, false))
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Listing(_)));
    assert!(h.runner.take_calls().is_empty());
    assert!(h.checkpoint().discovered_items.is_none());
}

#[tokio::test]
async fn test_precondition_failure_writes_nothing() {
    let h = Harness::new();
    let err = h
        .orchestrator(h.configuration(), &["A"])
        .with_preflight(Box::new(RejectingPreflight))
        .run(&h.options(true, false))
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Precondition { .. }));
    assert!(!h.checkpoint_path().exists());
    assert_eq!(h.listings.load(Ordering::SeqCst), 0);
    assert!(h.runner.take_calls().is_empty());
}

#[tokio::test]
async fn test_corrupt_checkpoint_is_quarantined_and_job_restarts() {
    let h = Harness::new();
    std::fs::create_dir_all(h.checkpoint_path().parent().unwrap()).unwrap();
    std::fs::write(h.checkpoint_path(), "{\"schema_version\": 1, \"job_id\": ").unwrap();

    let outcome = h.run(&["A"]).await.unwrap();
    assert_eq!(outcome.succeeded, 1);

    let quarantined = quarantined_files(h.checkpoint_path().parent().unwrap());
    assert_eq!(quarantined.len(), 1);
    assert_eq!(
        std::fs::read_to_string(&quarantined[0]).unwrap(),
        "{\"schema_version\": 1, \"job_id\": "
    );
    assert!(h.checkpoint().is_item_complete("A"));
}

#[tokio::test]
async fn test_unsupported_version_is_fatal() {
    let h = Harness::new();
    std::fs::create_dir_all(h.checkpoint_path().parent().unwrap()).unwrap();
    std::fs::write(h.checkpoint_path(), r#"{"schema_version": 99}"#).unwrap();

    let err = h.run(&["A"]).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Checkpoint(CheckpointError::UnsupportedVersion { found: 99, .. })
    ));
    assert!(h.runner.take_calls().is_empty());
}

#[tokio::test]
async fn test_resume_after_interrupted_run_converges() {
    let h = Harness::new();

    // State a run killed during B's archive would leave behind
    let mut store = CheckpointStore::create(h.checkpoint_path(), h.configuration()).unwrap();
    store
        .record_discovered_items(vec![
            WorkItem::new("A", "https://github.com/acme/A.git"),
            WorkItem::new("B", "https://github.com/acme/B.git"),
            WorkItem::new("C", "https://github.com/acme/C.git"),
        ])
        .unwrap();
    for phase in THREE_PHASES {
        store.mark_phase_complete("A", phase, Vec::new()).unwrap();
    }
    store.mark_item_complete("A").unwrap();
    store.mark_phase_complete("B", Phase::Download, Vec::new()).unwrap();
    let job_id = store.job_id().to_string();
    drop(store);

    let outcome = h.run(&["A", "B", "C"]).await.unwrap();
    assert_eq!(outcome.job_id, job_id);
    assert_eq!((outcome.succeeded, outcome.total), (3, 3));
    assert_eq!(
        h.runner.take_calls(),
        calls(&["B:archive", "B:upload", "C:download", "C:archive", "C:upload"])
    );
    assert_eq!(h.listings.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_abort_stops_job_and_resume_picks_up() {
    let h = Harness::new();
    let cleanup_root = h.dir.path().join("staging").join("acme");
    std::fs::create_dir_all(cleanup_root.join("A")).unwrap();

    let outcome = h
        .orchestrator_with(h.configuration(), &["A", "B", "C"], Some(cleanup_root.clone()), false)
        .with_confirmer(Box::new(ScriptedConfirmer {
            target: "Upload B".into(),
            decision: ConfirmDecision::Aborted,
        }))
        .run(&h.options(true, true))
        .await
        .unwrap();

    assert!(outcome.aborted);
    assert_eq!((outcome.succeeded, outcome.skipped), (1, 1));
    assert_eq!(
        h.runner.take_calls(),
        calls(&["A:download", "A:archive", "A:upload", "B:download", "B:archive"])
    );
    // Aborted jobs keep their staging
    assert!(cleanup_root.join("A").is_dir());

    let outcome = h.run(&["A", "B", "C"]).await.unwrap();
    assert!(!outcome.aborted);
    assert_eq!((outcome.succeeded, outcome.total), (3, 3));
    assert_eq!(
        h.runner.take_calls(),
        calls(&["B:upload", "C:download", "C:archive", "C:upload"])
    );
}

#[tokio::test]
async fn test_skipped_phase_skips_rest_of_item() {
    let h = Harness::new();
    let outcome = h
        .orchestrator(h.configuration(), &["A", "B"])
        .with_confirmer(Box::new(ScriptedConfirmer {
            target: "Archive A".into(),
            decision: ConfirmDecision::Skipped,
        }))
        .run(&h.options(true, false))
        .await
        .unwrap();

    assert_eq!((outcome.succeeded, outcome.skipped), (1, 1));
    assert!(!outcome.aborted);
    assert_eq!(
        h.runner.take_calls(),
        calls(&["A:download", "B:download", "B:archive", "B:upload"])
    );
    assert!(!h.checkpoint().is_item_complete("A"));
}

#[tokio::test]
async fn test_declined_listing_ends_job_without_work() {
    let h = Harness::new();
    let outcome = h
        .orchestrator(h.configuration(), &["A"])
        .with_confirmer(Box::new(ScriptedConfirmer {
            target: "List scripted items".into(),
            decision: ConfirmDecision::Skipped,
        }))
        .run(&h.options(true, false))
        .await
        .unwrap();

    assert!(outcome.aborted);
    assert_eq!(outcome.total, 0);
    assert!(!outcome.is_success());
    assert_eq!(h.listings.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cleanup_runs_only_after_a_success() {
    let h = Harness::new();
    let staged = h.dir.path().join("staging").join("acme").join("repositories");
    std::fs::create_dir_all(staged.join("A")).unwrap();

    h.runner.fail_on("A", Phase::Download);
    let outcome = h
        .orchestrator_with(h.configuration(), &["A"], Some(staged.clone()), false)
        .run(&h.options(true, true))
        .await
        .unwrap();
    assert_eq!(outcome.succeeded, 0);
    assert!(staged.join("A").is_dir());

    h.runner.clear_failures();
    let outcome = h
        .orchestrator_with(h.configuration(), &["A"], Some(staged.clone()), false)
        .run(&h.options(true, true))
        .await
        .unwrap();
    assert_eq!(outcome.succeeded, 1);
    assert!(!staged.join("A").exists());
}

#[tokio::test]
async fn test_abort_counts_items_completed_by_earlier_runs() {
    let h = Harness::new();
    h.runner.fail_on("A", Phase::Upload);
    h.run(&["A", "B", "C"]).await.unwrap();
    h.runner.clear_failures();
    h.runner.take_calls();

    let outcome = h
        .orchestrator(h.configuration(), &["A", "B", "C"])
        .with_confirmer(Box::new(ScriptedConfirmer {
            target: "Upload A".into(),
            decision: ConfirmDecision::Aborted,
        }))
        .run(&h.options(true, false))
        .await
        .unwrap();

    assert!(outcome.aborted);
    assert_eq!((outcome.succeeded, outcome.skipped, outcome.total), (2, 1, 3));
    assert!(h.runner.take_calls().is_empty());
}

fn github_plan(h: &Harness) -> GithubPlan {
    GithubPlan::new(
        h.configuration(),
        "acme",
        "",
        Toolchain::default(),
        Some(S3Locator::new("acme-github-backups", "github_backups/acme")),
    )
}

#[tokio::test]
async fn test_cleanup_keeps_staging_of_unfinished_items_for_resume() {
    let h = Harness::new();
    let runner = Arc::new(FilesystemRunner::default());
    runner.failing_archives.lock().unwrap().insert("B".into());
    let ids = ["A", "B", "C"];

    let first = JobOrchestrator::new(Box::new(github_plan(&h)), Box::new(h.lister(&ids, false)), runner.clone())
        .with_preflight(Box::new(NoPreflight))
        .run(&h.options(true, true))
        .await
        .unwrap();
    assert_eq!((first.succeeded, first.total, first.failed), (2, 3, 1));

    let job_dir = h.dir.path().join("staging").join("acme").join(&first.job_id);
    assert!(!job_dir.join("repositories/A").exists());
    assert!(!job_dir.join("archives/C").exists());
    assert!(job_dir.join("repositories/B/HEAD").is_file());
    runner.take_calls();
    runner.failing_archives.lock().unwrap().clear();

    let second = JobOrchestrator::new(Box::new(github_plan(&h)), Box::new(h.lister(&ids, false)), runner.clone())
        .with_preflight(Box::new(NoPreflight))
        .run(&h.options(true, true))
        .await
        .unwrap();
    assert_eq!((second.succeeded, second.total, second.failed), (3, 3, 0));
    assert_eq!(runner.take_calls(), calls(&["dar:B", "aws:B"]));
    assert!(h.checkpoint().is_item_complete("B"));
    // Everything is done, so the whole job directory is gone
    assert!(!h.dir.path().join("staging").join("acme").exists());
}
