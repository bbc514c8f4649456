//! Job plans: what each job kind does per item and per phase.
//!
//! A plan is pure description. It turns `(item, phase)` into the tool
//! commands to run and tells the orchestrator which directories to prepare,
//! which artifacts a finished phase produced and what to clean up at the end.
//! The orchestrator owns sequencing, checkpointing and failure policy.

pub mod github;
pub mod pack;
pub mod s3;
pub mod unpack;

pub use github::GithubPlan;
pub use pack::PackPlan;
pub use s3::S3Plan;
pub use unpack::UnpackPlan;

use std::path::{Path, PathBuf};

use crate::errors::PhaseError;
use crate::executor::ToolCommand;
use crate::job::{JobConfiguration, Phase, WorkItem};
use crate::preflight::{Requirements, ToolRequirement};

/// Programs used to run the external tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub git: String,
    pub dar: String,
    pub aws: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            dar: "dar".to_string(),
            aws: "aws".to_string(),
        }
    }
}

impl Toolchain {
    pub fn git_requirement(&self) -> ToolRequirement {
        ToolRequirement::new(
            &self.git,
            "Install git (https://git-scm.com/downloads) or set COLDSTORE_GIT",
        )
    }

    pub fn dar_requirement(&self) -> ToolRequirement {
        ToolRequirement::new(
            &self.dar,
            "Install dar (e.g. `apt install dar` or `brew install dar`) or set COLDSTORE_DAR",
        )
    }

    pub fn aws_requirement(&self) -> ToolRequirement {
        ToolRequirement::new(
            &self.aws,
            "Install the AWS CLI (https://aws.amazon.com/cli/) or set COLDSTORE_AWS",
        )
    }

    /// `aws s3 sync SRC DEST [--profile P]`
    pub fn s3_sync(&self, source: &str, dest: &str, profile: &str) -> ToolCommand {
        let cmd = ToolCommand::new(&self.aws).args(["s3", "sync", source, dest]);
        with_profile(cmd, profile)
    }
}

fn with_profile(cmd: ToolCommand, profile: &str) -> ToolCommand {
    if profile.is_empty() {
        cmd
    } else {
        cmd.args(["--profile", profile])
    }
}

/// Values that only exist once a checkpoint has been created or restored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    pub job_id: String,
}

impl JobContext {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
        }
    }
}

/// One command inside a phase.
#[derive(Debug, Clone)]
pub struct PhaseStep {
    pub description: String,
    pub command: ToolCommand,
    /// Failure is logged as a warning and the phase continues
    pub best_effort: bool,
}

impl PhaseStep {
    pub fn required(description: impl Into<String>, command: ToolCommand) -> Self {
        Self {
            description: description.into(),
            command,
            best_effort: false,
        }
    }

    pub fn best_effort(description: impl Into<String>, command: ToolCommand) -> Self {
        Self {
            description: description.into(),
            command,
            best_effort: true,
        }
    }
}

/// Everything needed to run one phase for one item.
#[derive(Debug, Clone, Default)]
pub struct PhaseWork {
    pub steps: Vec<PhaseStep>,
    /// Created before the first step
    pub ensure_dirs: Vec<PathBuf>,
    /// Removed (if present) before the first step, for outputs that must start empty
    pub reset_dir: Option<PathBuf>,
}

impl PhaseWork {
    /// The command shown when asking for confirmation.
    pub fn primary_command(&self) -> Option<&ToolCommand> {
        self.steps
            .iter()
            .find(|s| !s.best_effort)
            .or_else(|| self.steps.first())
            .map(|s| &s.command)
    }
}

/// A directory removed during cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupTarget {
    pub path: PathBuf,
    /// When set, empty parents are removed up to (not including) this directory
    pub prune_until: Option<PathBuf>,
}

impl CleanupTarget {
    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            prune_until: None,
        }
    }

    pub fn pruning(path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            prune_until: Some(root.into()),
        }
    }
}

/// Per-kind job description consumed by the orchestrator.
pub trait JobPlan: Send + Sync {
    fn configuration(&self) -> &JobConfiguration;

    /// Phases every item passes through, in execution order.
    fn phases(&self) -> Vec<Phase>;

    fn requirements(&self) -> Requirements;

    /// Commands and preparation for one phase of one item.
    ///
    /// Called right before the phase runs, so it may inspect the filesystem
    /// (existing mirrors, downloaded volumes).
    fn phase_work(
        &self,
        ctx: &JobContext,
        item: &WorkItem,
        phase: Phase,
    ) -> Result<PhaseWork, PhaseError>;

    /// Identifiers produced by a phase that just succeeded.
    fn artifacts(&self, ctx: &JobContext, item: &WorkItem, phase: Phase) -> Vec<String>;

    /// Local staging owned by one completed item.
    ///
    /// Only asked for items the checkpoint records as complete, so staging
    /// that an unfinished item still needs on resume is never returned.
    fn cleanup_targets(&self, ctx: &JobContext, item: &WorkItem) -> Vec<CleanupTarget>;
}

/// Sorted file names of the volumes `<base>.<n>.dar` in `dir`.
pub fn find_volumes(dir: &Path, base: &str) -> Vec<String> {
    let pattern = dir.join(format!("{}.*.dar", glob::Pattern::escape(base)));
    let Some(pattern) = pattern.to_str() else {
        return Vec::new();
    };
    let mut names: Vec<String> = glob::glob(pattern)
        .map(|paths| {
            paths
                .filter_map(|p| p.ok())
                .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .collect()
        })
        .unwrap_or_default();
    names.sort_by_key(|name| volume_number(name).unwrap_or(u64::MAX));
    names
}

/// `repo.12.dar` -> 12
fn volume_number(name: &str) -> Option<u64> {
    name.strip_suffix(".dar")?.rsplit('.').next()?.parse().ok()
}
