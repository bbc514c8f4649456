//! Shared plumbing for the four job commands.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use coldstore::checkpoint::default_checkpoint_path;
use coldstore::config::ColdstoreToml;
use coldstore::executor::ProcessRunner;
use coldstore::gates::{AutoApprove, Confirmer, InteractiveConfirmer};
use coldstore::job::{StorageClass, VolumeSize};
use coldstore::listing::ListingProvider;
use coldstore::orchestrator::{JobOrchestrator, JobOutcome, RunOptions};
use coldstore::plan::JobPlan;
use coldstore::ui::JobUI;

use super::super::Cli;

/// Flags every job command accepts.
#[derive(Args, Debug, Clone, Default)]
pub struct JobArgs {
    /// Remove local staging data after a successful run
    #[arg(long)]
    pub cleanup: bool,

    /// Ask before every step (ignored with --yes)
    #[arg(long)]
    pub confirm: bool,

    /// Checkpoint file to use instead of the derived one
    #[arg(long)]
    pub checkpoint_file: Option<PathBuf>,

    /// Ignore any existing checkpoint and start a fresh job
    #[arg(long)]
    pub no_resume: bool,
}

pub fn load_config(cli: &Cli) -> Result<ColdstoreToml> {
    ColdstoreToml::load_or_default(cli.config.as_deref())
}

/// A `--volume-size` flag, else the configured default.
pub fn resolve_volume_size(flag: Option<&str>, config: &ColdstoreToml) -> Result<VolumeSize> {
    match flag {
        Some(value) => value.parse(),
        None => config
            .volume_size()
            .context("Invalid [defaults] volume_size in config"),
    }
}

/// A `--storage-class` flag, else the configured default.
pub fn resolve_storage_class(flag: Option<&str>, config: &ColdstoreToml) -> Result<StorageClass> {
    match flag {
        Some(value) => value.parse(),
        None => config
            .storage_class()
            .context("Invalid [defaults] storage_class in config"),
    }
}

/// Build the orchestrator for a plan and drive it to the end.
pub async fn run_job(
    cli: &Cli,
    plan: Box<dyn JobPlan>,
    lister: Box<dyn ListingProvider>,
    args: &JobArgs,
) -> Result<JobOutcome> {
    let checkpoint_path = args
        .checkpoint_file
        .clone()
        .unwrap_or_else(|| default_checkpoint_path(plan.configuration()));

    let confirmer: Box<dyn Confirmer> = if args.confirm && !cli.yes {
        Box::new(InteractiveConfirmer::new())
    } else {
        Box::new(AutoApprove)
    };

    let interactive = console::Term::stderr().is_term();
    let ui = if interactive {
        JobUI::new(cli.verbose)
    } else {
        JobUI::hidden()
    };

    let mut orchestrator = JobOrchestrator::new(plan, lister, Arc::new(ProcessRunner))
        .with_confirmer(confirmer)
        .with_ui(Arc::new(ui));

    let options = RunOptions {
        checkpoint_path,
        resume: !args.no_resume,
        cleanup: args.cleanup,
    };
    let outcome = orchestrator.run(&options).await?;

    // The progress UI already printed a summary on a terminal
    if !interactive {
        println!(
            "job {}: {}/{} items succeeded, {} failed, {} skipped",
            outcome.job_id, outcome.succeeded, outcome.total, outcome.failed, outcome.skipped
        );
    }
    Ok(outcome)
}
