//! Restore archive volumes from S3: `coldstore unpack <DEST_FOLDER>`.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use coldstore::job::{JobConfiguration, JobKind, JobOptions, S3Locator, WorkItem};
use coldstore::listing::SingleItem;
use coldstore::orchestrator::JobOutcome;
use coldstore::plan::UnpackPlan;

use super::super::Cli;
use super::job::{JobArgs, load_config, run_job};

#[derive(Args, Debug, Clone)]
pub struct UnpackArgs {
    /// Folder the archive is extracted into
    pub dest_folder: PathBuf,

    /// Location of the volumes, e.g. s3://bucket/packed_folders/photos/20250101_120000
    #[arg(long)]
    pub s3_path: String,

    /// AWS profile for the source bucket
    #[arg(long, default_value = "")]
    pub source_profile: String,

    /// Directory volumes are downloaded into
    #[arg(long)]
    pub base_download_path: Option<PathBuf>,

    #[command(flatten)]
    pub job: JobArgs,
}

pub async fn cmd_unpack(cli: &Cli, args: &UnpackArgs) -> Result<JobOutcome> {
    let config = load_config(cli)?;
    let source: S3Locator = args
        .s3_path
        .parse()
        .with_context(|| format!("Invalid --s3-path '{}'", args.s3_path))?;

    let destination = std::path::absolute(&args.dest_folder)
        .with_context(|| format!("Invalid destination {}", args.dest_folder.display()))?;

    let configuration = JobConfiguration {
        kind: JobKind::Unpack,
        source: source.prefix_uri(),
        destination: destination.display().to_string(),
        target_name: source.key.rsplit('/').next().unwrap_or(&source.key).to_string(),
        staging_root: args
            .base_download_path
            .clone()
            .unwrap_or_else(|| config.staging_root(JobKind::Unpack)),
        source_profile: args.source_profile.clone(),
        dest_profile: String::new(),
        storage_class: None,
        volume_size: None,
        options: JobOptions {
            cleanup: args.job.cleanup,
            ..Default::default()
        },
    };

    let item = WorkItem::new(source.key.clone(), source.prefix_uri());
    let plan = UnpackPlan::new(configuration, source, destination, config.toolchain());

    run_job(cli, Box::new(plan), Box::new(SingleItem(item)), &args.job).await
}
