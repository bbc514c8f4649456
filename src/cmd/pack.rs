//! Local folder archival: `coldstore pack <FOLDER>`.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use coldstore::job::{JobConfiguration, JobKind, JobOptions, S3Locator, WorkItem};
use coldstore::listing::SingleItem;
use coldstore::orchestrator::JobOutcome;
use coldstore::plan::PackPlan;

use super::super::Cli;
use super::job::{JobArgs, load_config, resolve_storage_class, resolve_volume_size, run_job};

#[derive(Args, Debug, Clone)]
pub struct PackArgs {
    /// Local folder to archive
    pub folder: PathBuf,

    #[arg(long)]
    pub dest_bucket: String,

    /// AWS profile for the destination bucket
    #[arg(long, default_value = "")]
    pub dest_profile: String,

    /// Prefix in the destination bucket (default: packed_folders/<name>)
    #[arg(long)]
    pub dest_path: Option<String>,

    /// S3 storage class for uploaded volumes
    #[arg(long)]
    pub storage_class: Option<String>,

    /// Directory where archive volumes are written
    #[arg(long)]
    pub base_archive_path: Option<PathBuf>,

    /// Archive volume size, e.g. 1G or 500M
    #[arg(long)]
    pub volume_size: Option<String>,

    #[command(flatten)]
    pub job: JobArgs,
}

pub async fn cmd_pack(cli: &Cli, args: &PackArgs) -> Result<JobOutcome> {
    let config = load_config(cli)?;

    // A missing folder is left as given so preflight reports it with a hint
    let folder = std::fs::canonicalize(&args.folder).unwrap_or_else(|_| args.folder.clone());
    let name = folder
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "folder".to_string());

    let dest_path = args
        .dest_path
        .clone()
        .unwrap_or_else(|| format!("packed_folders/{}", name));
    let destination = S3Locator::new(args.dest_bucket.clone(), dest_path);

    let configuration = JobConfiguration {
        kind: JobKind::Pack,
        source: folder.display().to_string(),
        destination: destination.prefix_uri(),
        target_name: name.clone(),
        staging_root: args
            .base_archive_path
            .clone()
            .unwrap_or_else(|| config.staging_root(JobKind::Pack)),
        source_profile: String::new(),
        dest_profile: args.dest_profile.clone(),
        storage_class: Some(resolve_storage_class(args.storage_class.as_deref(), &config)?),
        volume_size: Some(resolve_volume_size(args.volume_size.as_deref(), &config)?),
        options: JobOptions {
            create_archives: true,
            upload: true,
            cleanup: args.job.cleanup,
            ..Default::default()
        },
    };

    let item = WorkItem::new(name, folder.display().to_string());
    let plan = PackPlan::new(configuration, folder, destination, config.toolchain());

    run_job(cli, Box::new(plan), Box::new(SingleItem(item)), &args.job).await
}
