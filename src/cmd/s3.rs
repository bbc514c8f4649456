//! S3 folder backup: `coldstore s3 <FOLDER>`.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use coldstore::job::{JobConfiguration, JobKind, JobOptions, S3Locator, WorkItem};
use coldstore::listing::SingleItem;
use coldstore::orchestrator::JobOutcome;
use coldstore::plan::S3Plan;

use super::super::Cli;
use super::job::{JobArgs, load_config, run_job};

#[derive(Args, Debug, Clone)]
pub struct S3Args {
    /// Folder (prefix) inside the source bucket
    pub folder: String,

    #[arg(long)]
    pub source_bucket: String,

    #[arg(long)]
    pub dest_bucket: String,

    /// AWS profile for the source bucket (default credentials when omitted)
    #[arg(long, default_value = "")]
    pub source_profile: String,

    /// AWS profile for the destination bucket
    #[arg(long, default_value = "")]
    pub dest_profile: String,

    /// Prefix in the destination bucket (default: the source bucket name)
    #[arg(long)]
    pub dest_base_path: Option<String>,

    /// Local staging directory
    #[arg(long)]
    pub local_path: Option<PathBuf>,

    /// Delete staged files that no longer exist at the source
    #[arg(long)]
    pub use_delete: bool,

    #[command(flatten)]
    pub job: JobArgs,
}

pub async fn cmd_s3(cli: &Cli, args: &S3Args) -> Result<JobOutcome> {
    let config = load_config(cli)?;
    let folder = args.folder.trim_matches('/').to_string();
    if folder.is_empty() {
        anyhow::bail!("Folder name must not be empty");
    }

    let source = S3Locator::new(args.source_bucket.clone(), folder.clone());
    let base = args
        .dest_base_path
        .clone()
        .unwrap_or_else(|| args.source_bucket.clone());
    let destination = S3Locator::new(args.dest_bucket.clone(), base).join(&folder);

    let configuration = JobConfiguration {
        kind: JobKind::S3,
        source: source.prefix_uri(),
        destination: destination.prefix_uri(),
        target_name: folder.clone(),
        staging_root: args
            .local_path
            .clone()
            .unwrap_or_else(|| config.staging_root(JobKind::S3)),
        source_profile: args.source_profile.clone(),
        dest_profile: args.dest_profile.clone(),
        storage_class: None,
        volume_size: None,
        options: JobOptions {
            upload: true,
            mirror_delete: args.use_delete,
            cleanup: args.job.cleanup,
            ..Default::default()
        },
    };

    let item = WorkItem::new(folder, source.prefix_uri());
    let plan = S3Plan::new(configuration, source, destination, config.toolchain());

    run_job(cli, Box::new(plan), Box::new(SingleItem(item)), &args.job).await
}
