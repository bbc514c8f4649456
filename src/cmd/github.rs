//! GitHub organization backup: `coldstore github <ORG>`.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use coldstore::job::{JobConfiguration, JobKind, JobOptions, S3Locator};
use coldstore::listing::GithubOrgLister;
use coldstore::orchestrator::JobOutcome;
use coldstore::plan::GithubPlan;
use coldstore::plan::github::TOKEN_ENV;

use super::super::Cli;
use super::job::{JobArgs, load_config, resolve_storage_class, resolve_volume_size, run_job};

#[derive(Args, Debug, Clone)]
pub struct GithubArgs {
    /// GitHub organization to back up
    pub org: String,

    /// Staging directory for clones and archives
    #[arg(long)]
    pub local_path: Option<PathBuf>,

    /// Include forked repositories
    #[arg(long)]
    pub include_forks: bool,

    /// Also mirror repository wikis
    #[arg(long)]
    pub include_wikis: bool,

    /// Fetch Git LFS objects
    #[arg(long)]
    pub include_lfs: bool,

    /// Only mirror; do not create archive volumes
    #[arg(long)]
    pub no_archives: bool,

    /// Archive volume size, e.g. 1G or 500M
    #[arg(long)]
    pub volume_size: Option<String>,

    /// Keep archives local; do not upload
    #[arg(long)]
    pub no_s3_upload: bool,

    /// AWS profile for the destination bucket
    #[arg(long, default_value = "")]
    pub dest_profile: String,

    /// Destination bucket (default: <org>-github-backups)
    #[arg(long)]
    pub dest_bucket: Option<String>,

    /// Prefix inside the destination bucket (default: github_backups/<org>)
    #[arg(long)]
    pub dest_s3_path: Option<String>,

    /// S3 storage class for uploaded volumes
    #[arg(long)]
    pub storage_class: Option<String>,

    #[command(flatten)]
    pub job: JobArgs,
}

pub async fn cmd_github(cli: &Cli, args: &GithubArgs) -> Result<JobOutcome> {
    let config = load_config(cli)?;
    let org = args.org.trim().to_string();
    if org.is_empty() {
        anyhow::bail!("Organization name must not be empty");
    }

    let create_archives = !args.no_archives;
    let upload = create_archives && !args.no_s3_upload;
    let destination = upload.then(|| {
        let bucket = args
            .dest_bucket
            .clone()
            .unwrap_or_else(|| format!("{}-github-backups", org));
        let path = args
            .dest_s3_path
            .clone()
            .unwrap_or_else(|| format!("github_backups/{}", org));
        S3Locator::new(bucket, path)
    });

    let volume_size = if create_archives {
        Some(resolve_volume_size(args.volume_size.as_deref(), &config)?)
    } else {
        None
    };
    let storage_class = if upload {
        Some(resolve_storage_class(args.storage_class.as_deref(), &config)?)
    } else {
        None
    };

    let configuration = JobConfiguration {
        kind: JobKind::Github,
        source: format!("github:{}", org),
        destination: destination
            .as_ref()
            .map(|d| d.prefix_uri())
            .unwrap_or_default(),
        target_name: org.clone(),
        staging_root: args
            .local_path
            .clone()
            .unwrap_or_else(|| config.staging_root(JobKind::Github)),
        source_profile: String::new(),
        dest_profile: args.dest_profile.clone(),
        storage_class,
        volume_size,
        options: JobOptions {
            include_forks: args.include_forks,
            include_wikis: args.include_wikis,
            include_lfs: args.include_lfs,
            create_archives,
            upload,
            mirror_delete: false,
            cleanup: args.job.cleanup,
        },
    };

    // Presence is checked by preflight before anything uses the token
    let token = std::env::var(TOKEN_ENV).unwrap_or_default();
    let lister = GithubOrgLister::new(
        config.defaults.github_api.clone(),
        org.clone(),
        token.clone(),
        args.include_forks,
    );
    let plan = GithubPlan::new(configuration, org, token, config.toolchain(), destination);

    run_job(cli, Box::new(plan), Box::new(lister), &args.job).await
}
