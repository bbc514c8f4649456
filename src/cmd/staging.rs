//! Manual staging cleanup: `coldstore clear-staging`.

use anyhow::Result;
use clap::{ArgGroup, Args};
use std::path::PathBuf;

use coldstore::checkpoint::CHECKPOINT_DIR;
use coldstore::job::JobKind;
use coldstore::plan::s3::staging_dir;
use coldstore::staging::{ClearRequest, ClearResult, clear};
use coldstore::ui::icons::{CLEANUP, FOLDER};

use super::super::Cli;
use super::job::load_config;

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("target").required(true).args(["folder", "all"])))]
pub struct ClearStagingArgs {
    /// Remove the staging copy of one S3 folder
    #[arg(long, requires = "source_bucket")]
    pub folder: Option<String>,

    /// Remove the whole S3 staging directory
    #[arg(long)]
    pub all: bool,

    /// Do not ask for confirmation
    #[arg(long)]
    pub force: bool,

    /// AWS profile the folder was staged under
    #[arg(long, default_value = "")]
    pub source_profile: String,

    /// Bucket the folder was staged from
    #[arg(long)]
    pub source_bucket: Option<String>,

    /// Staging root (default: the configured S3 staging directory)
    #[arg(long)]
    pub staging_path: Option<PathBuf>,
}

pub fn cmd_clear_staging(cli: &Cli, args: &ClearStagingArgs) -> Result<()> {
    use dialoguer::Confirm;

    let config = load_config(cli)?;
    let root = args
        .staging_path
        .clone()
        .unwrap_or_else(|| config.staging_root(JobKind::S3));

    let request = match (&args.folder, &args.source_bucket) {
        (Some(folder), Some(bucket)) => ClearRequest::folder(
            staging_dir(&root, &args.source_profile, bucket, folder),
            &root,
        ),
        (Some(_), None) => anyhow::bail!("--folder requires --source-bucket"),
        // Job checkpoints live under the staging root and are never deleted here
        (None, _) => ClearRequest::root(&root, &[CHECKPOINT_DIR]),
    };

    if !request.path.exists() {
        println!("Nothing to delete: {} does not exist", request.path.display());
        return Ok(());
    }

    let stats = request.stats();
    println!();
    println!("{}Staging path: {}", FOLDER, request.path.display());
    println!("  {} files, {} directories", stats.files, stats.dirs);
    for kept in request.kept_paths() {
        println!("  keeping {}", kept.display());
    }

    if !args.force && !cli.yes {
        let confirm = Confirm::new()
            .with_prompt("Delete this directory and everything in it?")
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Cancelled");
            return Ok(());
        }
    }

    match clear(&request)? {
        ClearResult::Missing => println!("Nothing to delete"),
        ClearResult::Removed(stats) => println!(
            "{}Removed {} ({} files, {} directories)",
            CLEANUP,
            request.path.display(),
            stats.files,
            stats.dirs
        ),
    }
    Ok(())
}
