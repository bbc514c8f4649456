use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

mod cmd;

#[derive(Parser)]
#[command(name = "coldstore")]
#[command(
    version,
    about = "Resumable backups of GitHub organizations, S3 folders and local folders to cold storage"
)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Approve every step without asking
    #[arg(long, global = true)]
    pub yes: bool,

    /// Path to coldstore.toml (default: $COLDSTORE_CONFIG, then ~/.config/coldstore/coldstore.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mirror, archive and upload every repository of a GitHub organization
    Github(cmd::github::GithubArgs),
    /// Copy an S3 folder to another bucket through local staging
    S3(cmd::s3::S3Args),
    /// Archive a local folder into volumes and upload them
    Pack(cmd::pack::PackArgs),
    /// Download archive volumes and extract them
    Unpack(cmd::unpack::UnpackArgs),
    /// Delete local S3 staging data
    ClearStaging(cmd::staging::ClearStagingArgs),
    /// Show the progress recorded in a checkpoint file
    Status {
        #[arg(long)]
        checkpoint_file: PathBuf,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Check the configuration file for problems
    Validate,
}

/// Initialize tracing. `RUST_LOG` wins; otherwise `coldstore=info`, or
/// `coldstore=debug` with `--verbose`. `LOG_FORMAT=json` selects JSON output.
///
/// The returned guard flushes the log file writer and must outlive the run.
fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let default_level = if verbose { "coldstore=debug" } else { "coldstore=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let (file_writer, guard) = match log_file {
        Some(path) => {
            let dir = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let name = path
                .file_name()
                .with_context(|| format!("Invalid log file path {}", path.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    // stdout is reserved for command output
    match (file_writer, json) {
        (Some(file), true) => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr.and(file))
            .init(),
        (Some(file), false) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr.and(file))
            .init(),
        (None, true) => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        (None, false) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    Ok(guard)
}

fn job_exit(outcome: &coldstore::orchestrator::JobOutcome) -> ExitCode {
    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose, cli.log_file.as_deref())?;

    let code = match &cli.command {
        Commands::Github(args) => job_exit(&cmd::cmd_github(&cli, args).await?),
        Commands::S3(args) => job_exit(&cmd::cmd_s3(&cli, args).await?),
        Commands::Pack(args) => job_exit(&cmd::cmd_pack(&cli, args).await?),
        Commands::Unpack(args) => job_exit(&cmd::cmd_unpack(&cli, args).await?),
        Commands::ClearStaging(args) => {
            cmd::cmd_clear_staging(&cli, args)?;
            ExitCode::SUCCESS
        }
        Commands::Status { checkpoint_file } => {
            cmd::cmd_status(checkpoint_file)?;
            ExitCode::SUCCESS
        }
        Commands::Config { command } => {
            cmd::cmd_config(&cli, command.clone())?;
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}
