//! Configuration view and validation commands: `coldstore config`.

use anyhow::Result;

use coldstore::config::{ColdstoreToml, config_path};
use coldstore::job::JobKind;

use super::super::{Cli, ConfigCommands};

pub fn cmd_config(cli: &Cli, command: Option<ConfigCommands>) -> Result<()> {
    let path = config_path(cli.config.as_deref());
    let config = ColdstoreToml::load_or_default(cli.config.as_deref())?;

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Coldstore Configuration");
            println!("=======================");
            println!();

            match path {
                Some(ref p) if p.exists() => println!("Config file: {}", p.display()),
                Some(ref p) => println!("Config file: {} (not found, using defaults)", p.display()),
                None => println!("Config file: none (using defaults)"),
            }
            println!();

            // Effective values after environment overrides
            let tools = config.toolchain();
            println!("[tools]");
            println!("  git = \"{}\"", tools.git);
            println!("  dar = \"{}\"", tools.dar);
            println!("  aws = \"{}\"", tools.aws);
            println!();

            println!("[staging]");
            for kind in [JobKind::Github, JobKind::S3, JobKind::Pack, JobKind::Unpack] {
                println!("  {} = \"{}\"", kind, config.staging_root(kind).display());
            }
            println!();

            println!("[defaults]");
            println!("  volume_size = \"{}\"", config.defaults.volume_size);
            println!("  storage_class = \"{}\"", config.defaults.storage_class);
            println!("  github_api = \"{}\"", config.defaults.github_api);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid");
            } else {
                println!("Configuration warnings:");
                for warning in &warnings {
                    println!("  - {}", warning);
                }
                anyhow::bail!("{} configuration problem(s) found", warnings.len());
            }
        }
    }
    Ok(())
}
