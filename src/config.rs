//! Configuration file support for coldstore.
//!
//! Settings are layered: `coldstore.toml` → environment → CLI flags. The file
//! is optional; every value has a default.
//!
//! # Configuration File Format
//!
//! ```toml
//! [tools]
//! git = "/usr/bin/git"
//! dar = "dar"
//! aws = "/opt/aws/bin/aws"
//!
//! [staging]
//! github = "~/github_backup_staging"
//! s3 = "/mnt/scratch/s3_staging"
//! pack = "~/pack_archive_staging"
//! unpack = "~/unpack_staging"
//!
//! [defaults]
//! volume_size = "1G"
//! storage_class = "DEEP_ARCHIVE"
//! github_api = "https://api.github.com"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::job::{JobKind, StorageClass, VolumeSize};
use crate::listing::DEFAULT_GITHUB_API;
use crate::plan::Toolchain;

pub const CONFIG_ENV: &str = "COLDSTORE_CONFIG";
pub const GIT_ENV: &str = "COLDSTORE_GIT";
pub const DAR_ENV: &str = "COLDSTORE_DAR";
pub const AWS_ENV: &str = "COLDSTORE_AWS";

/// Program overrides for the external tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<String>,
}

/// Local staging roots per job kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unpack: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultsSection {
    #[serde(default = "default_volume_size")]
    pub volume_size: String,
    #[serde(default = "default_storage_class")]
    pub storage_class: String,
    #[serde(default = "default_github_api")]
    pub github_api: String,
}

fn default_volume_size() -> String {
    VolumeSize::default().to_string()
}

fn default_storage_class() -> String {
    StorageClass::default().to_string()
}

fn default_github_api() -> String {
    DEFAULT_GITHUB_API.to_string()
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            volume_size: default_volume_size(),
            storage_class: default_storage_class(),
            github_api: default_github_api(),
        }
    }
}

/// The complete coldstore.toml configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColdstoreToml {
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub staging: StagingSection,
    #[serde(default)]
    pub defaults: DefaultsSection,
}

impl ColdstoreToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse coldstore.toml")
    }

    /// Load from the resolved location, or defaults if there is no file.
    ///
    /// An explicitly requested file must exist.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match config_path(None) {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize coldstore.toml")
    }

    /// Programs for the external tools: environment, then file, then bare names.
    pub fn toolchain(&self) -> Toolchain {
        let defaults = Toolchain::default();
        Toolchain {
            git: layered(std::env::var(GIT_ENV).ok(), self.tools.git.clone(), defaults.git),
            dar: layered(std::env::var(DAR_ENV).ok(), self.tools.dar.clone(), defaults.dar),
            aws: layered(std::env::var(AWS_ENV).ok(), self.tools.aws.clone(), defaults.aws),
        }
    }

    /// Staging root for a job kind, with `~` expanded.
    pub fn staging_root(&self, kind: JobKind) -> PathBuf {
        let (configured, fallback) = match kind {
            JobKind::Github => (&self.staging.github, "github_backup_staging"),
            JobKind::S3 => (&self.staging.s3, "s3_backup_staging"),
            JobKind::Pack => (&self.staging.pack, "pack_archive_staging"),
            JobKind::Unpack => (&self.staging.unpack, "unpack_staging"),
        };
        match configured {
            Some(path) => expand_tilde(path),
            None => home_dir().join(fallback),
        }
    }

    pub fn volume_size(&self) -> Result<VolumeSize> {
        self.defaults.volume_size.parse()
    }

    pub fn storage_class(&self) -> Result<StorageClass> {
        self.defaults.storage_class.parse()
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Err(e) = self.volume_size() {
            warnings.push(format!("[defaults] volume_size: {}", e));
        }
        if let Err(e) = self.storage_class() {
            warnings.push(format!("[defaults] storage_class: {}", e));
        }
        if !self.defaults.github_api.starts_with("http://")
            && !self.defaults.github_api.starts_with("https://")
        {
            warnings.push(format!(
                "[defaults] github_api '{}' should be an http(s) URL",
                self.defaults.github_api
            ));
        }

        let tools = [
            ("git", &self.tools.git),
            ("dar", &self.tools.dar),
            ("aws", &self.tools.aws),
        ];
        for (name, program) in tools {
            if let Some(program) = program
                && program.trim().is_empty()
            {
                warnings.push(format!("[tools] {} is set but empty", name));
            }
        }

        warnings
    }
}

fn layered(env: Option<String>, file: Option<String>, default: String) -> String {
    env.filter(|v| !v.trim().is_empty())
        .or(file.filter(|v| !v.trim().is_empty()))
        .unwrap_or(default)
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Resolve the config file location: `--config`, then `$COLDSTORE_CONFIG`,
/// then `~/.config/coldstore/coldstore.toml`.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV)
        && !path.trim().is_empty()
    {
        return Some(expand_tilde(Path::new(&path)));
    }
    dirs::home_dir().map(|h| h.join(".config").join("coldstore").join("coldstore.toml"))
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir().join(rest),
        Err(_) => path.to_path_buf(),
    }
}
