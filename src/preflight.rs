//! Precondition checks that run before a job touches anything.
//!
//! Every failure here is fatal and carries a remediation hint. Nothing is
//! written (not even the checkpoint) until all checks pass.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::OrchestratorError;

/// An external program the job will invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequirement {
    pub program: String,
    pub hint: String,
}

impl ToolRequirement {
    pub fn new(program: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            hint: hint.into(),
        }
    }
}

/// Everything a job needs from its environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    pub tools: Vec<ToolRequirement>,
    /// Named AWS profiles; empty names mean default credentials and are skipped
    pub profiles: Vec<String>,
    /// Directories that must already exist
    pub directories: Vec<PathBuf>,
    /// Environment variables that must be set and non-empty
    pub env_vars: Vec<String>,
}

pub trait Preflight: Send + Sync {
    fn check(&self, requirements: &Requirements) -> Result<(), OrchestratorError>;
}

/// Checks against the real environment: `PATH`, the AWS config files, the filesystem.
#[derive(Debug, Clone, Default)]
pub struct SystemPreflight;

impl Preflight for SystemPreflight {
    fn check(&self, requirements: &Requirements) -> Result<(), OrchestratorError> {
        for tool in &requirements.tools {
            match resolve_program(&tool.program) {
                Some(path) => debug!(program = %tool.program, path = %path.display(), "Tool found"),
                None => {
                    return Err(OrchestratorError::precondition(
                        format!("Required tool '{}' was not found", tool.program),
                        tool.hint.clone(),
                    ));
                }
            }
        }

        let config_file = aws_file("AWS_CONFIG_FILE", "config");
        let credentials_file = aws_file("AWS_SHARED_CREDENTIALS_FILE", "credentials");
        for profile in requirements.profiles.iter().filter(|p| !p.is_empty()) {
            if !profile_exists(profile, config_file.as_deref(), credentials_file.as_deref()) {
                return Err(OrchestratorError::precondition(
                    format!("AWS profile '{}' does not exist", profile),
                    format!("Configure it with: aws configure --profile {}", profile),
                ));
            }
        }

        for dir in &requirements.directories {
            if !dir.is_dir() {
                return Err(OrchestratorError::precondition(
                    format!("Folder '{}' does not exist or is not a directory", dir.display()),
                    "Check the path and try again",
                ));
            }
        }

        for var in &requirements.env_vars {
            if std::env::var(var).map(|v| v.trim().is_empty()).unwrap_or(true) {
                return Err(OrchestratorError::precondition(
                    format!("{} is not set", var),
                    format!("Export {} or add it to a .env file", var),
                ));
            }
        }

        Ok(())
    }
}

/// Accepts everything. For headless tests with a scripted tool layer.
#[derive(Debug, Clone, Default)]
pub struct NoPreflight;

impl Preflight for NoPreflight {
    fn check(&self, _requirements: &Requirements) -> Result<(), OrchestratorError> {
        Ok(())
    }
}

/// Locate a program the way a shell would: paths are checked directly,
/// bare names are searched on `PATH`.
pub fn resolve_program(program: &str) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|full| is_executable(full))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn aws_file(env_var: &str, name: &str) -> Option<PathBuf> {
    std::env::var_os(env_var)
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|h| h.join(".aws").join(name)))
}

/// True when `profile` is declared in either AWS file.
///
/// The config file uses `[profile NAME]` headers (and `[default]`); the
/// credentials file uses bare `[NAME]`.
pub fn profile_exists(profile: &str, config_file: Option<&Path>, credentials_file: Option<&Path>) -> bool {
    let in_config = config_file
        .and_then(|p| std::fs::read_to_string(p).ok())
        .is_some_and(|content| {
            section_names(&content).any(|s| {
                s.strip_prefix("profile ").map(str::trim) == Some(profile)
                    || (profile == "default" && s == "default")
            })
        });
    let in_credentials = credentials_file
        .and_then(|p| std::fs::read_to_string(p).ok())
        .is_some_and(|content| section_names(&content).any(|s| s == profile));
    in_config || in_credentials
}

fn section_names(content: &str) -> impl Iterator<Item = &str> {
    content.lines().filter_map(|line| {
        line.trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .map(str::trim)
    })
}
