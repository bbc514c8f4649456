//! Typed error hierarchy for coldstore.
//!
//! One enum per seam of a job:
//! - `CheckpointError`: loading and persisting checkpoint files
//! - `ExecutionError`: one external tool invocation
//! - `PhaseError`: one phase of one item (isolated to that item)
//! - `ListingError`: enumerating work items at the source
//! - `OrchestratorError`: job-fatal conditions surfaced by the orchestrator

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the checkpoint store.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Checkpoint at {path} uses schema version {found}, this build supports {supported}")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("Failed to persist checkpoint at {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read checkpoint at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome classification for a failed external tool invocation.
///
/// A non-zero exit is the normal failure signal of a tool and is kept apart
/// from a missing binary (environment problem) and from everything else.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Command '{program}' was not found. Is it installed and in PATH?")]
    ToolNotFound { program: String },

    #[error("Command exited with code {code}")]
    NonZeroExit {
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Unexpected failure running command: {0}")]
    UnexpectedFailure(String),
}

impl ExecutionError {
    /// Last non-empty stderr line, for one-line failure summaries.
    pub fn stderr_tail(&self) -> Option<&str> {
        match self {
            ExecutionError::NonZeroExit { stderr, .. } => {
                stderr.lines().rev().find(|l| !l.trim().is_empty())
            }
            _ => None,
        }
    }
}

/// Item-level failure while running one phase. Never fatal to the job.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("Step '{step}' failed: {source}")]
    Execution {
        step: String,
        #[source]
        source: ExecutionError,
    },

    #[error("Failed to prepare {path}: {source}")]
    Preparation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing input: {0}")]
    MissingInput(String),
}

impl PhaseError {
    /// One-line description, with the tool's last stderr line when there is one.
    pub fn summary(&self) -> String {
        match self {
            PhaseError::Execution { source, .. } => match source.stderr_tail() {
                Some(tail) => format!("{} ({})", self, tail.trim()),
                None => self.to_string(),
            },
            _ => self.to_string(),
        }
    }
}

/// Errors from a listing provider.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("Listing request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Listing returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Listing response could not be decoded: {0}")]
    Decode(String),
}

/// Job-fatal errors from the orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Precondition failed: {message}\n  hint: {hint}")]
    Precondition { message: String, hint: String },

    #[error(
        "Checkpoint {path} belongs to a different job (mismatched: {}). Use --no-resume or a different --checkpoint-file",
        fields.join(", ")
    )]
    ConfigurationMismatch { path: PathBuf, fields: Vec<String> },

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Failed to list work items: {0}")]
    Listing(#[from] ListingError),

    #[error("Confirmation prompt failed: {0}")]
    Confirmation(String),
}

impl OrchestratorError {
    pub fn precondition(message: impl Into<String>, hint: impl Into<String>) -> Self {
        OrchestratorError::Precondition {
            message: message.into(),
            hint: hint.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_tool_not_found_names_program() {
        let err = ExecutionError::ToolNotFound {
            program: "dar".into(),
        };
        assert!(err.to_string().contains("'dar'"));
    }

    #[test]
    fn stderr_tail_returns_last_non_empty_line() {
        let err = ExecutionError::NonZeroExit {
            code: 1,
            stdout: String::new(),
            stderr: "first\nfatal: repository not found\n\n".into(),
        };
        assert_eq!(err.stderr_tail(), Some("fatal: repository not found"));
        assert_eq!(ExecutionError::UnexpectedFailure("x".into()).stderr_tail(), None);
    }

    #[test]
    fn phase_error_summary_appends_stderr_tail() {
        let err = PhaseError::Execution {
            step: "Cloning api".into(),
            source: ExecutionError::NonZeroExit {
                code: 128,
                stdout: String::new(),
                stderr: "fatal: repository not found\n".into(),
            },
        };
        assert_eq!(
            err.summary(),
            "Step 'Cloning api' failed: Command exited with code 128 (fatal: repository not found)"
        );
        assert_eq!(
            PhaseError::MissingInput("no volumes".into()).summary(),
            "Missing input: no volumes"
        );
    }

    #[test]
    fn configuration_mismatch_lists_fields() {
        let err = OrchestratorError::ConfigurationMismatch {
            path: PathBuf::from("/tmp/job.json"),
            fields: vec!["dest_bucket".into(), "mirror_delete".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("dest_bucket, mirror_delete"));
        assert!(msg.contains("--no-resume"));
    }

    #[test]
    fn orchestrator_error_converts_from_checkpoint_error() {
        let inner = CheckpointError::UnsupportedVersion {
            path: PathBuf::from("/x.json"),
            found: 9,
            supported: 1,
        };
        let err: OrchestratorError = inner.into();
        assert!(matches!(
            err,
            OrchestratorError::Checkpoint(CheckpointError::UnsupportedVersion { found: 9, .. })
        ));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ExecutionError::UnexpectedFailure("x".into()));
        assert_std_error(&ListingError::Decode("x".into()));
        assert_std_error(&OrchestratorError::precondition("a", "b"));
    }
}
