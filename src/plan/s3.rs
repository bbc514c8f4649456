//! S3 folder backup: sync a folder from one bucket into local staging, then
//! sync staging into the destination bucket.

use std::path::{Path, PathBuf};

use super::{CleanupTarget, JobContext, JobPlan, PhaseStep, PhaseWork, Toolchain};
use crate::errors::PhaseError;
use crate::job::{JobConfiguration, Phase, S3Locator, WorkItem};
use crate::preflight::Requirements;

pub struct S3Plan {
    configuration: JobConfiguration,
    source: S3Locator,
    destination: S3Locator,
    tools: Toolchain,
}

impl S3Plan {
    pub fn new(
        configuration: JobConfiguration,
        source: S3Locator,
        destination: S3Locator,
        tools: Toolchain,
    ) -> Self {
        Self {
            configuration,
            source,
            destination,
            tools,
        }
    }

    pub fn staging_dir(&self) -> PathBuf {
        staging_dir(
            &self.configuration.staging_root,
            &self.configuration.source_profile,
            &self.source.bucket,
            &self.source.key,
        )
    }
}

/// `<staging>/<profile or "default">/<bucket>/<folder>`
pub fn staging_dir(root: &Path, profile: &str, bucket: &str, folder: &str) -> PathBuf {
    let profile = if profile.is_empty() { "default" } else { profile };
    root.join(profile).join(bucket).join(folder.trim_matches('/'))
}

impl JobPlan for S3Plan {
    fn configuration(&self) -> &JobConfiguration {
        &self.configuration
    }

    fn phases(&self) -> Vec<Phase> {
        vec![Phase::Download, Phase::Upload]
    }

    fn requirements(&self) -> Requirements {
        Requirements {
            tools: vec![self.tools.aws_requirement()],
            profiles: vec![
                self.configuration.source_profile.clone(),
                self.configuration.dest_profile.clone(),
            ],
            ..Default::default()
        }
    }

    fn phase_work(
        &self,
        _ctx: &JobContext,
        _item: &WorkItem,
        phase: Phase,
    ) -> Result<PhaseWork, PhaseError> {
        let staging = self.staging_dir();
        let staging_str = staging.display().to_string();
        match phase {
            Phase::Download => {
                let mut command = self.tools.s3_sync(
                    &self.source.prefix_uri(),
                    &staging_str,
                    &self.configuration.source_profile,
                );
                if self.configuration.options.mirror_delete {
                    command = command.arg("--delete");
                }
                Ok(PhaseWork {
                    steps: vec![PhaseStep::required("Downloading from source bucket", command)],
                    ensure_dirs: vec![staging],
                    reset_dir: None,
                })
            }
            Phase::Upload => {
                let command = self.tools.s3_sync(
                    &staging_str,
                    &self.destination.prefix_uri(),
                    &self.configuration.dest_profile,
                );
                Ok(PhaseWork {
                    steps: vec![PhaseStep::required("Uploading to destination bucket", command)],
                    ..Default::default()
                })
            }
            other => Err(PhaseError::MissingInput(format!(
                "{} is not part of an S3 folder backup",
                other
            ))),
        }
    }

    fn artifacts(&self, _ctx: &JobContext, _item: &WorkItem, phase: Phase) -> Vec<String> {
        match phase {
            Phase::Download => vec![self.staging_dir().display().to_string()],
            Phase::Upload => vec![self.destination.prefix_uri()],
            _ => Vec::new(),
        }
    }

    fn cleanup_targets(&self, _ctx: &JobContext, _item: &WorkItem) -> Vec<CleanupTarget> {
        vec![CleanupTarget {
            path: self.staging_dir(),
            prune_until: Some(self.configuration.staging_root.clone()),
        }]
    }
}
