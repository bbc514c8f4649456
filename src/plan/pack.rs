//! Pack a local folder into archive volumes and upload them.

use std::path::PathBuf;

use super::{CleanupTarget, JobContext, JobPlan, PhaseStep, PhaseWork, Toolchain, find_volumes};
use crate::errors::PhaseError;
use crate::executor::ToolCommand;
use crate::job::{JobConfiguration, Phase, S3Locator, WorkItem};
use crate::preflight::Requirements;

pub struct PackPlan {
    configuration: JobConfiguration,
    folder: PathBuf,
    name: String,
    destination: S3Locator,
    tools: Toolchain,
}

impl PackPlan {
    pub fn new(
        configuration: JobConfiguration,
        folder: PathBuf,
        destination: S3Locator,
        tools: Toolchain,
    ) -> Self {
        let name = configuration.target_name.clone();
        Self {
            configuration,
            folder,
            name,
            destination,
            tools,
        }
    }

    /// `<name>_<job_id>`, used for both the archive directory and the volume base name.
    fn archive_name(&self, ctx: &JobContext) -> String {
        format!("{}_{}", self.name, ctx.job_id)
    }

    pub fn archive_dir(&self, ctx: &JobContext) -> PathBuf {
        self.configuration.staging_root.join(self.archive_name(ctx))
    }

    fn upload_destination(&self, ctx: &JobContext) -> String {
        self.destination.join(&ctx.job_id).prefix_uri()
    }
}

impl JobPlan for PackPlan {
    fn configuration(&self) -> &JobConfiguration {
        &self.configuration
    }

    fn phases(&self) -> Vec<Phase> {
        vec![Phase::Archive, Phase::Upload]
    }

    fn requirements(&self) -> Requirements {
        Requirements {
            tools: vec![self.tools.dar_requirement(), self.tools.aws_requirement()],
            profiles: vec![self.configuration.dest_profile.clone()],
            directories: vec![self.folder.clone()],
            ..Default::default()
        }
    }

    fn phase_work(
        &self,
        ctx: &JobContext,
        _item: &WorkItem,
        phase: Phase,
    ) -> Result<PhaseWork, PhaseError> {
        let archive_dir = self.archive_dir(ctx);
        match phase {
            Phase::Archive => {
                let volume_size = self.configuration.volume_size.clone().unwrap_or_default();
                let command = ToolCommand::new(&self.tools.dar)
                    .args(["-w", "-s", volume_size.as_str(), "-c"])
                    .path_arg(&archive_dir.join(self.archive_name(ctx)))
                    .arg("-R")
                    .path_arg(&self.folder);
                Ok(PhaseWork {
                    steps: vec![PhaseStep::required("Creating archive volumes", command)],
                    ensure_dirs: vec![archive_dir.clone()],
                    reset_dir: Some(archive_dir),
                })
            }
            Phase::Upload => {
                let storage_class = self.configuration.storage_class.unwrap_or_default();
                let command = self
                    .tools
                    .s3_sync(
                        &archive_dir.display().to_string(),
                        &self.upload_destination(ctx),
                        &self.configuration.dest_profile,
                    )
                    .args(["--storage-class", storage_class.as_str()]);
                Ok(PhaseWork {
                    steps: vec![PhaseStep::required("Uploading archive volumes", command)],
                    ..Default::default()
                })
            }
            other => Err(PhaseError::MissingInput(format!(
                "{} is not part of a pack job",
                other
            ))),
        }
    }

    fn artifacts(&self, ctx: &JobContext, _item: &WorkItem, phase: Phase) -> Vec<String> {
        match phase {
            Phase::Archive => find_volumes(&self.archive_dir(ctx), &self.archive_name(ctx)),
            Phase::Upload => {
                let dest = self.upload_destination(ctx);
                let volumes = find_volumes(&self.archive_dir(ctx), &self.archive_name(ctx));
                if volumes.is_empty() {
                    vec![dest]
                } else {
                    volumes.into_iter().map(|v| format!("{}{}", dest, v)).collect()
                }
            }
            _ => Vec::new(),
        }
    }

    fn cleanup_targets(&self, ctx: &JobContext, _item: &WorkItem) -> Vec<CleanupTarget> {
        vec![CleanupTarget::dir(self.archive_dir(ctx))]
    }
}
