//! Download archive volumes from S3 and extract them into a local folder.

use std::path::PathBuf;

use super::{CleanupTarget, JobContext, JobPlan, PhaseStep, PhaseWork, Toolchain};
use crate::errors::PhaseError;
use crate::executor::ToolCommand;
use crate::job::{JobConfiguration, Phase, S3Locator, WorkItem};
use crate::preflight::Requirements;

pub struct UnpackPlan {
    configuration: JobConfiguration,
    source: S3Locator,
    destination: PathBuf,
    tools: Toolchain,
}

impl UnpackPlan {
    pub fn new(
        configuration: JobConfiguration,
        source: S3Locator,
        destination: PathBuf,
        tools: Toolchain,
    ) -> Self {
        Self {
            configuration,
            source,
            destination,
            tools,
        }
    }

    /// `<base>/<bucket>/<path>`
    pub fn download_dir(&self) -> PathBuf {
        self.configuration
            .staging_root
            .join(&self.source.bucket)
            .join(&self.source.key)
    }

    /// All downloaded `.dar` files, sorted by name.
    fn downloaded_volumes(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.download_dir())
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .filter(|name| name.ends_with(".dar"))
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Base name of the first archive set (`<base>.1.dar`), if any was downloaded.
    fn archive_base(&self) -> Option<String> {
        self.downloaded_volumes()
            .into_iter()
            .find_map(|name| name.strip_suffix(".1.dar").map(str::to_string))
    }
}

impl JobPlan for UnpackPlan {
    fn configuration(&self) -> &JobConfiguration {
        &self.configuration
    }

    fn phases(&self) -> Vec<Phase> {
        vec![Phase::Download, Phase::Extract]
    }

    fn requirements(&self) -> Requirements {
        Requirements {
            tools: vec![self.tools.aws_requirement(), self.tools.dar_requirement()],
            profiles: vec![self.configuration.source_profile.clone()],
            ..Default::default()
        }
    }

    fn phase_work(
        &self,
        _ctx: &JobContext,
        _item: &WorkItem,
        phase: Phase,
    ) -> Result<PhaseWork, PhaseError> {
        let download_dir = self.download_dir();
        match phase {
            Phase::Download => {
                let command = self.tools.s3_sync(
                    &self.source.prefix_uri(),
                    &download_dir.display().to_string(),
                    &self.configuration.source_profile,
                );
                Ok(PhaseWork {
                    steps: vec![PhaseStep::required("Downloading archive volumes", command)],
                    ensure_dirs: vec![download_dir],
                    reset_dir: None,
                })
            }
            Phase::Extract => {
                let base = self.archive_base().ok_or_else(|| {
                    PhaseError::MissingInput(format!(
                        "no archive volume (*.1.dar) found in {}",
                        download_dir.display()
                    ))
                })?;
                // -w: overwrite without asking, a resumed extract may find earlier output
                let command = ToolCommand::new(&self.tools.dar)
                    .arg("-x")
                    .path_arg(&download_dir.join(&base))
                    .arg("-R")
                    .path_arg(&self.destination)
                    .args(["-v", "-w"]);
                Ok(PhaseWork {
                    steps: vec![PhaseStep::required("Extracting archive", command)],
                    ensure_dirs: vec![self.destination.clone()],
                    reset_dir: None,
                })
            }
            other => Err(PhaseError::MissingInput(format!(
                "{} is not part of an unpack job",
                other
            ))),
        }
    }

    fn artifacts(&self, _ctx: &JobContext, _item: &WorkItem, phase: Phase) -> Vec<String> {
        match phase {
            Phase::Download => self.downloaded_volumes(),
            Phase::Extract => vec![self.destination.display().to_string()],
            _ => Vec::new(),
        }
    }

    fn cleanup_targets(&self, _ctx: &JobContext, _item: &WorkItem) -> Vec<CleanupTarget> {
        vec![CleanupTarget::dir(self.download_dir())]
    }
}
