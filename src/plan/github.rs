//! GitHub organization backup: mirror every repository, archive it, upload the volumes.
//!
//! Layout under the staging root, per job:
//!
//! ```text
//! <staging>/<org>/<job_id>/repositories/<repo>        bare mirror
//! <staging>/<org>/<job_id>/repositories/<repo>.wiki   wiki mirror (optional)
//! <staging>/<org>/<job_id>/archives/<repo>/<repo>.N.dar
//! ```
//!
//! Volumes are uploaded to `<dest>/<job_id>/<repo>/`.

use std::path::PathBuf;

use super::{CleanupTarget, JobContext, JobPlan, PhaseStep, PhaseWork, Toolchain, find_volumes};
use crate::errors::PhaseError;
use crate::executor::ToolCommand;
use crate::job::{JobConfiguration, Phase, S3Locator, WorkItem};
use crate::preflight::Requirements;

pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

pub struct GithubPlan {
    configuration: JobConfiguration,
    org: String,
    token: String,
    tools: Toolchain,
    destination: Option<S3Locator>,
}

impl GithubPlan {
    /// `destination` is required when the configuration asks for uploads.
    pub fn new(
        configuration: JobConfiguration,
        org: impl Into<String>,
        token: impl Into<String>,
        tools: Toolchain,
        destination: Option<S3Locator>,
    ) -> Self {
        Self {
            configuration,
            org: org.into(),
            token: token.into(),
            tools,
            destination,
        }
    }

    fn uploads(&self) -> bool {
        let options = &self.configuration.options;
        options.create_archives && options.upload && self.destination.is_some()
    }

    pub fn job_dir(&self, ctx: &JobContext) -> PathBuf {
        self.configuration
            .staging_root
            .join(&self.org)
            .join(&ctx.job_id)
    }

    pub fn repositories_dir(&self, ctx: &JobContext) -> PathBuf {
        self.job_dir(ctx).join("repositories")
    }

    pub fn archives_dir(&self, ctx: &JobContext) -> PathBuf {
        self.job_dir(ctx).join("archives")
    }

    fn repo_dir(&self, ctx: &JobContext, item: &WorkItem) -> PathBuf {
        self.repositories_dir(ctx).join(&item.id)
    }

    fn wiki_dir(&self, ctx: &JobContext, item: &WorkItem) -> PathBuf {
        self.repositories_dir(ctx).join(format!("{}.wiki", item.id))
    }

    fn repo_archive_dir(&self, ctx: &JobContext, item: &WorkItem) -> PathBuf {
        self.archives_dir(ctx).join(&item.id)
    }

    fn upload_destination(&self, ctx: &JobContext, item: &WorkItem) -> Option<String> {
        self.destination
            .as_ref()
            .map(|d| d.join(&ctx.job_id).join(&item.id).prefix_uri())
    }

    /// Embed the token so git can authenticate without a credential helper.
    fn authenticated_url(&self, url: &str) -> String {
        if self.token.is_empty() {
            return url.to_string();
        }
        match url.strip_prefix("https://") {
            Some(rest) => format!("https://x-access-token:{}@{}", self.token, rest),
            None => url.to_string(),
        }
    }

    fn mirror_steps(&self, url: &str, dir: PathBuf, label: &str, best_effort: bool) -> (PhaseStep, Option<PathBuf>) {
        let git = ToolCommand::new(&self.tools.git).secret(&self.token);
        let (description, command, reset) = if dir.join("HEAD").exists() {
            (
                format!("Updating existing {} mirror", label),
                git.arg("-C").path_arg(&dir).args(["fetch", "--all", "--tags", "--prune"]),
                None,
            )
        } else {
            // A directory without HEAD is a clone that never finished
            let reset = dir.exists().then(|| dir.clone());
            (
                format!("Cloning {} mirror", label),
                git.args(["clone", "--mirror"])
                    .arg(self.authenticated_url(url))
                    .path_arg(&dir),
                reset,
            )
        };
        let step = if best_effort {
            PhaseStep::best_effort(description, command)
        } else {
            PhaseStep::required(description, command)
        };
        (step, reset)
    }

    fn download_work(&self, ctx: &JobContext, item: &WorkItem) -> PhaseWork {
        let repo_dir = self.repo_dir(ctx, item);
        let (clone, reset_dir) =
            self.mirror_steps(&item.locator, repo_dir.clone(), "repository", false);
        let mut steps = vec![clone];

        if self.configuration.options.include_lfs {
            steps.push(PhaseStep::best_effort(
                "Fetching LFS objects",
                ToolCommand::new(&self.tools.git)
                    .arg("-C")
                    .path_arg(&repo_dir)
                    .args(["lfs", "fetch", "--all"]),
            ));
        }

        if self.configuration.options.include_wikis {
            let wiki_url = match item.locator.strip_suffix(".git") {
                Some(base) => format!("{}.wiki.git", base),
                None => format!("{}.wiki.git", item.locator),
            };
            let (wiki, _) = self.mirror_steps(&wiki_url, self.wiki_dir(ctx, item), "wiki", true);
            steps.push(wiki);
        }

        PhaseWork {
            steps,
            ensure_dirs: vec![self.repositories_dir(ctx)],
            reset_dir,
        }
    }

    fn archive_work(&self, ctx: &JobContext, item: &WorkItem) -> PhaseWork {
        let archive_dir = self.repo_archive_dir(ctx, item);
        let volume_size = self.configuration.volume_size.clone().unwrap_or_default();
        let command = ToolCommand::new(&self.tools.dar)
            .args(["-w", "-s", volume_size.as_str(), "-c"])
            .path_arg(&archive_dir.join(&item.id))
            .arg("-R")
            .path_arg(&self.repo_dir(ctx, item));
        PhaseWork {
            steps: vec![PhaseStep::required("Creating archive volumes", command)],
            ensure_dirs: vec![archive_dir.clone()],
            // Leftover volumes from an interrupted run would be uploaded otherwise
            reset_dir: Some(archive_dir),
        }
    }

    fn upload_work(&self, ctx: &JobContext, item: &WorkItem) -> Result<PhaseWork, PhaseError> {
        let dest = self
            .upload_destination(ctx, item)
            .ok_or_else(|| PhaseError::MissingInput("no upload destination configured".into()))?;
        let storage_class = self.configuration.storage_class.unwrap_or_default();
        let archive_dir = self.repo_archive_dir(ctx, item).display().to_string();
        let command = self
            .tools
            .s3_sync(&archive_dir, &dest, &self.configuration.dest_profile)
            .args(["--storage-class", storage_class.as_str()]);
        Ok(PhaseWork {
            steps: vec![PhaseStep::required("Uploading archive volumes", command)],
            ..Default::default()
        })
    }
}

impl JobPlan for GithubPlan {
    fn configuration(&self) -> &JobConfiguration {
        &self.configuration
    }

    fn phases(&self) -> Vec<Phase> {
        let mut phases = vec![Phase::Download];
        if self.configuration.options.create_archives {
            phases.push(Phase::Archive);
        }
        if self.uploads() {
            phases.push(Phase::Upload);
        }
        phases
    }

    fn requirements(&self) -> Requirements {
        let mut req = Requirements {
            tools: vec![self.tools.git_requirement()],
            env_vars: vec![TOKEN_ENV.to_string()],
            ..Default::default()
        };
        if self.configuration.options.create_archives {
            req.tools.push(self.tools.dar_requirement());
        }
        if self.uploads() {
            req.tools.push(self.tools.aws_requirement());
            req.profiles.push(self.configuration.dest_profile.clone());
        }
        req
    }

    fn phase_work(
        &self,
        ctx: &JobContext,
        item: &WorkItem,
        phase: Phase,
    ) -> Result<PhaseWork, PhaseError> {
        match phase {
            Phase::Download => Ok(self.download_work(ctx, item)),
            Phase::Archive => Ok(self.archive_work(ctx, item)),
            Phase::Upload => self.upload_work(ctx, item),
            Phase::Extract => Err(PhaseError::MissingInput(
                "extract is not part of a GitHub backup".into(),
            )),
        }
    }

    fn artifacts(&self, ctx: &JobContext, item: &WorkItem, phase: Phase) -> Vec<String> {
        match phase {
            Phase::Download => vec![self.repo_dir(ctx, item).display().to_string()],
            Phase::Archive => find_volumes(&self.repo_archive_dir(ctx, item), &item.id),
            Phase::Upload => self.upload_destination(ctx, item).into_iter().collect(),
            Phase::Extract => Vec::new(),
        }
    }

    fn cleanup_targets(&self, ctx: &JobContext, item: &WorkItem) -> Vec<CleanupTarget> {
        let root = &self.configuration.staging_root;
        let mut targets = vec![
            CleanupTarget::pruning(self.repo_dir(ctx, item), root),
            CleanupTarget::pruning(self.wiki_dir(ctx, item), root),
        ];
        if self.configuration.options.create_archives {
            targets.push(CleanupTarget::pruning(self.repo_archive_dir(ctx, item), root));
        }
        targets
    }
}
