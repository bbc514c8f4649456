//! Job definition types shared by the planner, the checkpoint store and the orchestrator.
//!
//! A `JobConfiguration` is built once when a command starts and is never mutated
//! afterwards. Every component receives it by reference.

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

/// One stage of the per-item pipeline.
///
/// Variant order is execution order; the derived `Ord` relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Download,
    Archive,
    Upload,
    Extract,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Download => "download",
            Phase::Archive => "archive",
            Phase::Upload => "upload",
            Phase::Extract => "extract",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which pipeline a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Mirror every repository of a GitHub organization, archive, upload.
    Github,
    /// Copy one S3 folder to another bucket through local staging.
    S3,
    /// Archive a local folder into volumes and upload them.
    Pack,
    /// Download archive volumes and extract them locally.
    Unpack,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Github => "github",
            JobKind::S3 => "s3",
            JobKind::Pack => "pack",
            JobKind::Unpack => "unpack",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work discovered by a listing provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Stable identifier (repository name, folder name)
    pub id: String,
    /// Where the item is fetched from (clone URL, S3 prefix, local path)
    pub locator: String,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            locator: locator.into(),
        }
    }
}

/// S3 storage tier passed to the upload tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageClass {
    Standard,
    ReducedRedundancy,
    StandardIa,
    OnezoneIa,
    IntelligentTiering,
    Glacier,
    #[default]
    DeepArchive,
    GlacierIr,
    ExpressOnezone,
}

impl StorageClass {
    pub const ALL: [StorageClass; 9] = [
        StorageClass::Standard,
        StorageClass::ReducedRedundancy,
        StorageClass::StandardIa,
        StorageClass::OnezoneIa,
        StorageClass::IntelligentTiering,
        StorageClass::Glacier,
        StorageClass::DeepArchive,
        StorageClass::GlacierIr,
        StorageClass::ExpressOnezone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageClass::Standard => "STANDARD",
            StorageClass::ReducedRedundancy => "REDUCED_REDUNDANCY",
            StorageClass::StandardIa => "STANDARD_IA",
            StorageClass::OnezoneIa => "ONEZONE_IA",
            StorageClass::IntelligentTiering => "INTELLIGENT_TIERING",
            StorageClass::Glacier => "GLACIER",
            StorageClass::DeepArchive => "DEEP_ARCHIVE",
            StorageClass::GlacierIr => "GLACIER_IR",
            StorageClass::ExpressOnezone => "EXPRESS_ONEZONE",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        StorageClass::ALL
            .into_iter()
            .find(|class| class.as_str() == wanted)
            .ok_or_else(|| {
                let valid: Vec<&str> = StorageClass::ALL.iter().map(|c| c.as_str()).collect();
                anyhow::anyhow!(
                    "Invalid storage class '{}'. Valid values: {}",
                    s,
                    valid.join(", ")
                )
            })
    }
}

fn volume_size_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[1-9][0-9]*[KMGT]?$").expect("static regex is valid"))
}

/// Size limit for one archive volume, in the archive tool's notation (`1G`, `500M`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VolumeSize(String);

impl VolumeSize {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VolumeSize {
    fn default() -> Self {
        VolumeSize("1G".to_string())
    }
}

impl FromStr for VolumeSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        if volume_size_pattern().is_match(&normalized) {
            Ok(VolumeSize(normalized))
        } else {
            anyhow::bail!(
                "Invalid volume size '{}'. Use a number with an optional K/M/G/T suffix, e.g. 1G or 500M",
                s
            )
        }
    }
}

impl TryFrom<String> for VolumeSize {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VolumeSize> for String {
    fn from(value: VolumeSize) -> Self {
        value.0
    }
}

impl fmt::Display for VolumeSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parsed `s3://bucket/key` locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Locator {
    pub bucket: String,
    pub key: String,
}

impl S3Locator {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into().trim_matches('/').to_string(),
        }
    }

    /// Render as a prefix URI with a trailing slash, the form the sync tool expects.
    pub fn prefix_uri(&self) -> String {
        if self.key.is_empty() {
            format!("s3://{}/", self.bucket)
        } else {
            format!("s3://{}/{}/", self.bucket, self.key)
        }
    }

    /// Append path segments to the key.
    pub fn join(&self, segment: &str) -> S3Locator {
        let segment = segment.trim_matches('/');
        let key = match (self.key.is_empty(), segment.is_empty()) {
            (true, _) => segment.to_string(),
            (false, true) => self.key.clone(),
            (false, false) => format!("{}/{}", self.key, segment),
        };
        S3Locator {
            bucket: self.bucket.clone(),
            key,
        }
    }
}

impl FromStr for S3Locator {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("s3://")
            .ok_or_else(|| anyhow::anyhow!("S3 path must start with 's3://': {}", s))?;
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| anyhow::anyhow!("S3 path must include both bucket name and path: {}", s))?;
        let key = key.trim_matches('/');
        if bucket.is_empty() || key.is_empty() {
            anyhow::bail!("S3 path must include both bucket name and path: {}", s);
        }
        Ok(S3Locator::new(bucket, key))
    }
}

impl fmt::Display for S3Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Options that shape how a job runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    #[serde(default)]
    pub include_forks: bool,
    #[serde(default)]
    pub include_wikis: bool,
    #[serde(default)]
    pub include_lfs: bool,
    #[serde(default)]
    pub create_archives: bool,
    #[serde(default)]
    pub upload: bool,
    /// Delete local files that no longer exist at the source while syncing
    #[serde(default)]
    pub mirror_delete: bool,
    #[serde(default)]
    pub cleanup: bool,
}

/// Immutable snapshot of every parameter that defines a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfiguration {
    pub kind: JobKind,
    /// Source locator (`github:<org>`, `s3://bucket/prefix/`, local path)
    pub source: String,
    /// Destination locator (`s3://bucket/prefix/`, local path, empty when not uploading)
    pub destination: String,
    /// Name of the single target or collection, used for checkpoint naming
    pub target_name: String,
    pub staging_root: PathBuf,
    #[serde(default)]
    pub source_profile: String,
    #[serde(default)]
    pub dest_profile: String,
    #[serde(default)]
    pub storage_class: Option<StorageClass>,
    #[serde(default)]
    pub volume_size: Option<VolumeSize>,
    #[serde(default)]
    pub options: JobOptions,
}

impl JobConfiguration {
    /// The `(field, value)` pairs that must agree before a checkpoint may be resumed.
    ///
    /// Locators, credential scopes and destructive or item-shaping flags are included.
    /// Cosmetic settings (cleanup, volume size, storage tier) are not.
    pub fn resume_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("kind", self.kind.to_string()),
            ("source", self.source.clone()),
            ("destination", self.destination.clone()),
            ("staging_root", self.staging_root.display().to_string()),
            ("source_profile", self.source_profile.clone()),
            ("dest_profile", self.dest_profile.clone()),
            ("mirror_delete", self.options.mirror_delete.to_string()),
            ("include_forks", self.options.include_forks.to_string()),
            ("create_archives", self.options.create_archives.to_string()),
            ("upload", self.options.upload.to_string()),
        ]
    }

    /// Compare against a candidate configuration over the resume fields.
    pub fn diff(&self, candidate: &JobConfiguration) -> ConfigurationDiff {
        let mismatched = self
            .resume_fields()
            .into_iter()
            .zip(candidate.resume_fields())
            .filter(|((_, stored), (_, current))| stored != current)
            .map(|((field, _), _)| field.to_string())
            .collect();
        ConfigurationDiff { mismatched }
    }
}

/// Result of comparing a stored configuration with the current run's.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationDiff {
    pub mismatched: Vec<String>,
}

impl ConfigurationDiff {
    pub fn is_match(&self) -> bool {
        self.mismatched.is_empty()
    }
}
