//! Work item discovery.
//!
//! A listing runs at most once per job; the orchestrator persists the result
//! in the checkpoint and never queries the source again for that job.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::ListingError;
use crate::job::WorkItem;

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
const PER_PAGE: u32 = 100;
const USER_AGENT: &str = concat!("coldstore/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait ListingProvider: Send + Sync {
    /// Short label for prompts and logs.
    fn describe(&self) -> String;

    async fn list_items(&self) -> Result<Vec<WorkItem>, ListingError>;
}

/// A GitHub repository (subset of fields we care about).
#[derive(Debug, Clone, Deserialize)]
pub struct GithubRepo {
    pub name: String,
    pub clone_url: String,
    #[serde(default)]
    pub fork: bool,
}

/// Lists every repository of a GitHub organization.
pub struct GithubOrgLister {
    api_base: String,
    org: String,
    token: String,
    include_forks: bool,
    client: reqwest::Client,
}

impl GithubOrgLister {
    pub fn new(
        api_base: impl Into<String>,
        org: impl Into<String>,
        token: impl Into<String>,
        include_forks: bool,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            org: org.into(),
            token: token.into(),
            include_forks,
            client: reqwest::Client::new(),
        }
    }

    fn repos_url(&self) -> String {
        format!(
            "{}/orgs/{}/repos",
            self.api_base.trim_end_matches('/'),
            self.org
        )
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<GithubRepo>, ListingError> {
        let resp = self
            .client
            .get(self.repos_url())
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", USER_AGENT)
            .query(&[
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ])
            .send()
            .await
            .map_err(ListingError::Request)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ListingError::Http {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let text = resp.text().await.map_err(ListingError::Request)?;
        parse_repos(&text)
    }
}

#[async_trait]
impl ListingProvider for GithubOrgLister {
    fn describe(&self) -> String {
        format!("List repositories of GitHub organization '{}'", self.org)
    }

    async fn list_items(&self) -> Result<Vec<WorkItem>, ListingError> {
        let mut repos = Vec::new();
        let mut page = 1u32;

        loop {
            let batch = self.fetch_page(page).await?;
            debug!(org = %self.org, page, count = batch.len(), "Fetched repository page");
            if batch.is_empty() {
                break;
            }
            repos.extend(batch);
            page += 1;
        }

        let items = filter_repos(repos, self.include_forks);
        info!(org = %self.org, count = items.len(), "Repositories discovered");
        Ok(items)
    }
}

fn parse_repos(body: &str) -> Result<Vec<GithubRepo>, ListingError> {
    serde_json::from_str(body).map_err(|e| ListingError::Decode(e.to_string()))
}

/// Drop forks unless requested and convert to work items, keeping API order.
pub fn filter_repos(repos: Vec<GithubRepo>, include_forks: bool) -> Vec<WorkItem> {
    repos
        .into_iter()
        .filter(|r| include_forks || !r.fork)
        .map(|r| WorkItem::new(r.name, r.clone_url))
        .collect()
}

/// The one implicit item of a single-target job.
pub struct SingleItem(pub WorkItem);

#[async_trait]
impl ListingProvider for SingleItem {
    fn describe(&self) -> String {
        format!("Single target '{}'", self.0.id)
    }

    async fn list_items(&self) -> Result<Vec<WorkItem>, ListingError> {
        Ok(vec![self.0.clone()])
    }
}
