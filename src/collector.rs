use chrono::{DateTime, Utc};
use tracing::{debug, debug_span, warn, Instrument};

use crate::config::RepositoryConfig;
use crate::github::{models, Client, FetchPolicy, Result};
use crate::records::{Commit, PullRequest, Release};

// -------------------------------------------------------------------------------------------------
// Collection
// -------------------------------------------------------------------------------------------------
/// Everything collected from one repository
#[derive(Debug, Default)]
pub struct Collection {
    pub commits: Vec<Commit>,
    pub pulls: Vec<PullRequest>,
    pub releases: Vec<Release>,
}

// -------------------------------------------------------------------------------------------------
// Collector
// -------------------------------------------------------------------------------------------------
/// A `Collector` gathers commits, merged pull requests, and releases of repositories through the
/// GitHub REST API and normalizes them into records.
///
/// Any request failure aborts the collection of the repository at hand; nothing is retried beyond
/// what the `FetchPolicy` allows.
pub struct Collector<'c> {
    client: &'c Client,
    policy: FetchPolicy,
}

impl<'c> Collector<'c> {
    pub fn new(client: &'c Client) -> Self {
        Self::with_policy(client, FetchPolicy::default())
    }

    pub fn with_policy(client: &'c Client, policy: FetchPolicy) -> Self {
        Self { client, policy }
    }

    /// Collect all qualifying records of `repo` with activity at or after `since`.
    pub async fn collect(&self, repo: &RepositoryConfig, since: DateTime<Utc>) -> Result<Collection> {
        let span = debug_span!("Collector::collect", "{}/{}", repo.owner, repo.repo);
        async {
            let commits = self.collect_commits(&repo.owner, &repo.repo, since).await?;
            let pulls = self.collect_pulls(&repo.owner, &repo.repo, since).await?;
            let releases = self.collect_releases(&repo.owner, &repo.repo).await?;
            Ok(Collection {
                commits,
                pulls,
                releases,
            })
        }
        .instrument(span)
        .await
    }

    /// Collect the commits of `owner/repo` authored at or after `since`.
    pub async fn collect_commits(&self, owner: &str, repo: &str, since: DateTime<Utc>) -> Result<Vec<Commit>> {
        let mut commits = Vec::new();
        let num_pages = self
            .client
            .for_each_commit_page(owner, repo, since, &self.policy, |page| {
                commits.extend(page.into_iter().filter_map(|c| normalize_commit(c, repo)));
            })
            .await?;
        debug!("Collected {} commits from {num_pages} pages", commits.len());
        Ok(commits)
    }

    /// Collect the merged pull requests of `owner/repo` created at or after `since`.
    pub async fn collect_pulls(&self, owner: &str, repo: &str, since: DateTime<Utc>) -> Result<Vec<PullRequest>> {
        let mut pulls = Vec::new();
        let num_pages = self
            .client
            .for_each_closed_pull_page(owner, repo, &self.policy, |page| {
                pulls.extend(page.into_iter().filter_map(|p| normalize_pull(p, repo, since)));
            })
            .await?;
        debug!("Collected {} merged pull requests from {num_pages} pages", pulls.len());
        Ok(pulls)
    }

    /// Collect the published releases of `owner/repo`.
    ///
    /// Only the first page of the listing is read.
    pub async fn collect_releases(&self, owner: &str, repo: &str) -> Result<Vec<Release>> {
        let page = self.client.get_releases(owner, repo, &self.policy).await?;
        let releases: Vec<Release> = page
            .into_iter()
            .filter_map(|r| normalize_release(r, repo))
            .collect();
        debug!("Collected {} releases", releases.len());
        Ok(releases)
    }
}

fn normalize_commit(c: models::Commit, repo: &str) -> Option<Commit> {
    let (email, date) = match c.commit.author.map(|a| (a.email, a.date)) {
        Some((Some(email), Some(date))) => (email, date),
        _ => {
            warn!("Skipping commit {} in {repo}: author details missing", c.sha);
            return None;
        }
    };
    match Commit::new(c.sha, email, date, c.commit.message, repo.to_string()) {
        Ok(commit) => Some(commit),
        Err(e) => {
            warn!("Skipping commit in {repo}: {e}");
            None
        }
    }
}

fn normalize_pull(p: models::PullRequest, repo: &str, since: DateTime<Utc>) -> Option<PullRequest> {
    let merged_at = p.merged_at?;
    if p.created_at < since {
        return None;
    }
    let author = p.user.map(|u| u.login).unwrap_or_default();
    match PullRequest::merged(p.number, repo.to_string(), author, p.created_at, merged_at) {
        Ok(pull) => Some(pull),
        Err(e) => {
            warn!("Skipping pull request #{} in {repo}: {e}", p.number);
            None
        }
    }
}

fn normalize_release(r: models::Release, repo: &str) -> Option<Release> {
    let date = match r.published_at {
        Some(date) if !r.draft => date,
        _ => {
            debug!("Skipping unpublished release {:?} in {repo}", r.tag_name);
            return None;
        }
    };
    match Release::new(r.tag_name, repo.to_string(), date) {
        Ok(release) => Some(release),
        Err(e) => {
            warn!("Skipping release in {repo}: {e}");
            None
        }
    }
}
