//! The subset of GitHub REST API response types that metrics collection reads.
//!
//! Fields that are not needed are not modeled; `serde` ignores them.

use chrono::{DateTime, Utc};
use serde::Deserialize;

// -------------------------------------------------------------------------------------------------
// ClientError
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
pub struct ClientError {
    pub message: String,
    pub documentation_url: Option<String>,
}

// -------------------------------------------------------------------------------------------------
// Commit
// -------------------------------------------------------------------------------------------------
/// An entry from `GET /repos/{owner}/{repo}/commits`
#[derive(Debug, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub commit: CommitDetails,
}

#[derive(Debug, Deserialize)]
pub struct CommitDetails {
    pub author: Option<GitActor>,
    pub message: String,
}

/// The Git-level author or committer of a commit, as opposed to the GitHub account
#[derive(Debug, Deserialize)]
pub struct GitActor {
    pub name: Option<String>,
    pub email: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

// -------------------------------------------------------------------------------------------------
// PullRequest
// -------------------------------------------------------------------------------------------------
/// An entry from `GET /repos/{owner}/{repo}/pulls`
#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub state: String,
    pub user: Option<SimpleUser>,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SimpleUser {
    pub login: String,
}

// -------------------------------------------------------------------------------------------------
// Release
// -------------------------------------------------------------------------------------------------
/// An entry from `GET /repos/{owner}/{repo}/releases`
#[derive(Debug, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub draft: bool,
    pub published_at: Option<DateTime<Utc>>,
}
