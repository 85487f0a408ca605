use anyhow::Result;
use serde::Serialize;

use crate::datastore::{CommitSummary, Datastore, PullSummary, ReleaseSummary};
use crate::filter::MetricFilter;

// -------------------------------------------------------------------------------------------------
// MetricKind
// -------------------------------------------------------------------------------------------------
/// The metric categories the dashboard and exports know about
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKind {
    Commits,
    Prs,
    Releases,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [MetricKind::Commits, MetricKind::Prs, MetricKind::Releases];

    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Commits => "commits",
            MetricKind::Prs => "prs",
            MetricKind::Releases => "releases",
        }
    }

    /// The column names of this metric's summary rows, in export order.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            MetricKind::Commits => &["author", "commits", "repo"],
            MetricKind::Prs => &["author", "prs", "avg_merge_time", "repo"],
            MetricKind::Releases => &["repo", "releases"],
        }
    }
}

impl std::str::FromStr for MetricKind {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, PartialEq)]
pub struct UnknownMetric(pub String);

impl std::fmt::Display for UnknownMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown metric {:?}; expected one of commits, prs, releases", self.0)
    }
}

impl std::error::Error for UnknownMetric {}

// -------------------------------------------------------------------------------------------------
// MetricRows
// -------------------------------------------------------------------------------------------------
/// The grouped rows of one metric
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricRows {
    Commits(Vec<CommitSummary>),
    Prs(Vec<PullSummary>),
    Releases(Vec<ReleaseSummary>),
}

impl MetricRows {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricRows::Commits(_) => MetricKind::Commits,
            MetricRows::Prs(_) => MetricKind::Prs,
            MetricRows::Releases(_) => MetricKind::Releases,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MetricRows::Commits(rows) => rows.len(),
            MetricRows::Prs(rows) => rows.len(),
            MetricRows::Releases(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compute the grouped rows of metric `kind` under `filter`.
pub fn summarize(datastore: &Datastore, kind: MetricKind, filter: &MetricFilter) -> Result<MetricRows> {
    let rows = match kind {
        MetricKind::Commits => MetricRows::Commits(datastore.query_commits_by_author(filter)?),
        MetricKind::Prs => MetricRows::Prs(datastore.query_pull_metrics(filter)?),
        MetricKind::Releases => MetricRows::Releases(datastore.query_release_counts(filter)?),
    };
    Ok(rows)
}
