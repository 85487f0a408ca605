//! The records persisted by the datastore.
//!
//! Records can only be built through their constructors, which enforce the invariants the
//! datastore relies on: non-empty keys and repository names, and non-negative merge times.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// -------------------------------------------------------------------------------------------------
// RecordError
// -------------------------------------------------------------------------------------------------
#[derive(Debug, PartialEq)]
pub enum RecordError {
    EmptyField(&'static str),
    MergedBeforeCreated {
        created_at: DateTime<Utc>,
        merged_at: DateTime<Utc>,
    },
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::EmptyField(name) => write!(f, "field {name:?} must not be empty"),
            RecordError::MergedBeforeCreated { created_at, merged_at } => write!(
                f,
                "merge time {} precedes creation time {}",
                format_timestamp(merged_at),
                format_timestamp(created_at)
            ),
        }
    }
}

impl std::error::Error for RecordError {}

fn non_empty(name: &'static str, value: String) -> Result<String, RecordError> {
    if value.trim().is_empty() {
        Err(RecordError::EmptyField(name))
    } else {
        Ok(value)
    }
}

/// Format a timestamp the way it is stored: RFC 3339, UTC, whole seconds, `Z` suffix.
///
/// All stored timestamps share this fixed-width format, so comparing them as strings orders them
/// chronologically.
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored timestamp.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

// -------------------------------------------------------------------------------------------------
// Commit
// -------------------------------------------------------------------------------------------------
/// A commit, keyed by its hash
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,

    /// The author email
    pub author: String,

    /// When the commit was authored
    pub date: DateTime<Utc>,

    pub message: String,

    /// The name of the repository the commit belongs to
    pub repo: String,
}

impl Commit {
    pub fn new(
        sha: String,
        author: String,
        date: DateTime<Utc>,
        message: String,
        repo: String,
    ) -> Result<Self, RecordError> {
        Ok(Commit {
            sha: non_empty("sha", sha)?,
            author,
            date,
            message,
            repo: non_empty("repo", repo)?,
        })
    }
}

// -------------------------------------------------------------------------------------------------
// PullRequest
// -------------------------------------------------------------------------------------------------
/// A merged pull request, keyed by `(number, repo)`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub repo: String,

    /// The login of the account that opened the pull request
    pub author: String,

    pub created_at: DateTime<Utc>,
    pub merged_at: DateTime<Utc>,

    /// `merged_at - created_at`, in hours
    pub merge_time_hours: f64,
}

impl PullRequest {
    /// Build a record for a merged pull request, computing its merge time.
    pub fn merged(
        number: u64,
        repo: String,
        author: String,
        created_at: DateTime<Utc>,
        merged_at: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        if merged_at < created_at {
            return Err(RecordError::MergedBeforeCreated { created_at, merged_at });
        }
        Ok(PullRequest {
            number,
            repo: non_empty("repo", repo)?,
            author,
            created_at,
            merged_at,
            merge_time_hours: merge_time_hours(created_at, merged_at),
        })
    }
}

/// The time between `created_at` and `merged_at`, in fractional hours.
pub fn merge_time_hours(created_at: DateTime<Utc>, merged_at: DateTime<Utc>) -> f64 {
    let elapsed = merged_at - created_at;
    let seconds = elapsed.num_milliseconds() as f64 / 1000.0;
    seconds / 3600.0
}

// -------------------------------------------------------------------------------------------------
// Release
// -------------------------------------------------------------------------------------------------
/// A published release, keyed by `(tag, repo)`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub tag: String,
    pub repo: String,

    /// When the release was published
    pub date: DateTime<Utc>,
}

impl Release {
    pub fn new(tag: String, repo: String, date: DateTime<Utc>) -> Result<Self, RecordError> {
        Ok(Release {
            tag: non_empty("tag", tag)?,
            repo: non_empty("repo", repo)?,
            date,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn ts(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn merge_time_is_fractional_hours() {
        let pr = PullRequest::merged(
            7,
            "hello".into(),
            "bob".into(),
            ts("2024-03-01T10:00:00Z"),
            ts("2024-03-01T11:30:00Z"),
        )
        .unwrap();
        assert_eq!(pr.merge_time_hours, 1.5);
    }

    #[test]
    fn merge_before_create_is_rejected() {
        let result = PullRequest::merged(
            7,
            "hello".into(),
            "bob".into(),
            ts("2024-03-01T10:00:00Z"),
            ts("2024-03-01T09:00:00Z"),
        );
        assert!(matches!(result, Err(RecordError::MergedBeforeCreated { .. })));
    }

    #[test]
    fn empty_repo_is_rejected() {
        let result = Release::new("v1.0".into(), "  ".into(), ts("2024-03-01T10:00:00Z"));
        assert_eq!(result, Err(RecordError::EmptyField("repo")));

        let result = Commit::new(
            String::new(),
            "x@y.com".into(),
            ts("2024-03-01T10:00:00Z"),
            "msg".into(),
            "hello".into(),
        );
        assert_eq!(result, Err(RecordError::EmptyField("sha")));
    }

    #[test]
    fn timestamps_are_stored_fixed_width() {
        let t = Utc.with_ymd_and_hms(2024, 1, 5, 9, 3, 0).unwrap();
        assert_eq!(format_timestamp(&t), "2024-01-05T09:03:00Z");
        assert_eq!(parse_timestamp("2024-01-05T10:03:00+01:00").unwrap(), t);
    }

    proptest! {
        #[test]
        fn merge_time_is_never_negative(start in 0i64..2_000_000_000, elapsed in 0i64..100_000_000) {
            let created_at = Utc.timestamp_opt(start, 0).unwrap();
            let merged_at = created_at + Duration::seconds(elapsed);
            let pr = PullRequest::merged(1, "r".into(), "a".into(), created_at, merged_at).unwrap();
            prop_assert!(pr.merge_time_hours >= 0.0);
            prop_assert!((pr.merge_time_hours * 3600.0 - elapsed as f64).abs() < 1e-3);
        }
    }
}
