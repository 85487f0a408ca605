use anyhow::{Context, Result};
use indoc::{formatdoc, indoc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, debug_span};

use crate::filter::{ceil_to_second, floor_to_second, MetricFilter};
use crate::records::{format_timestamp, parse_timestamp, Commit, PullRequest, Release};

// -------------------------------------------------------------------------------------------------
// Datastore
// -------------------------------------------------------------------------------------------------
/// A metrics database backed by a single SQLite file.
///
/// A `Datastore` owns its connection; the connection is closed when the `Datastore` is dropped.
/// Callers are expected to open one for the duration of a single operation or request.
pub struct Datastore {
    /// The path of the database file
    path: PathBuf,

    /// A connection to the database backing this `Datastore`.
    conn: Connection,
}

impl Datastore {
    /// Open the datastore at `path`, creating and initializing it if needed.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Self::new_connection(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        let mut ds = Self {
            path: path.to_owned(),
            conn,
        };
        ds.initialize()
            .with_context(|| format!("Failed to initialize database at {}", path.display()))?;
        Ok(ds)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn new_connection(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "wal")?; // https://www.sqlite.org/wal.html
        conn.pragma_update(None, "synchronous", "normal")?; // https://sqlite.org/pragma.html#pragma_synchronous
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Ok(conn)
    }

    /// Ensure the metrics tables exist.
    ///
    /// This is idempotent and safe to call on every startup. Returns the schema version found
    /// before initializing.
    pub fn initialize(&mut self) -> Result<u64> {
        let _span = debug_span!("Datastore::initialize", "{}", self.path.display()).entered();
        let tx = self.conn.transaction()?;

        let get_user_version = || -> Result<u64> {
            let user_version = tx.pragma_query_value(None, "user_version", |r| r.get(0))?;
            Ok(user_version)
        };

        let set_user_version = |user_version: u64| -> Result<()> {
            tx.pragma_update(None, "user_version", user_version)?;
            Ok(())
        };

        let user_version: u64 = get_user_version()?;
        if user_version == 0 {
            let new_user_version = user_version + 1;
            debug!(
                "Migrating database schema from version {} to {}",
                user_version, new_user_version
            );
            tx.execute_batch(indoc! {r#"
                -- Timestamps are RFC 3339 UTC strings with whole seconds and a `Z` suffix,
                -- so that string comparison is chronological comparison.

                create table if not exists commits
                (
                    sha text primary key,
                    author text not null,
                    date text not null,
                    message text not null,
                    repo text not null check (repo != '')
                );

                create table if not exists pulls
                (
                    number integer not null,
                    repo text not null check (repo != ''),
                    author text not null,
                    created_at text not null,
                    merged_at text not null,
                    merge_time_hours real not null check (merge_time_hours >= 0),
                    primary key (number, repo)
                );

                create table if not exists releases
                (
                    tag text not null,
                    repo text not null check (repo != ''),
                    date text not null,
                    primary key (tag, repo)
                );
            "#})?;
            set_user_version(new_user_version)?;
        }
        tx.commit()?;
        Ok(user_version)
    }

    pub fn upsert_commits<'a, T: IntoIterator<Item = &'a Commit>>(&mut self, commits: T) -> Result<usize> {
        let _span = debug_span!("Datastore::upsert_commits", "{}", self.path.display()).entered();

        let tx = self.conn.transaction()?;
        let mut stmt = tx.prepare_cached(indoc! {r#"
            insert or replace into commits(sha, author, date, message, repo)
            values (?, ?, ?, ?, ?)
        "#})?;
        let mut num_changed = 0;
        for c in commits {
            num_changed += stmt.execute((
                &c.sha,
                &c.author,
                format_timestamp(&c.date),
                &c.message,
                &c.repo,
            ))?;
        }
        drop(stmt);
        tx.commit()?;
        Ok(num_changed)
    }

    pub fn upsert_pulls<'a, T: IntoIterator<Item = &'a PullRequest>>(&mut self, pulls: T) -> Result<usize> {
        let _span = debug_span!("Datastore::upsert_pulls", "{}", self.path.display()).entered();

        let tx = self.conn.transaction()?;
        let mut stmt = tx.prepare_cached(indoc! {r#"
            insert or replace into pulls(number, repo, author, created_at, merged_at, merge_time_hours)
            values (?, ?, ?, ?, ?, ?)
        "#})?;
        let mut num_changed = 0;
        for p in pulls {
            let number: i64 = p.number.try_into().context("Pull request number out of range")?;
            num_changed += stmt.execute((
                number,
                &p.repo,
                &p.author,
                format_timestamp(&p.created_at),
                format_timestamp(&p.merged_at),
                p.merge_time_hours,
            ))?;
        }
        drop(stmt);
        tx.commit()?;
        Ok(num_changed)
    }

    pub fn upsert_releases<'a, T: IntoIterator<Item = &'a Release>>(&mut self, releases: T) -> Result<usize> {
        let _span = debug_span!("Datastore::upsert_releases", "{}", self.path.display()).entered();

        let tx = self.conn.transaction()?;
        let mut stmt = tx.prepare_cached(indoc! {r#"
            insert or replace into releases(tag, repo, date)
            values (?, ?, ?)
        "#})?;
        let mut num_changed = 0;
        for r in releases {
            num_changed += stmt.execute((&r.tag, &r.repo, format_timestamp(&r.date)))?;
        }
        drop(stmt);
        tx.commit()?;
        Ok(num_changed)
    }

    /// Get all recorded commits, ordered by hash.
    pub fn get_commits(&self) -> Result<Vec<Commit>> {
        let mut stmt = self.conn.prepare_cached(indoc! {r#"
            select sha, author, date, message, repo
            from commits
            order by sha
        "#})?;
        let entries = stmt.query_map((), |row| {
            Ok(Commit {
                sha: row.get(0)?,
                author: row.get(1)?,
                date: get_timestamp(row, 2)?,
                message: row.get(3)?,
                repo: row.get(4)?,
            })
        })?;
        let mut es = Vec::new();
        for e in entries {
            es.push(e?);
        }
        Ok(es)
    }

    /// Get all recorded pull requests, ordered by repository and number.
    pub fn get_pulls(&self) -> Result<Vec<PullRequest>> {
        let mut stmt = self.conn.prepare_cached(indoc! {r#"
            select number, repo, author, created_at, merged_at, merge_time_hours
            from pulls
            order by repo, number
        "#})?;
        let entries = stmt.query_map((), |row| {
            let number: i64 = row.get(0)?;
            Ok(PullRequest {
                number: number as u64,
                repo: row.get(1)?,
                author: row.get(2)?,
                created_at: get_timestamp(row, 3)?,
                merged_at: get_timestamp(row, 4)?,
                merge_time_hours: row.get(5)?,
            })
        })?;
        let mut es = Vec::new();
        for e in entries {
            es.push(e?);
        }
        Ok(es)
    }

    /// Get all recorded releases, ordered by repository and tag.
    pub fn get_releases(&self) -> Result<Vec<Release>> {
        let mut stmt = self.conn.prepare_cached(indoc! {r#"
            select tag, repo, date
            from releases
            order by repo, tag
        "#})?;
        let entries = stmt.query_map((), |row| {
            Ok(Release {
                tag: row.get(0)?,
                repo: row.get(1)?,
                date: get_timestamp(row, 2)?,
            })
        })?;
        let mut es = Vec::new();
        for e in entries {
            es.push(e?);
        }
        Ok(es)
    }

    /// Count commits per `(author, repo)`, most active first.
    pub fn query_commits_by_author(&self, filter: &MetricFilter) -> Result<Vec<CommitSummary>> {
        let _span = debug_span!("Datastore::query_commits_by_author", "{}", self.path.display()).entered();

        let (where_clause, params) = filter_clause(filter, "date");
        let sql = formatdoc! {r#"
            select author, count(*) as commits, repo
            from commits
            {where_clause}
            group by author, repo
            order by commits desc, author, repo
        "#};
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt.query_map(params_ref(&params).as_slice(), |row| {
            Ok(CommitSummary {
                author: row.get(0)?,
                commits: row.get(1)?,
                repo: row.get(2)?,
            })
        })?;
        let mut es = Vec::new();
        for e in entries {
            es.push(e?);
        }
        Ok(es)
    }

    /// Count merged pull requests and average their merge time per `(author, repo)`.
    ///
    /// Date restrictions apply to pull request creation time.
    pub fn query_pull_metrics(&self, filter: &MetricFilter) -> Result<Vec<PullSummary>> {
        let _span = debug_span!("Datastore::query_pull_metrics", "{}", self.path.display()).entered();

        let (where_clause, params) = filter_clause(filter, "created_at");
        let sql = formatdoc! {r#"
            select author, count(*) as prs, avg(merge_time_hours) as avg_merge_time, repo
            from pulls
            {where_clause}
            group by author, repo
            order by prs desc, author, repo
        "#};
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt.query_map(params_ref(&params).as_slice(), |row| {
            Ok(PullSummary {
                author: row.get(0)?,
                prs: row.get(1)?,
                avg_merge_time: row.get(2)?,
                repo: row.get(3)?,
            })
        })?;
        let mut es = Vec::new();
        for e in entries {
            es.push(e?);
        }
        Ok(es)
    }

    /// Count releases per repository.
    pub fn query_release_counts(&self, filter: &MetricFilter) -> Result<Vec<ReleaseSummary>> {
        let _span = debug_span!("Datastore::query_release_counts", "{}", self.path.display()).entered();

        let (where_clause, params) = filter_clause(filter, "date");
        let sql = formatdoc! {r#"
            select repo, count(*) as releases
            from releases
            {where_clause}
            group by repo
            order by releases desc, repo
        "#};
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt.query_map(params_ref(&params).as_slice(), |row| {
            Ok(ReleaseSummary {
                repo: row.get(0)?,
                releases: row.get(1)?,
            })
        })?;
        let mut es = Vec::new();
        for e in entries {
            es.push(e?);
        }
        Ok(es)
    }
}

/// Build a `where` clause and its parameters for `filter`, applying the date bounds to
/// `date_column`.
///
/// Only the column name is interpolated into SQL; it never comes from user input.
fn filter_clause(filter: &MetricFilter, date_column: &str) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();
    if let Some(start) = &filter.start {
        conditions.push(format!("{date_column} >= ?"));
        params.push(format_timestamp(&ceil_to_second(*start)));
    }
    if let Some(end) = &filter.end {
        conditions.push(format!("{date_column} <= ?"));
        params.push(format_timestamp(&floor_to_second(*end)));
    }
    if let Some(repo) = &filter.repo {
        conditions.push("repo = ?".to_string());
        params.push(repo.clone());
    }
    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!("where {}", conditions.join(" and ")), params)
    }
}

fn params_ref(params: &[String]) -> Vec<&dyn ToSql> {
    params.iter().map(|p| p as &dyn ToSql).collect()
}

fn get_timestamp(row: &Row, idx: usize) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    let s: String = row.get(idx)?;
    parse_timestamp(&s).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// -------------------------------------------------------------------------------------------------
// Summary rows
// -------------------------------------------------------------------------------------------------
// Field order here is the column order of exports.

/// Commit count for one `(author, repo)` group
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CommitSummary {
    pub author: String,
    pub commits: usize,
    pub repo: String,
}

/// Merged pull request count and average merge time for one `(author, repo)` group
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PullSummary {
    pub author: String,
    pub prs: usize,

    /// Mean merge time, in hours
    pub avg_merge_time: f64,

    pub repo: String,
}

/// Release count for one repository
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ReleaseSummary {
    pub repo: String,
    pub releases: usize,
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;

    fn ts(s: &str) -> chrono::DateTime<chrono::Utc> {
        parse_timestamp(s).unwrap()
    }

    fn commit(sha: &str, author: &str, date: &str, repo: &str) -> Commit {
        Commit::new(sha.into(), author.into(), ts(date), format!("commit {sha}"), repo.into()).unwrap()
    }

    fn pull(number: u64, author: &str, created: &str, merged: &str, repo: &str) -> PullRequest {
        PullRequest::merged(number, repo.into(), author.into(), ts(created), ts(merged)).unwrap()
    }

    fn release(tag: &str, date: &str, repo: &str) -> Release {
        Release::new(tag.into(), repo.into(), ts(date)).unwrap()
    }

    fn open_temp() -> (TempDir, Datastore) {
        let tmp = TempDir::new().unwrap();
        let ds = Datastore::open(&tmp.path().join("metrics.db")).unwrap();
        (tmp, ds)
    }

    #[test]
    fn initialize_is_idempotent() {
        let (tmp, mut ds) = open_temp();
        assert_eq!(ds.initialize().unwrap(), 1);
        drop(ds);
        let mut ds = Datastore::open(&tmp.path().join("metrics.db")).unwrap();
        assert_eq!(ds.initialize().unwrap(), 1);
    }

    #[test]
    fn upsert_replaces_by_key() {
        let (_tmp, mut ds) = open_temp();
        ds.upsert_commits(&[commit("a1", "x@y.com", "2024-01-05T00:00:00Z", "R")]).unwrap();
        let mut updated = commit("a1", "z@y.com", "2024-01-06T00:00:00Z", "R");
        updated.message = "reworded".into();
        ds.upsert_commits(&[updated.clone()]).unwrap();
        assert_eq!(ds.get_commits().unwrap(), vec![updated]);

        ds.upsert_pulls(&[pull(1, "bob", "2024-01-01T00:00:00Z", "2024-01-01T02:00:00Z", "R")]).unwrap();
        let p2 = pull(1, "bob", "2024-01-01T00:00:00Z", "2024-01-01T05:00:00Z", "R");
        let other_repo = pull(1, "bob", "2024-01-01T00:00:00Z", "2024-01-01T01:00:00Z", "S");
        ds.upsert_pulls(&[p2.clone(), other_repo.clone()]).unwrap();
        assert_eq!(ds.get_pulls().unwrap(), vec![p2, other_repo]);

        ds.upsert_releases(&[release("v1", "2024-01-01T00:00:00Z", "R")]).unwrap();
        let r2 = release("v1", "2024-02-01T00:00:00Z", "R");
        ds.upsert_releases(&[r2.clone()]).unwrap();
        assert_eq!(ds.get_releases().unwrap(), vec![r2]);
    }

    #[test]
    fn commits_by_author_with_window_and_repo() {
        let (_tmp, mut ds) = open_temp();
        ds.upsert_commits(&[
            commit("a1", "x@y.com", "2024-01-05T12:00:00Z", "R"),
            commit("a2", "x@y.com", "2024-02-01T12:00:00Z", "R"),
            commit("a3", "x@y.com", "2024-01-10T12:00:00Z", "S"),
        ])
        .unwrap();

        let filter = MetricFilter::parse(Some("2024-01-01"), Some("2024-01-31"), Some("R")).unwrap();
        let rows = ds.query_commits_by_author(&filter).unwrap();
        assert_eq!(
            rows,
            vec![CommitSummary {
                author: "x@y.com".into(),
                commits: 1,
                repo: "R".into()
            }]
        );

        let rows = ds.query_commits_by_author(&MetricFilter::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].commits, 2);
        assert_eq!(rows[0].repo, "R");
    }

    #[test]
    fn end_date_includes_the_whole_day() {
        let (_tmp, mut ds) = open_temp();
        ds.upsert_commits(&[commit("a1", "x@y.com", "2024-01-31T23:00:00Z", "R")]).unwrap();
        let filter = MetricFilter::parse(None, Some("2024-01-31"), None).unwrap();
        assert_eq!(ds.query_commits_by_author(&filter).unwrap().len(), 1);
        let filter = MetricFilter::parse(None, Some("2024-01-30"), None).unwrap();
        assert_eq!(ds.query_commits_by_author(&filter).unwrap().len(), 0);
    }

    #[test]
    fn timestamp_bounds_are_inclusive_and_exact() {
        let (_tmp, mut ds) = open_temp();
        ds.upsert_commits(&[
            commit("a1", "x@y.com", "2024-01-01T11:59:59Z", "R"),
            commit("a2", "x@y.com", "2024-01-01T12:00:00Z", "R"),
            commit("a3", "x@y.com", "2024-01-01T12:00:01Z", "R"),
            commit("a4", "x@y.com", "2024-01-01T12:00:00Z", "S"),
        ])
        .unwrap();

        let filter = MetricFilter::parse(Some("2024-01-01T12:00:00Z"), None, Some("R")).unwrap();
        let rows = ds.query_commits_by_author(&filter).unwrap();
        assert_eq!(rows[0].commits, 2);

        let filter = MetricFilter::parse(None, Some("2024-01-01T12:00:00Z"), Some("R")).unwrap();
        let rows = ds.query_commits_by_author(&filter).unwrap();
        assert_eq!(rows[0].commits, 2);

        let filter =
            MetricFilter::parse(Some("2024-01-01T12:00:00Z"), Some("2024-01-01T12:00:00Z"), None).unwrap();
        let rows = ds.query_commits_by_author(&filter).unwrap();
        assert_eq!(
            rows,
            vec![
                CommitSummary { author: "x@y.com".into(), commits: 1, repo: "R".into() },
                CommitSummary { author: "x@y.com".into(), commits: 1, repo: "S".into() },
            ]
        );
    }

    #[test]
    fn fractional_bounds_exclude_records_outside_them() {
        let (_tmp, mut ds) = open_temp();
        ds.upsert_commits(&[
            commit("a1", "x@y.com", "2024-01-01T12:00:00Z", "R"),
            commit("a2", "x@y.com", "2024-01-01T12:00:01Z", "R"),
        ])
        .unwrap();

        let filter = MetricFilter::parse(Some("2024-01-01T12:00:00.500Z"), None, None).unwrap();
        let rows = ds.query_commits_by_author(&filter).unwrap();
        assert_eq!(rows[0].commits, 1);

        let filter = MetricFilter::parse(None, Some("2024-01-01T12:00:00.500Z"), None).unwrap();
        let rows = ds.query_commits_by_author(&filter).unwrap();
        assert_eq!(rows[0].commits, 1);

        // bounds built directly rather than parsed get the same treatment
        let filter = MetricFilter {
            start: Some(ts("2024-01-01T12:00:00Z") + chrono::Duration::milliseconds(500)),
            ..MetricFilter::default()
        };
        let rows = ds.query_commits_by_author(&filter).unwrap();
        assert_eq!(rows[0].commits, 1);

        let filter = MetricFilter {
            start: Some(ts("2024-01-01T12:00:01Z") + chrono::Duration::milliseconds(1)),
            ..MetricFilter::default()
        };
        assert!(ds.query_commits_by_author(&filter).unwrap().is_empty());
    }

    #[test]
    fn pull_metrics_average_merge_time() {
        let (_tmp, mut ds) = open_temp();
        ds.upsert_pulls(&[
            pull(1, "bob", "2024-01-01T00:00:00Z", "2024-01-01T02:00:00Z", "R"),
            pull(2, "bob", "2024-01-02T00:00:00Z", "2024-01-02T04:00:00Z", "R"),
            pull(3, "amy", "2023-06-02T00:00:00Z", "2023-06-02T04:00:00Z", "R"),
        ])
        .unwrap();

        let rows = ds.query_pull_metrics(&MetricFilter::default()).unwrap();
        assert_eq!(
            rows,
            vec![
                PullSummary {
                    author: "bob".into(),
                    prs: 2,
                    avg_merge_time: 3.0,
                    repo: "R".into()
                },
                PullSummary {
                    author: "amy".into(),
                    prs: 1,
                    avg_merge_time: 4.0,
                    repo: "R".into()
                },
            ]
        );

        let filter = MetricFilter::parse(Some("2024-01-01"), None, None).unwrap();
        let rows = ds.query_pull_metrics(&filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].author, "bob");
    }

    #[test]
    fn release_counts_per_repo() {
        let (_tmp, mut ds) = open_temp();
        ds.upsert_releases(&[
            release("v1", "2024-01-01T00:00:00Z", "R"),
            release("v2", "2024-03-01T00:00:00Z", "R"),
            release("v1", "2024-02-01T00:00:00Z", "S"),
        ])
        .unwrap();

        let rows = ds.query_release_counts(&MetricFilter::default()).unwrap();
        assert_eq!(
            rows,
            vec![
                ReleaseSummary { repo: "R".into(), releases: 2 },
                ReleaseSummary { repo: "S".into(), releases: 1 },
            ]
        );

        let filter = MetricFilter::parse(Some("2024-02-01"), Some("2024-02-28"), None).unwrap();
        let rows = ds.query_release_counts(&filter).unwrap();
        assert_eq!(rows, vec![ReleaseSummary { repo: "S".into(), releases: 1 }]);

        let filter = MetricFilter::parse(None, None, Some("nope")).unwrap();
        assert!(ds.query_release_counts(&filter).unwrap().is_empty());
    }
}
