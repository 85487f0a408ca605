use anyhow::{Context, Result};
use serde::Serialize;

use crate::datastore::Datastore;
use crate::filter::MetricFilter;
use crate::metrics::{self, MetricKind, MetricRows};

/// Write `rows` as CSV: a header row naming the fields, then one line per row in query order.
///
/// The header is written even when there are no rows.
pub fn write_csv<W: std::io::Write>(writer: W, rows: &MetricRows) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(rows.kind().fields())?;
    match rows {
        MetricRows::Commits(rows) => serialize_all(&mut wtr, rows)?,
        MetricRows::Prs(rows) => serialize_all(&mut wtr, rows)?,
        MetricRows::Releases(rows) => serialize_all(&mut wtr, rows)?,
    }
    wtr.flush()?;
    Ok(())
}

fn serialize_all<W: std::io::Write, T: Serialize>(wtr: &mut csv::Writer<W>, rows: &[T]) -> Result<()> {
    for row in rows {
        wtr.serialize(row)?;
    }
    Ok(())
}

/// Read CSV written by `write_csv` back into rows of metric `kind`.
pub fn parse_csv<R: std::io::Read>(reader: R, kind: MetricKind) -> Result<MetricRows> {
    let mut rdr = csv::Reader::from_reader(reader);
    let rows = match kind {
        MetricKind::Commits => MetricRows::Commits(rdr.deserialize().collect::<Result<_, _>>()?),
        MetricKind::Prs => MetricRows::Prs(rdr.deserialize().collect::<Result<_, _>>()?),
        MetricKind::Releases => MetricRows::Releases(rdr.deserialize().collect::<Result<_, _>>()?),
    };
    Ok(rows)
}

/// Produce the CSV export of the metric named `metric` under `filter`.
///
/// An unrecognized metric name produces an empty export rather than an error.
pub fn export_csv(datastore: &Datastore, metric: &str, filter: &MetricFilter) -> Result<Vec<u8>> {
    let kind: MetricKind = match metric.parse() {
        Ok(kind) => kind,
        Err(_e) => return Ok(Vec::new()),
    };
    let rows = metrics::summarize(datastore, kind, filter)
        .with_context(|| format!("Failed to summarize {kind}"))?;
    let mut buf = Vec::new();
    write_csv(&mut buf, &rows)?;
    Ok(buf)
}

/// The download file name for an export of `metric`.
pub fn export_file_name(metric: &str) -> String {
    format!("{metric}_metrics.csv")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::datastore::{CommitSummary, PullSummary, ReleaseSummary};
    use crate::records::{parse_timestamp, Commit, PullRequest, Release};
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;

    fn csv_string(rows: &MetricRows) -> String {
        let mut buf = Vec::new();
        write_csv(&mut buf, rows).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn header_matches_fields() {
        let rows = MetricRows::Prs(vec![PullSummary {
            author: "bob".into(),
            prs: 2,
            avg_merge_time: 3.5,
            repo: "R".into(),
        }]);
        assert_eq!(csv_string(&rows), "author,prs,avg_merge_time,repo\nbob,2,3.5,R\n");
    }

    #[test]
    fn empty_rows_still_have_header() {
        assert_eq!(csv_string(&MetricRows::Releases(vec![])), "repo,releases\n");
    }

    #[test]
    fn fields_needing_quotes_are_quoted() {
        let rows = MetricRows::Commits(vec![CommitSummary {
            author: "Doe, Jane".into(),
            commits: 1,
            repo: "R".into(),
        }]);
        assert_eq!(csv_string(&rows), "author,commits,repo\n\"Doe, Jane\",1,R\n");
    }

    fn populated() -> (TempDir, Datastore) {
        let tmp = TempDir::new().unwrap();
        let mut ds = Datastore::open(&tmp.path().join("metrics.db")).unwrap();
        let ts = |s: &str| parse_timestamp(s).unwrap();
        ds.upsert_commits(&[
            Commit::new("a1".into(), "x@y.com".into(), ts("2024-01-05T00:00:00Z"), "m".into(), "R".into()).unwrap(),
            Commit::new("a2".into(), "x@y.com".into(), ts("2024-02-01T00:00:00Z"), "m".into(), "R".into()).unwrap(),
            Commit::new("a3".into(), "w@y.com".into(), ts("2024-01-09T00:00:00Z"), "m".into(), "S".into()).unwrap(),
        ])
        .unwrap();
        ds.upsert_pulls(&[
            PullRequest::merged(1, "R".into(), "bob".into(), ts("2024-01-01T00:00:00Z"), ts("2024-01-01T01:15:00Z")).unwrap(),
            PullRequest::merged(2, "R".into(), "bob".into(), ts("2024-01-03T00:00:00Z"), ts("2024-01-03T02:00:00Z")).unwrap(),
        ])
        .unwrap();
        ds.upsert_releases(&[Release::new("v1".into(), "R".into(), ts("2024-01-20T00:00:00Z")).unwrap()])
            .unwrap();
        (tmp, ds)
    }

    #[test]
    fn export_round_trips_with_filters() {
        let (_tmp, ds) = populated();
        let filters = [
            MetricFilter::default(),
            MetricFilter::parse(Some("2024-01-01"), Some("2024-01-31"), None).unwrap(),
            MetricFilter::parse(None, None, Some("S")).unwrap(),
        ];
        for filter in &filters {
            for kind in MetricKind::ALL {
                let exported = export_csv(&ds, kind.name(), filter).unwrap();
                let parsed = parse_csv(exported.as_slice(), kind).unwrap();
                let queried = metrics::summarize(&ds, kind, filter).unwrap();
                assert_eq!(parsed, queried, "{kind} with {filter:?}");
            }
        }
    }

    #[test]
    fn empty_release_export_is_header_only() {
        let (_tmp, ds) = populated();
        let filter = MetricFilter::parse(None, None, Some("nope")).unwrap();
        let exported = export_csv(&ds, "releases", &filter).unwrap();
        assert_eq!(String::from_utf8(exported).unwrap(), "repo,releases\n");
        assert_eq!(
            parse_csv("repo,releases\n".as_bytes(), MetricKind::Releases).unwrap(),
            MetricRows::Releases(Vec::<ReleaseSummary>::new())
        );
    }

    #[test]
    fn unknown_metric_exports_nothing() {
        let (_tmp, ds) = populated();
        let exported = export_csv(&ds, "issues", &MetricFilter::default()).unwrap();
        assert!(exported.is_empty());
        assert_eq!(export_file_name("issues"), "issues_metrics.csv");
    }
}
