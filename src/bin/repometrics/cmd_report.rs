use anyhow::{Context, Result};
use indicatif::HumanCount;
use serde::Serialize;

use repometrics::datastore::Datastore;
use repometrics::export::write_csv;
use repometrics::metrics::{self, MetricKind, MetricRows};

use crate::args::{self, Reportable};

pub fn run(_global_args: &args::GlobalArgs, args: &args::ReportArgs) -> Result<()> {
    let filter = args.filter_args.to_filter()?;
    let datastore = Datastore::open(&args.datastore)
        .with_context(|| format!("Failed to open datastore at {}", args.datastore.display()))?;
    let kind = MetricKind::from(args.metric);
    let rows = metrics::summarize(&datastore, kind, &filter)
        .with_context(|| format!("Failed to summarize {kind}"))?;
    MetricReporter(rows).report(&args.output_args)
}

struct MetricReporter(MetricRows);

impl Reportable for MetricReporter {
    fn human_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        if self.0.is_empty() {
            writeln!(writer, "No {} found", self.0.kind())?;
            return Ok(());
        }
        writeln!(writer)?;
        let table = metric_table(&self.0);
        // FIXME: this doesn't preserve ANSI styling on the table
        table.print(&mut writer)?;
        Ok(())
    }

    fn json_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, &self.0)?;
        writeln!(writer)?;
        Ok(())
    }

    fn jsonl_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        fn write_lines<W: std::io::Write, T: Serialize>(writer: &mut W, rows: &[T]) -> Result<()> {
            for row in rows {
                serde_json::to_writer(&mut *writer, row)?;
                writeln!(writer)?;
            }
            Ok(())
        }

        match &self.0 {
            MetricRows::Commits(rows) => write_lines(&mut writer, rows),
            MetricRows::Prs(rows) => write_lines(&mut writer, rows),
            MetricRows::Releases(rows) => write_lines(&mut writer, rows),
        }
    }

    fn csv_format<W: std::io::Write>(&self, writer: W) -> Result<()> {
        write_csv(writer, &self.0)
    }
}

pub fn metric_table(rows: &MetricRows) -> prettytable::Table {
    use prettytable::format::{FormatBuilder, LinePosition, LineSeparator};
    use prettytable::row;

    let f = FormatBuilder::new()
        .column_separator(' ')
        .separators(&[LinePosition::Title], LineSeparator::new('─', '─', '─', '─'))
        .padding(1, 1)
        .build();

    let (mut table, titles): (prettytable::Table, _) = match rows {
        MetricRows::Commits(rows) => (
            rows.iter()
                .map(|r| row![l -> &r.author, l -> &r.repo, r -> HumanCount(r.commits as u64)])
                .collect(),
            row![lb -> "Author", lb -> "Repository", cb -> "Commits"],
        ),
        MetricRows::Prs(rows) => (
            rows.iter()
                .map(|r| {
                    row![
                        l -> &r.author,
                        l -> &r.repo,
                        r -> HumanCount(r.prs as u64),
                        r -> format!("{:.2}", r.avg_merge_time)
                    ]
                })
                .collect(),
            row![lb -> "Author", lb -> "Repository", cb -> "Merged PRs", cb -> "Avg. Merge Time (h)"],
        ),
        MetricRows::Releases(rows) => (
            rows.iter()
                .map(|r| row![l -> &r.repo, r -> HumanCount(r.releases as u64)])
                .collect(),
            row![lb -> "Repository", cb -> "Releases"],
        ),
    };
    table.set_format(f);
    table.set_titles(titles);
    table
}
