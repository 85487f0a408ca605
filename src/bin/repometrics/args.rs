use anyhow::{Context, Result};
use clap::{crate_description, crate_version, ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

use repometrics::defaults::{DEFAULT_DATASTORE_PATH, DEFAULT_LISTEN_ADDR};
use repometrics::filter::{FilterError, MetricFilter};
use repometrics::metrics::MetricKind;

// -----------------------------------------------------------------------------
// command-line args
// -----------------------------------------------------------------------------
#[derive(Parser, Debug)]
#[command(
    author,   // retrieved from Cargo.toml `authors`
    version,  // retrieved from Cargo.toml `version`
    about,    // retrieved from Cargo.toml `description`

    long_version = concat!(
        crate_version!(),
    ),

    long_about = concat!(
        crate_description!(),
    ),
)]
#[deny(missing_docs)]
/// Collect and report engineering activity metrics from GitHub
pub struct CommandLineArgs {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global_args: GlobalArgs,
}

impl CommandLineArgs {
    pub fn parse_args() -> Self {
        let mut s = Self::parse();

        // If `NO_COLOR` is set in the environment, disable colored output
        //
        // https://no-color.org/
        if std::env::var("NO_COLOR").is_ok() {
            s.global_args.color = Mode::Never
        }

        s
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect metrics from GitHub into a datastore
    ///
    /// Each repository listed in the configuration file has its commits, merged pull requests,
    /// and releases since a fixed start date fetched and recorded into the datastore.
    /// Records already in the datastore are replaced by newly fetched ones with the same key.
    ///
    /// The configuration file is a JSON (or YAML, for `.yaml` and `.yml` files) document like:
    ///
    ///   {"github_token": "...", "repositories": [{"owner": "octo", "repo": "hello"}]}
    ///
    /// If it has no `github_token`, the `GITHUB_TOKEN` environment variable is used.
    #[command(display_order = 1)]
    Collect(CollectArgs),

    /// Serve the metrics dashboard
    #[command(display_order = 2)]
    Serve(ServeArgs),

    /// Report summarized metrics
    #[command(display_order = 3)]
    Report(ReportArgs),

    #[command(display_order = 30)]
    /// Manage datastores
    Datastore(DatastoreArgs),
}

// -----------------------------------------------------------------------------
// global options
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
#[command(next_help_heading = "Global Options")]
pub struct GlobalArgs {
    /// Enable verbose output
    ///
    /// This can be repeated up to 3 times to enable successively more output.
    #[arg(global=true, long, short, action=ArgAction::Count)]
    pub verbose: u8,

    /// Enable or disable colored output
    ///
    /// When this is "auto", colors are enabled when stdout is a tty.
    ///
    /// If the `NO_COLOR` environment variable is set, it takes precedence and is equivalent to `--color=never`.
    #[arg(global=true, long, default_value_t=Mode::Auto, value_name="MODE")]
    pub color: Mode,

    /// Enable or disable progress bars
    ///
    /// When this is "auto", progress bars are enabled when stderr is a tty.
    #[arg(global=true, long, default_value_t=Mode::Auto, value_name="MODE")]
    pub progress: Mode,
}

impl GlobalArgs {
    pub fn use_color(&self) -> bool {
        match self.color {
            Mode::Never => false,
            Mode::Always => true,
            Mode::Auto => atty::is(atty::Stream::Stdout),
        }
    }

    pub fn use_progress(&self) -> bool {
        match self.progress {
            Mode::Never => false,
            Mode::Always => true,
            Mode::Auto => atty::is(atty::Stream::Stderr),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Mode {
    Auto,
    Never,
    Always,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mode::Auto => "auto",
            Mode::Never => "never",
            Mode::Always => "always",
        };
        write!(f, "{s}")
    }
}

// -----------------------------------------------------------------------------
// `datastore` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct DatastoreArgs {
    #[command(subcommand)]
    pub command: DatastoreCommand,
}

#[derive(Subcommand, Debug)]
pub enum DatastoreCommand {
    /// Initialize a new datastore
    Init(DatastoreInitArgs),
}

#[derive(Args, Debug)]
pub struct DatastoreInitArgs {
    #[arg(long, short, value_name = "PATH", env("REPOMETRICS_DATASTORE"), default_value = DEFAULT_DATASTORE_PATH)]
    /// Initialize the datastore at specified path
    pub datastore: PathBuf,
}

// -----------------------------------------------------------------------------
// `collect` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Use the specified datastore path
    ///
    /// The datastore will be created if it does not exist.
    #[arg(long, short, value_name = "PATH", env("REPOMETRICS_DATASTORE"), default_value = DEFAULT_DATASTORE_PATH)]
    pub datastore: PathBuf,

    /// Read collection settings from the specified file
    #[arg(long, short, value_name = "PATH", default_value = "config.json")]
    pub config: PathBuf,

    /// Collect activity at or after this RFC 3339 timestamp, overriding the configuration
    #[arg(long, value_name = "TIMESTAMP")]
    pub since: Option<String>,

    /// Fail if any listing has more than this many pages
    #[arg(long, value_name = "N", default_value_t = 1000)]
    pub max_pages: usize,

    /// Retry requests that fail with transport errors or server errors up to this many times
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub retries: u32,
}

// -----------------------------------------------------------------------------
// `serve` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Use the specified datastore path
    #[arg(long, short, value_name = "PATH", env("REPOMETRICS_DATASTORE"), default_value = DEFAULT_DATASTORE_PATH)]
    pub datastore: PathBuf,

    /// Listen on the specified address
    #[arg(long, short, value_name = "ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    pub listen: SocketAddr,
}

// -----------------------------------------------------------------------------
// `report` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Use the specified datastore path
    #[arg(long, short, value_name = "PATH", env("REPOMETRICS_DATASTORE"), default_value = DEFAULT_DATASTORE_PATH)]
    pub datastore: PathBuf,

    /// The metric to report
    #[arg(long, short, value_name = "METRIC", value_enum)]
    pub metric: MetricArg,

    #[command(flatten)]
    pub filter_args: FilterArgs,

    #[command(flatten)]
    pub output_args: OutputArgs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MetricArg {
    /// Commits per author and repository
    Commits,

    /// Merged pull requests and average merge time per author and repository
    Prs,

    /// Releases per repository
    Releases,
}

impl From<MetricArg> for MetricKind {
    fn from(m: MetricArg) -> Self {
        match m {
            MetricArg::Commits => MetricKind::Commits,
            MetricArg::Prs => MetricKind::Prs,
            MetricArg::Releases => MetricKind::Releases,
        }
    }
}

#[derive(Args, Debug)]
#[command(next_help_heading = "Filter Options")]
pub struct FilterArgs {
    /// Only include activity on or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_name = "DATE")]
    pub start_date: Option<String>,

    /// Only include activity on or before this date (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_name = "DATE")]
    pub end_date: Option<String>,

    /// Only include activity in this repository
    #[arg(long, value_name = "NAME")]
    pub repo: Option<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> Result<MetricFilter, FilterError> {
        MetricFilter::parse(
            self.start_date.as_deref(),
            self.end_date.as_deref(),
            self.repo.as_deref(),
        )
    }
}

// -----------------------------------------------------------------------------
// output options
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
#[command(next_help_heading = "Output Options")]
pub struct OutputArgs {
    /// Write output to the specified path
    ///
    /// If this argument is not provided, stdout will be used.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Write output in the specified format
    #[arg(long, short, value_name="FORMAT", default_value_t=OutputFormat::Human)]
    pub format: OutputFormat,
}

impl OutputArgs {
    /// Get a writer for the specified output destination.
    pub fn get_writer(&self) -> std::io::Result<Box<dyn std::io::Write>> {
        use std::fs::File;
        use std::io::BufWriter;

        match &self.output {
            None => Ok(Box::new(BufWriter::new(std::io::stdout()))),
            Some(p) => {
                let f = File::create(p)?;
                Ok(Box::new(BufWriter::new(f)))
            }
        }
    }
}

// -----------------------------------------------------------------------------
// output format
// -----------------------------------------------------------------------------
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// A text-based format designed for humans
    Human,

    /// Pretty-printed JSON format
    Json,

    /// JSON Lines format
    ///
    /// This is a sequence of JSON objects, one per line.
    Jsonl,

    /// Comma-separated values, with a header row
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutputFormat::Human => "human",
            OutputFormat::Json => "json",
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::Csv => "csv",
        };
        write!(f, "{s}")
    }
}

// -----------------------------------------------------------------------------
// report writer
// -----------------------------------------------------------------------------
pub trait Reportable {
    fn human_format<W: std::io::Write>(&self, writer: W) -> Result<()>;
    fn json_format<W: std::io::Write>(&self, writer: W) -> Result<()>;
    fn jsonl_format<W: std::io::Write>(&self, writer: W) -> Result<()>;
    fn csv_format<W: std::io::Write>(&self, writer: W) -> Result<()>;

    fn report(&self, output_args: &OutputArgs) -> Result<()> {
        let writer = output_args
            .get_writer()
            .context("Failed to open output destination for writing")?;

        let result = match &output_args.format {
            OutputFormat::Human => self.human_format(writer),
            OutputFormat::Json => self.json_format(writer),
            OutputFormat::Jsonl => self.jsonl_format(writer),
            OutputFormat::Csv => self.csv_format(writer),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) => match e.downcast_ref::<std::io::Error>() {
                // Ignore SIGPIPE errors, like those that can come from piping to `head`
                Some(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                _ => Err(e)?,
            },
        }
    }
}
