use anyhow::{Context, Result};

mod args;
mod cmd_collect;
mod cmd_datastore;
mod cmd_report;
mod cmd_serve;

use args::GlobalArgs;

fn configure_tracing(global_args: &GlobalArgs) -> Result<()> {
    use tracing_log::{AsLog, LogTracer};
    use tracing_subscriber::filter::LevelFilter;

    let filter = match global_args.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    LogTracer::builder()
        .with_max_level(filter.as_log())
        .init()?;

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(filter)
        .with_ansi(global_args.use_color())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn configure_color(global_args: &GlobalArgs) {
    let use_color = global_args.use_color();
    console::set_colors_enabled(use_color);
    console::set_colors_enabled_stderr(use_color);
}

fn try_main() -> Result<()> {
    let args = &args::CommandLineArgs::parse_args();
    let global_args = &args.global_args;

    configure_color(global_args);
    configure_tracing(global_args).context("Failed to initialize logging")?;

    match &args.command {
        args::Command::Collect(args) => cmd_collect::run(global_args, args),
        args::Command::Serve(args) => cmd_serve::run(global_args, args),
        args::Command::Report(args) => cmd_report::run(global_args, args),
        args::Command::Datastore(args) => cmd_datastore::run(global_args, args),
    }
}

fn main() {
    if let Err(e) = try_main() {
        eprintln!("Error: {e:?}");
        std::process::exit(2);
    }
}
