use anyhow::{bail, Context, Result};
use indicatif::{HumanCount, ProgressBar, ProgressStyle};
use tracing::{debug, debug_span, info, warn};

use repometrics::collector::Collector;
use repometrics::config::Config;
use repometrics::datastore::Datastore;
use repometrics::defaults::GITHUB_TOKEN_ENV_VAR;
use repometrics::github;
use repometrics::records::parse_timestamp;

use crate::args;

pub fn run(global_args: &args::GlobalArgs, args: &args::CollectArgs) -> Result<()> {
    let _span = debug_span!("collect").entered();
    debug!("Args: {args:#?}");

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    if let Some(since) = &args.since {
        config.since = parse_timestamp(since)
            .with_context(|| format!("Invalid --since timestamp {since:?}"))?;
    }

    let client = {
        let mut builder = github::ClientBuilder::new()
            .base_url(config.api_url.clone())
            .context("Failed to set GitHub API URL")?;
        match config.github_token.take() {
            Some(token) => {
                debug!("Using GitHub personal access token from configuration");
                builder = builder.auth(github::Auth::PersonalAccessToken(token));
            }
            None => {
                debug!(
                    "No token in configuration; checking the {} environment variable",
                    GITHUB_TOKEN_ENV_VAR
                );
                builder = builder.personal_access_token_from_env(GITHUB_TOKEN_ENV_VAR)?;
            }
        }
        if !builder.is_authenticated() {
            bail!(
                "No GitHub token: set `github_token` in the configuration or the {} environment variable",
                GITHUB_TOKEN_ENV_VAR
            );
        }
        builder.build().context("Failed to initialize GitHub client")?
    };

    let policy = github::FetchPolicy::default()
        .max_pages(args.max_pages)
        .max_retries(args.retries);

    let mut datastore = Datastore::open(&args.datastore)
        .with_context(|| format!("Failed to open datastore at {}", args.datastore.display()))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to initialize async runtime")?;

    let progress = if global_args.use_progress() {
        ProgressBar::new(config.repositories.len() as u64).with_style(
            ProgressStyle::with_template("{msg}  {bar} {pos}/{len}  [{elapsed_precise}]")?,
        )
    } else {
        ProgressBar::hidden()
    };
    progress.set_message("Collecting repositories");

    let collector = Collector::with_policy(&client, policy);
    for repo in &config.repositories {
        progress.set_message(format!("Collecting {repo}"));

        let collection = match runtime.block_on(collector.collect(repo, config.since)) {
            Ok(collection) => collection,
            Err(github::Error::RateLimited { wait, .. }) => {
                warn!("Rate limit exceeded: Would need to wait for {:?} before retrying", wait);
                bail!("Failed to collect {repo}: GitHub rate limit exceeded");
            }
            Err(e) => Err(e).with_context(|| format!("Failed to collect {repo}"))?,
        };

        let num_commits = datastore.upsert_commits(&collection.commits)?;
        let num_pulls = datastore.upsert_pulls(&collection.pulls)?;
        let num_releases = datastore.upsert_releases(&collection.releases)?;
        info!("Recorded {repo} into {}", datastore.path().display());

        progress.suspend(|| {
            println!(
                "{repo}: {} commits, {} merged pull requests, {} releases",
                HumanCount(num_commits as u64),
                HumanCount(num_pulls as u64),
                HumanCount(num_releases as u64),
            )
        });
        progress.inc(1);
    }
    progress.finish_with_message("Collected repositories");

    Ok(())
}
