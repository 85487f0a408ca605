use anyhow::{Context, Result};
use tracing::debug;

use crate::args;
use repometrics::datastore::Datastore;
use repometrics::server::{self, AppState};

pub fn run(_global_args: &args::GlobalArgs, args: &args::ServeArgs) -> Result<()> {
    debug!("Args: {args:#?}");

    // Create the schema up front so that requests against a fresh path see empty tables
    drop(Datastore::open(&args.datastore)?);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to initialize async runtime")?;

    let state = AppState::new(args.datastore.clone());
    runtime.block_on(server::serve(state, args.listen))
}
