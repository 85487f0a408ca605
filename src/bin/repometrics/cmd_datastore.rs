use anyhow::Result;
use tracing::info;

use crate::args;
use repometrics::datastore::Datastore;

pub fn run(_global_args: &args::GlobalArgs, args: &args::DatastoreArgs) -> Result<()> {
    match &args.command {
        args::DatastoreCommand::Init(args) => cmd_datastore_init(args),
    }
}

fn cmd_datastore_init(args: &args::DatastoreInitArgs) -> Result<()> {
    let datastore = Datastore::open(&args.datastore)?;
    info!("Initialized datastore at {}", datastore.path().display());
    Ok(())
}
