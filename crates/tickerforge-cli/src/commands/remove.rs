use tracing::info;

use tickerforge_warehouse::{Registry, RegistryConfig};

use crate::cli::{Cli, RemoveArgs};
use crate::error::CliError;

pub fn run(cli: &Cli, args: &RemoveArgs) -> Result<(), CliError> {
    let registry = Registry::open(RegistryConfig {
        db_path: cli.db_path.clone(),
    })?;

    let removed = registry.remove_tickers(&args.tickers)?;
    info!(removed, requested = args.tickers.len(), "removed assets");

    if let Some(snapshot) = &args.snapshot {
        let exported = registry.export_snapshot(snapshot)?;
        info!(path = %snapshot.display(), records = exported, "snapshot rewritten");
    }

    Ok(())
}
