//! CLI argument definitions for tickerforge.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `import` | Fetch all feeds, reconcile, and persist the registry |
//! | `remove` | Delete tickers from the registry and snapshot |
//! | `asset-types` | List supported upstream asset type codes |

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// tickerforge - canonical instrument registry importer
///
/// Assembles one consistent record per tradeable instrument from several
/// imperfect upstream feeds, reconciles it against the previously
/// persisted registry, and hands the result to DuckDB and a Parquet
/// snapshot.
#[derive(Debug, Parser)]
#[command(
    name = "tickerforge",
    author,
    version,
    about = "Canonical instrument registry importer"
)]
pub struct Cli {
    /// Path to the registry database file.
    #[arg(long, global = true, default_value = "tickerforge.duckdb")]
    pub db_path: PathBuf,

    /// Print logs as JSON to stderr.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one import batch: fetch, reconcile, persist.
    ///
    /// A run that would delist more records than --max-removed aborts
    /// with exit code 4 and persists nothing.
    Import(ImportArgs),

    /// Remove the named tickers from the registry and snapshot.
    Remove(RemoveArgs),

    /// List supported upstream asset type codes.
    AssetTypes,
}

/// Arguments for the `import` command.
#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Do not fetch the equity/fund listing feed.
    #[arg(long, default_value_t = false)]
    pub skip_polygon: bool,

    /// Do not fetch per-ticker listing details.
    #[arg(long, default_value_t = false)]
    pub skip_polygon_detail: bool,

    /// Do not fetch the mutual-fund listing feed.
    #[arg(long, default_value_t = false)]
    pub skip_tiingo: bool,

    /// Do not run identifier mapping enrichment.
    #[arg(long, default_value_t = false)]
    pub skip_figi: bool,

    /// Do not run descriptive-metadata enrichment.
    #[arg(long, default_value_t = false)]
    pub skip_yahoo: bool,

    /// Listing feed API token. Falls back to TICKERFORGE_POLYGON_TOKEN.
    #[arg(long, short = 't')]
    pub polygon_token: Option<String>,

    /// Identifier mapping API key. Falls back to TICKERFORGE_OPENFIGI_KEY.
    #[arg(long)]
    pub openfigi_key: Option<String>,

    /// Limit the combined candidate set to N records (trial runs).
    #[arg(long, short = 'l')]
    pub limit: Option<usize>,

    /// Maximum number of delisted records a single run may persist.
    #[arg(long, default_value_t = 25)]
    pub max_removed: usize,

    /// Also write a Parquet snapshot of the active registry.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Print the reconciled assets as a table.
    #[arg(long, default_value_t = false)]
    pub print: bool,
}

/// Arguments for the `remove` command.
#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// Tickers to remove.
    #[arg(required = true, num_args = 1..)]
    pub tickers: Vec<String>,

    /// Rewrite this Parquet snapshot after removal.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}
