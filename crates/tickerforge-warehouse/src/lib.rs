//! DuckDB-backed registry store for tickerforge.
//!
//! Holds the persisted asset registry between runs, upserts the reconciled
//! generation with per-run audit flags, and reads/writes Parquet snapshots
//! through DuckDB's `COPY`/`read_parquet`.
//!
//! All user- and feed-provided values are bound as query parameters; the
//! string-escape helper is only used for internal file paths and migration
//! version labels.

pub mod migrations;

use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{Connection, ToSql};
use thiserror::Error;
use tracing::warn;

use tickerforge_core::{Asset, AssetType, CalendarDate, FeedId, Ticker, UtcDateTime};

/// Errors that can occur during registry store operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Snapshot path was rejected.
    #[error("snapshot rejected: {0}")]
    SnapshotRejected(String),
}

/// Configuration for the registry database.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
}

/// Per-run counters recorded in the import log.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportCounts {
    pub assets: usize,
    pub new: usize,
    pub updated: usize,
    pub removed: usize,
}

/// The registry store interface.
pub struct Registry {
    connection: Connection,
}

const ASSET_COLUMNS: &str = "ticker, name, description, primary_exchange, asset_type, \
     composite_figi, share_class_figi, cusip, isin, cik, \
     CAST(listed_utc AS VARCHAR) AS listed_utc, \
     CAST(delisted_utc AS VARCHAR) AS delisted_utc, \
     industry, sector, icon_url, corporate_url, headquarters, \
     similar_tickers, source, detail_refreshed_at, \
     is_new, updated, update_reasons, last_updated";

impl Registry {
    /// Open (and migrate) the registry at the configured path.
    pub fn open(config: RegistryConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let connection = Connection::open(&config.db_path)?;
        migrations::apply_migrations(&connection)?;
        Ok(Self { connection })
    }

    /// Open an in-memory registry, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self, WarehouseError> {
        let connection = Connection::open_in_memory()?;
        migrations::apply_migrations(&connection)?;
        Ok(Self { connection })
    }

    /// Load the full previous generation, delisted members included.
    /// The differ needs retired records to avoid re-adding them.
    pub fn load_registry(&self) -> Result<Vec<Asset>, WarehouseError> {
        self.query_assets(&format!("SELECT {ASSET_COLUMNS} FROM assets"))
    }

    /// Replace the per-run flags and upsert the reconciled generation in
    /// one transaction, recording the run in the import log.
    pub fn upsert_registry(
        &self,
        run_id: &str,
        assets: &[Asset],
    ) -> Result<ImportCounts, WarehouseError> {
        let counts = ImportCounts {
            assets: assets.len(),
            new: assets.iter().filter(|asset| asset.is_new).count(),
            updated: assets.iter().filter(|asset| asset.updated).count(),
            removed: assets.iter().filter(|asset| asset.is_delisted()).count(),
        };

        self.connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), WarehouseError> {
            // Previous generation's flags are per-run state, not history.
            self.connection.execute_batch(
                "UPDATE assets SET active = FALSE, updated = FALSE, is_new = FALSE",
            )?;

            for asset in assets {
                self.upsert_asset(asset)?;
            }

            let asset_count = counts.assets as i64;
            let new_count = counts.new as i64;
            let updated_count = counts.updated as i64;
            let removed_count = counts.removed as i64;
            let params: [&dyn ToSql; 5] =
                [&run_id, &asset_count, &new_count, &updated_count, &removed_count];
            self.connection.execute(
                "INSERT INTO import_log \
                 (run_id, asset_count, new_count, updated_count, removed_count, timestamp) \
                 VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
                params.as_slice(),
            )?;

            Ok(())
        })();

        finalize_transaction(&self.connection, result)?;
        Ok(counts)
    }

    fn upsert_asset(&self, asset: &Asset) -> Result<(), WarehouseError> {
        let ticker = asset.ticker.as_str();
        let asset_type = asset.asset_type.as_str();
        let listed = asset.listing_date.map(|date| date.to_string());
        let delisted = asset.delisting_date.map(|date| date.to_string());
        let similar_tickers = if asset.similar_tickers.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&asset.similar_tickers).unwrap_or_default())
        };
        let update_reasons = if asset.update_reasons.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&asset.update_reasons).unwrap_or_default())
        };
        let source = asset.source.map(|feed| feed.as_str());
        let detail_refreshed_at = asset.detail_refreshed_at.map(UtcDateTime::unix_timestamp);
        let last_updated = asset.last_updated.unix_timestamp();
        let active = asset.is_active();

        let params: [&dyn ToSql; 25] = [
            &ticker,
            &asset.name,
            &asset.description,
            &asset.primary_exchange,
            &asset_type,
            &asset.composite_figi,
            &asset.share_class_figi,
            &asset.cusip,
            &asset.isin,
            &asset.cik,
            &listed,
            &delisted,
            &asset.industry,
            &asset.sector,
            &asset.icon_url,
            &asset.corporate_url,
            &asset.headquarters,
            &similar_tickers,
            &source,
            &detail_refreshed_at,
            &active,
            &asset.is_new,
            &asset.updated,
            &update_reasons,
            &last_updated,
        ];

        self.connection.execute(
            "INSERT INTO assets (\
                 ticker, name, description, primary_exchange, asset_type, \
                 composite_figi, share_class_figi, cusip, isin, cik, \
                 listed_utc, delisted_utc, industry, sector, icon_url, \
                 corporate_url, headquarters, similar_tickers, source, \
                 detail_refreshed_at, active, is_new, updated, update_reasons, \
                 last_updated) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, \
                 TRY_CAST(? AS DATE), TRY_CAST(? AS DATE), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (ticker) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 description = EXCLUDED.description, \
                 primary_exchange = EXCLUDED.primary_exchange, \
                 asset_type = EXCLUDED.asset_type, \
                 composite_figi = EXCLUDED.composite_figi, \
                 share_class_figi = EXCLUDED.share_class_figi, \
                 cusip = EXCLUDED.cusip, \
                 isin = EXCLUDED.isin, \
                 cik = EXCLUDED.cik, \
                 listed_utc = EXCLUDED.listed_utc, \
                 delisted_utc = EXCLUDED.delisted_utc, \
                 industry = EXCLUDED.industry, \
                 sector = EXCLUDED.sector, \
                 icon_url = EXCLUDED.icon_url, \
                 corporate_url = EXCLUDED.corporate_url, \
                 headquarters = EXCLUDED.headquarters, \
                 similar_tickers = EXCLUDED.similar_tickers, \
                 source = EXCLUDED.source, \
                 detail_refreshed_at = EXCLUDED.detail_refreshed_at, \
                 active = EXCLUDED.active, \
                 is_new = EXCLUDED.is_new, \
                 updated = EXCLUDED.updated, \
                 update_reasons = EXCLUDED.update_reasons, \
                 last_updated = EXCLUDED.last_updated",
            params.as_slice(),
        )?;

        Ok(())
    }

    /// Export the active registry as a Parquet snapshot. Delisted records
    /// got their final persisted row in the run that retired them and are
    /// excluded here.
    pub fn export_snapshot(&self, path: &Path) -> Result<usize, WarehouseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let path_str = path_to_sql(path)?;
        let sql = format!(
            "COPY (SELECT * FROM assets WHERE delisted_utc IS NULL) \
             TO '{}' (FORMAT PARQUET, COMPRESSION GZIP)",
            escape_sql_string(&path_str)
        );
        self.connection.execute_batch(&sql)?;

        let count: i64 = self.connection.query_row(
            "SELECT COUNT(*) FROM assets WHERE delisted_utc IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Read a Parquet snapshot back into asset records.
    pub fn import_snapshot(&self, path: &Path) -> Result<Vec<Asset>, WarehouseError> {
        let path_str = path_to_sql(path)?;
        self.query_assets(&format!(
            "SELECT {ASSET_COLUMNS} FROM read_parquet('{}')",
            escape_sql_string(&path_str)
        ))
    }

    /// Delete the given tickers from the registry. Returns how many rows
    /// were removed.
    pub fn remove_tickers(&self, tickers: &[String]) -> Result<usize, WarehouseError> {
        let mut removed = 0;
        for ticker in tickers {
            let params: [&dyn ToSql; 1] = [ticker];
            removed += self
                .connection
                .execute("DELETE FROM assets WHERE ticker = ?", params.as_slice())?;
        }
        Ok(removed)
    }

    /// Number of import-log entries, newest-run bookkeeping for tests and
    /// the CLI summary.
    pub fn import_log_len(&self) -> Result<usize, WarehouseError> {
        let count: i64 =
            self.connection
                .query_row("SELECT COUNT(*) FROM import_log", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn query_assets(&self, sql: &str) -> Result<Vec<Asset>, WarehouseError> {
        let mut statement = self.connection.prepare(sql)?;
        let mut rows = statement.query([] as [&dyn ToSql; 0])?;

        let mut assets = Vec::new();
        while let Some(row) = rows.next()? {
            let ticker_text: String = row.get(0)?;
            let ticker = match Ticker::parse(&ticker_text) {
                Ok(ticker) => ticker,
                Err(error) => {
                    warn!(ticker = %ticker_text, %error, "skipping stored row with invalid ticker");
                    continue;
                }
            };

            let mut asset = Asset::new(ticker);
            asset.name = row.get(1)?;
            asset.description = row.get(2)?;
            asset.primary_exchange = row.get(3)?;

            let asset_type_label: String = row.get(4)?;
            asset.asset_type = match asset_type_label.parse::<AssetType>() {
                Ok(asset_type) => asset_type,
                Err(error) => {
                    warn!(label = %asset_type_label, %error, "unrecognized stored asset type");
                    AssetType::Unknown
                }
            };

            asset.composite_figi = row.get(5)?;
            asset.share_class_figi = row.get(6)?;
            asset.cusip = row.get(7)?;
            asset.isin = row.get(8)?;
            asset.cik = row.get(9)?;
            asset.listing_date = parse_stored_date(row.get(10)?);
            asset.delisting_date = parse_stored_date(row.get(11)?);
            asset.industry = row.get(12)?;
            asset.sector = row.get(13)?;
            asset.icon_url = row.get(14)?;
            asset.corporate_url = row.get(15)?;
            asset.headquarters = row.get(16)?;
            asset.similar_tickers = parse_stored_list(row.get(17)?);
            asset.source = parse_stored_source(row.get(18)?);
            asset.detail_refreshed_at = row
                .get::<_, Option<i64>>(19)?
                .and_then(|seconds| UtcDateTime::from_unix_timestamp(seconds).ok());
            asset.is_new = row.get(20)?;
            asset.updated = row.get(21)?;
            asset.update_reasons = parse_stored_list(row.get(22)?);

            let last_updated: i64 = row.get(23)?;
            asset.last_updated = match UtcDateTime::from_unix_timestamp(last_updated) {
                Ok(timestamp) => timestamp,
                Err(error) => {
                    warn!(ticker = %asset.ticker, %error, "stored timestamp out of range");
                    UtcDateTime::now()
                }
            };

            assets.push(asset);
        }

        Ok(assets)
    }
}

fn parse_stored_date(value: Option<String>) -> Option<CalendarDate> {
    let value = value?;
    match CalendarDate::parse(&value) {
        Ok(date) => Some(date),
        Err(error) => {
            warn!(value = %value, %error, "unparseable stored date");
            None
        }
    }
}

fn parse_stored_list(value: Option<String>) -> Vec<String> {
    let Some(value) = value else {
        return Vec::new();
    };
    match serde_json::from_str(&value) {
        Ok(list) => list,
        Err(error) => {
            warn!(value = %value, %error, "unparseable stored list");
            Vec::new()
        }
    }
}

fn parse_stored_source(value: Option<String>) -> Option<FeedId> {
    let value = value?;
    match value.parse::<FeedId>() {
        Ok(feed) => Some(feed),
        Err(error) => {
            warn!(value = %value, %error, "unrecognized stored source");
            None
        }
    }
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

/// Convert a path to a SQL-compatible string (forward slashes).
fn path_to_sql(path: &Path) -> Result<String, WarehouseError> {
    let text = path.to_string_lossy().replace('\\', "/");
    if text.is_empty() {
        return Err(WarehouseError::SnapshotRejected(String::from(
            "snapshot path must not be empty",
        )));
    }
    Ok(text)
}

/// Escape a string for safe inclusion in SQL. Only used for internal file
/// paths; feed data always goes through parameterized queries.
fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}
