use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use tickerforge_core::adapters::{
    OpenFigiEnricher, PolygonDetailEnricher, PolygonFeed, TiingoFeed, YahooEnricher,
};
use tickerforge_core::{
    AssetEnricher, AssetFeed, ReconcileConfig, Reconciler, ReqwestHttpClient,
};
use tickerforge_warehouse::{Registry, RegistryConfig};

use crate::cli::{Cli, ImportArgs};
use crate::error::CliError;
use crate::output;

pub async fn run(cli: &Cli, args: &ImportArgs) -> Result<(), CliError> {
    let run_id = Uuid::new_v4().to_string();
    info!(run_id = %run_id, "starting import run");

    let http_client = Arc::new(ReqwestHttpClient::new());

    let polygon_token = args
        .polygon_token
        .clone()
        .or_else(|| std::env::var("TICKERFORGE_POLYGON_TOKEN").ok())
        .unwrap_or_default();
    let openfigi_key = args
        .openfigi_key
        .clone()
        .or_else(|| std::env::var("TICKERFORGE_OPENFIGI_KEY").ok());

    let mut feeds: Vec<Arc<dyn AssetFeed>> = Vec::new();
    if !args.skip_polygon {
        if polygon_token.is_empty() {
            warn!("no listing feed token configured; listing fetch will be unauthenticated");
        }
        feeds.push(Arc::new(PolygonFeed::new(
            http_client.clone(),
            polygon_token.clone(),
        )));
    }
    if !args.skip_tiingo {
        feeds.push(Arc::new(TiingoFeed::new(http_client.clone())));
    }

    let mut enrichers: Vec<Arc<dyn AssetEnricher>> = Vec::new();
    if !args.skip_figi {
        enrichers.push(Arc::new(OpenFigiEnricher::new(
            http_client.clone(),
            openfigi_key,
        )));
    }
    if !args.skip_polygon_detail {
        enrichers.push(Arc::new(PolygonDetailEnricher::new(
            http_client.clone(),
            polygon_token,
        )));
    }
    if !args.skip_yahoo {
        enrichers.push(Arc::new(YahooEnricher::new(http_client.clone())));
    }

    let registry = Registry::open(RegistryConfig {
        db_path: cli.db_path.clone(),
    })?;
    let existing = registry.load_registry()?;
    info!(existing = existing.len(), "loaded previous registry generation");

    let reconciler = Reconciler::new(ReconcileConfig {
        max_removed: args.max_removed,
        limit: args.limit,
        ..ReconcileConfig::default()
    });

    // A safety-valve violation surfaces here, before anything is persisted.
    let outcome = reconciler.run(&feeds, &enrichers, existing).await?;

    let counts = registry.upsert_registry(&run_id, &outcome.assets)?;
    info!(
        run_id = %run_id,
        assets = counts.assets,
        new = counts.new,
        updated = counts.updated,
        removed = counts.removed,
        "registry persisted"
    );

    if let Some(snapshot) = &args.snapshot {
        let exported = registry.export_snapshot(snapshot)?;
        info!(path = %snapshot.display(), records = exported, "snapshot written");
    }

    if args.print {
        output::print_assets(&outcome.assets);
    }

    for (ticker, change) in &outcome.changes {
        info!(ticker = %ticker, reason = %change.reason(), "asset changed");
    }

    Ok(())
}
