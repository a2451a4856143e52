//! Behavior-driven tests for the reconciliation pipeline.
//!
//! These tests drive whole runs through stub feeds and enrichers and
//! assert on user-visible outcomes: which records survive, which flags
//! they carry, and when a run refuses to persist.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tickerforge_core::{
    Asset, AssetEnricher, AssetFeed, AssetType, CalendarDate, EnrichReport, FeedError, FeedId,
    ReconcileConfig, Reconciler, Ticker,
};

struct StubFeed {
    id: FeedId,
    assets: Vec<Asset>,
}

impl StubFeed {
    fn new(id: FeedId, assets: Vec<Asset>) -> Arc<Self> {
        Arc::new(Self { id, assets })
    }
}

impl AssetFeed for StubFeed {
    fn id(&self) -> FeedId {
        self.id
    }

    fn fetch<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Asset>, FeedError>> + Send + 'a>> {
        let assets = self.assets.clone();
        Box::pin(async move { Ok(assets) })
    }
}

struct FailingFeed;

impl AssetFeed for FailingFeed {
    fn id(&self) -> FeedId {
        FeedId::Polygon
    }

    fn fetch<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Asset>, FeedError>> + Send + 'a>> {
        Box::pin(async move { Err(FeedError::transport("upstream unreachable")) })
    }
}

/// Assigns a synthetic composite identifier to records missing one, the
/// way the mapping service would.
struct StubMapper;

impl AssetEnricher for StubMapper {
    fn id(&self) -> FeedId {
        FeedId::OpenFigi
    }

    fn enrich<'a>(
        &'a self,
        assets: &'a mut [Asset],
    ) -> Pin<Box<dyn Future<Output = Result<EnrichReport, FeedError>> + Send + 'a>> {
        Box::pin(async move {
            let mut report = EnrichReport::default();
            for asset in assets.iter_mut() {
                if asset.composite_figi.is_none() {
                    report.examined += 1;
                    asset.composite_figi = Some(format!("BBG-{}", asset.ticker));
                    report.enriched += 1;
                }
            }
            Ok(report)
        })
    }
}

fn stock(ticker: &str, figi: &str) -> Asset {
    let mut asset = Asset::new(Ticker::parse(ticker).expect("valid ticker"));
    asset.asset_type = AssetType::CommonStock;
    asset.composite_figi = Some(figi.to_owned());
    asset.source = Some(FeedId::Polygon);
    asset
}

fn fund(ticker: &str, figi: &str) -> Asset {
    let mut asset = Asset::new(Ticker::parse(ticker).expect("valid ticker"));
    asset.asset_type = AssetType::MutualFund;
    asset.composite_figi = Some(figi.to_owned());
    asset.source = Some(FeedId::Tiingo);
    asset
}

fn config(max_removed: usize) -> ReconcileConfig {
    ReconcileConfig {
        max_removed,
        limit: None,
        today: CalendarDate::parse("2024-06-03").expect("valid date"),
    }
}

fn find<'a>(assets: &'a [Asset], ticker: &str) -> &'a Asset {
    assets
        .iter()
        .find(|asset| asset.ticker.as_str() == ticker)
        .unwrap_or_else(|| panic!("expected '{ticker}' in output"))
}

#[tokio::test]
async fn when_feeds_overlap_their_records_merge_into_one_per_ticker() {
    let mut listing = stock("AAPL", "BBG000B9XRY4");
    listing.name = Some(String::from("Apple Inc."));
    let mut fund_row = Asset::new(Ticker::parse("AAPL").expect("valid ticker"));
    fund_row.primary_exchange = Some(String::from("NASDAQ"));
    fund_row.source = Some(FeedId::Polygon);

    let feeds: Vec<Arc<dyn AssetFeed>> = vec![
        StubFeed::new(FeedId::Polygon, vec![listing, stock("MSFT", "BBG000BPH459")]),
        StubFeed::new(FeedId::Tiingo, vec![fund_row, fund("VTSAX", "BBG001JD2V47")]),
    ];

    let reconciler = Reconciler::new(config(25));
    let outcome = reconciler
        .run(&feeds, &[], Vec::new())
        .await
        .expect("run should commit");

    assert_eq!(outcome.assets.len(), 3);
    let apple = find(&outcome.assets, "AAPL");
    assert_eq!(apple.name.as_deref(), Some("Apple Inc."));
    assert_eq!(apple.primary_exchange.as_deref(), Some("NASDAQ"));
    assert!(apple.is_new);
}

#[tokio::test]
async fn when_a_known_ticker_disappears_it_is_delisted_not_dropped() {
    let feeds: Vec<Arc<dyn AssetFeed>> = vec![StubFeed::new(
        FeedId::Polygon,
        vec![stock("AAPL", "BBG000B9XRY4")],
    )];

    let existing = vec![stock("AAPL", "BBG000B9XRY4"), stock("GE", "BBG000BK6MB5")];

    let reconciler = Reconciler::new(config(25));
    let outcome = reconciler
        .run(&feeds, &[], existing)
        .await
        .expect("run should commit");

    assert_eq!(outcome.assets.len(), 2);
    assert_eq!(outcome.inferred_delistings, 1);
    let vanished = find(&outcome.assets, "GE");
    assert_eq!(
        vanished.delisting_date,
        Some(CalendarDate::parse("2024-06-03").expect("valid date"))
    );
    assert!(vanished
        .update_reasons
        .iter()
        .any(|reason| reason == "asset delisted"));
}

#[tokio::test]
async fn when_removals_exceed_the_limit_the_run_aborts() {
    let feeds: Vec<Arc<dyn AssetFeed>> = vec![StubFeed::new(FeedId::Polygon, Vec::new())];

    let existing: Vec<Asset> = (0..26)
        .map(|index| stock(&format!("T{index}"), &format!("BBG-{index}")))
        .collect();

    let reconciler = Reconciler::new(config(25));
    let violation = reconciler
        .run(&feeds, &[], existing)
        .await
        .expect_err("26 inferred delistings must abort");

    assert_eq!(violation.removed, 26);
    assert_eq!(violation.limit, 25);
}

#[tokio::test]
async fn when_removals_match_the_limit_exactly_the_run_commits() {
    let feeds: Vec<Arc<dyn AssetFeed>> = vec![StubFeed::new(FeedId::Polygon, Vec::new())];

    let existing: Vec<Asset> = (0..25)
        .map(|index| stock(&format!("T{index}"), &format!("BBG-{index}")))
        .collect();

    let reconciler = Reconciler::new(config(25));
    let outcome = reconciler
        .run(&feeds, &[], existing)
        .await
        .expect("25 removals are within the limit");

    assert_eq!(outcome.removed_count, 25);
    assert_eq!(outcome.assets.len(), 25);
}

#[tokio::test]
async fn when_a_feed_fails_the_rest_of_the_run_continues() {
    let feeds: Vec<Arc<dyn AssetFeed>> = vec![
        Arc::new(FailingFeed),
        StubFeed::new(FeedId::Tiingo, vec![fund("VTSAX", "BBG001JD2V47")]),
    ];

    let reconciler = Reconciler::new(config(25));
    let outcome = reconciler
        .run(&feeds, &[], Vec::new())
        .await
        .expect("run should commit");

    assert_eq!(outcome.assets.len(), 1);
    assert_eq!(find(&outcome.assets, "VTSAX").source, Some(FeedId::Tiingo));
}

#[tokio::test]
async fn when_enrichment_assigns_identifiers_unidentified_records_survive_cleaning() {
    let mut bare = Asset::new(Ticker::parse("NEWCO").expect("valid ticker"));
    bare.asset_type = AssetType::CommonStock;
    bare.source = Some(FeedId::Polygon);

    let feeds: Vec<Arc<dyn AssetFeed>> = vec![StubFeed::new(FeedId::Polygon, vec![bare])];
    let enrichers: Vec<Arc<dyn AssetEnricher>> = vec![Arc::new(StubMapper)];

    let reconciler = Reconciler::new(config(25));
    let outcome = reconciler
        .run(&feeds, &enrichers, Vec::new())
        .await
        .expect("run should commit");

    assert_eq!(outcome.assets.len(), 1);
    assert_eq!(
        find(&outcome.assets, "NEWCO").composite_figi.as_deref(),
        Some("BBG-NEWCO")
    );
}

#[tokio::test]
async fn when_records_lack_identifier_or_class_they_are_cleaned_out() {
    let mut no_figi = Asset::new(Ticker::parse("NOFIGI").expect("valid ticker"));
    no_figi.asset_type = AssetType::CommonStock;
    let mut no_class = Asset::new(Ticker::parse("NOCLS").expect("valid ticker"));
    no_class.composite_figi = Some(String::from("BBG-NOCLS"));

    let feeds: Vec<Arc<dyn AssetFeed>> = vec![StubFeed::new(
        FeedId::Polygon,
        vec![no_figi, no_class, stock("AAPL", "BBG000B9XRY4")],
    )];

    let reconciler = Reconciler::new(config(25));
    let outcome = reconciler
        .run(&feeds, &[], Vec::new())
        .await
        .expect("run should commit");

    assert_eq!(outcome.assets.len(), 1);
    assert_eq!(outcome.assets[0].ticker.as_str(), "AAPL");
}

#[tokio::test]
async fn when_two_tickers_share_an_identifier_one_survivor_remains() {
    let common = stock("PBR", "BBG000BF4R45");
    let mut duplicate = fund("PBR/A", "BBG000BF4R45");
    duplicate.asset_type = AssetType::ClosedEndFund;

    let feeds: Vec<Arc<dyn AssetFeed>> =
        vec![StubFeed::new(FeedId::Polygon, vec![duplicate, common])];

    let reconciler = Reconciler::new(config(25));
    let outcome = reconciler
        .run(&feeds, &[], Vec::new())
        .await
        .expect("run should commit");

    assert_eq!(outcome.assets.len(), 1);
    assert_eq!(outcome.assets[0].ticker.as_str(), "PBR");
    assert_eq!(outcome.dedup_decisions.len(), 1);
    assert_eq!(outcome.dedup_decisions[0].discarded.len(), 1);
}

#[tokio::test]
async fn when_the_same_generation_runs_twice_nothing_changes() {
    let generation = vec![stock("AAPL", "BBG000B9XRY4"), fund("VTSAX", "BBG001JD2V47")];
    let feeds: Vec<Arc<dyn AssetFeed>> =
        vec![StubFeed::new(FeedId::Polygon, generation.clone())];

    let reconciler = Reconciler::new(config(25));
    let outcome = reconciler
        .run(&feeds, &[], generation)
        .await
        .expect("run should commit");

    assert_eq!(outcome.assets.len(), 2);
    assert_eq!(outcome.new_count, 0);
    assert_eq!(outcome.inferred_delistings, 0);
    assert!(outcome.changes.is_empty());
    assert!(outcome.assets.iter().all(|asset| !asset.updated));
}

#[tokio::test]
async fn when_mixed_case_tickers_arrive_they_never_reach_the_registry() {
    let mut lower = stock("AAPL", "BBG000B9XRY4");
    lower.ticker = Ticker::parse("aapl").expect("valid ticker");

    let feeds: Vec<Arc<dyn AssetFeed>> =
        vec![StubFeed::new(FeedId::Polygon, vec![lower, stock("MSFT", "BBG000BPH459")])];

    let reconciler = Reconciler::new(config(25));
    let outcome = reconciler
        .run(&feeds, &[], Vec::new())
        .await
        .expect("run should commit");

    assert_eq!(outcome.assets.len(), 1);
    assert_eq!(outcome.assets[0].ticker.as_str(), "MSFT");
}
