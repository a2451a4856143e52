//! Equity/fund listing feed and descriptive-detail enricher for the
//! Polygon-style reference API.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::feed::{AssetEnricher, AssetFeed, EnrichReport, FeedError};
use crate::http_client::{HttpClient, HttpRequest};
use crate::throttling::{FeedPolicy, ThrottlingQueue};
use crate::{non_empty, Asset, AssetType, CalendarDate, FeedId, Ticker, UtcDateTime};

const POLYGON_BASE_URL: &str = "https://api.polygon.io";

/// Upstream type codes requested from the reference listing endpoint.
pub const DEFAULT_ASSET_TYPE_CODES: [&str; 4] = ["CS", "ETF", "ETN", "FUND"];

/// Supported upstream type codes and their registry classification.
pub fn supported_asset_types() -> Vec<(&'static str, AssetType)> {
    vec![
        ("CS", AssetType::CommonStock),
        ("ETF", AssetType::Etf),
        ("ETN", AssetType::Etn),
        ("FUND", AssetType::ClosedEndFund),
        ("ADRC", AssetType::DepositaryReceipt),
    ]
}

fn classify_type_code(code: &str) -> AssetType {
    match code {
        "CS" => AssetType::CommonStock,
        "ETF" => AssetType::Etf,
        "ETN" => AssetType::Etn,
        "FUND" => AssetType::ClosedEndFund,
        "ADRC" => AssetType::DepositaryReceipt,
        _ => AssetType::Unknown,
    }
}

/// Paginated listing feed.
pub struct PolygonFeed {
    http_client: Arc<dyn HttpClient>,
    token: String,
    throttle: ThrottlingQueue,
    asset_type_codes: Vec<String>,
    max_pages: usize,
}

impl PolygonFeed {
    pub fn new(http_client: Arc<dyn HttpClient>, token: impl Into<String>) -> Self {
        Self {
            http_client,
            token: token.into(),
            throttle: ThrottlingQueue::from_policy(&FeedPolicy::polygon_default()),
            asset_type_codes: DEFAULT_ASSET_TYPE_CODES
                .iter()
                .map(|code| (*code).to_owned())
                .collect(),
            max_pages: 25,
        }
    }

    pub fn with_asset_type_codes(mut self, codes: Vec<String>) -> Self {
        self.asset_type_codes = codes;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    async fn fetch_page(&self, url: &str) -> Result<PolygonTickersPage, FeedError> {
        // The key is appended after logging so it never reaches log output.
        let authenticated = format!("{url}&apiKey={}", self.token);
        let response = self
            .http_client
            .execute(HttpRequest::get(authenticated))
            .await
            .map_err(|error| FeedError::transport(error.message()))?;

        if !response.is_success() {
            return Err(FeedError::transport(format!(
                "listing endpoint returned status {}",
                response.status
            )));
        }

        let page: PolygonTickersPage = serde_json::from_str(&response.body)
            .map_err(|error| FeedError::decode(format!("listing page decode failed: {error}")))?;

        if page.status != "OK" {
            return Err(FeedError::invalid_response(format!(
                "listing endpoint status '{}'",
                page.status
            )));
        }

        Ok(page)
    }
}

impl AssetFeed for PolygonFeed {
    fn id(&self) -> FeedId {
        FeedId::Polygon
    }

    fn fetch<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Asset>, FeedError>> + Send + 'a>> {
        Box::pin(async move {
            let mut assets = Vec::new();

            for code in &self.asset_type_codes {
                let mut url = format!(
                    "{POLYGON_BASE_URL}/v3/reference/tickers?type={code}&market=stocks&active=true&sort=ticker&order=asc&limit=1000",
                );
                let mut pages = 0;

                loop {
                    if pages >= self.max_pages {
                        break;
                    }
                    pages += 1;

                    self.throttle.wait().await;
                    info!(type_code = %code, page = pages, "loading listing page");

                    let page = match self.fetch_page(&url).await {
                        Ok(page) => page,
                        Err(error) => {
                            warn!(type_code = %code, %error, "listing page failed; stopping pagination");
                            break;
                        }
                    };

                    for payload in page.results {
                        match normalize_listing(payload) {
                            Some(asset) => assets.push(asset),
                            None => continue,
                        }
                    }

                    match page.next_url {
                        Some(next) if !next.is_empty() => url = next,
                        _ => break,
                    }
                }
            }

            Ok(assets)
        })
    }
}

/// Fills listing date, corporate URL, description, and icon URL from the
/// per-ticker detail endpoint. Mutual funds have no detail record, and
/// details refreshed within the max age are skipped.
pub struct PolygonDetailEnricher {
    http_client: Arc<dyn HttpClient>,
    token: String,
    throttle: ThrottlingQueue,
    max_detail_age: Duration,
    limit: Option<usize>,
}

impl PolygonDetailEnricher {
    pub fn new(http_client: Arc<dyn HttpClient>, token: impl Into<String>) -> Self {
        Self {
            http_client,
            token: token.into(),
            throttle: ThrottlingQueue::from_policy(&FeedPolicy::polygon_default()),
            max_detail_age: Duration::from_secs(60 * 60 * 24 * 30),
            limit: None,
        }
    }

    pub fn with_max_detail_age(mut self, max_detail_age: Duration) -> Self {
        self.max_detail_age = max_detail_age;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    fn needs_detail(&self, asset: &Asset, now: UtcDateTime) -> bool {
        if asset.asset_type == AssetType::MutualFund || asset.is_delisted() {
            return false;
        }
        match asset.detail_refreshed_at {
            Some(refreshed) => {
                let age = now.unix_timestamp().saturating_sub(refreshed.unix_timestamp());
                age >= self.max_detail_age.as_secs() as i64
            }
            None => true,
        }
    }

    async fn fetch_detail(&self, ticker: &Ticker) -> Result<PolygonTickerDetail, FeedError> {
        let clean_url = format!(
            "{POLYGON_BASE_URL}/v3/reference/tickers/{}",
            urlencoding::encode(ticker.as_str())
        );
        let url = format!("{clean_url}?apiKey={}", self.token);

        let response = self
            .http_client
            .execute(HttpRequest::get(url))
            .await
            .map_err(|error| FeedError::transport(error.message()))?;

        if !response.is_success() {
            return Err(FeedError::transport(format!(
                "detail endpoint returned status {}",
                response.status
            )));
        }

        let detail: PolygonTickerDetailResponse = serde_json::from_str(&response.body)
            .map_err(|error| FeedError::decode(format!("detail decode failed: {error}")))?;

        if detail.status != "OK" {
            return Err(FeedError::invalid_response(format!(
                "detail endpoint status '{}'",
                detail.status
            )));
        }

        detail
            .results
            .ok_or_else(|| FeedError::invalid_response("detail endpoint returned no result"))
    }
}

impl AssetEnricher for PolygonDetailEnricher {
    fn id(&self) -> FeedId {
        FeedId::Polygon
    }

    fn enrich<'a>(
        &'a self,
        assets: &'a mut [Asset],
    ) -> Pin<Box<dyn Future<Output = Result<EnrichReport, FeedError>> + Send + 'a>> {
        Box::pin(async move {
            let now = UtcDateTime::now();
            let mut report = EnrichReport::default();

            for asset in assets.iter_mut() {
                if !self.needs_detail(asset, now) {
                    continue;
                }
                if let Some(limit) = self.limit {
                    if report.examined >= limit {
                        break;
                    }
                }
                report.examined += 1;

                self.throttle.wait().await;
                let detail = match self.fetch_detail(&asset.ticker).await {
                    Ok(detail) => detail,
                    Err(error) => {
                        warn!(ticker = %asset.ticker, %error, "detail fetch failed");
                        continue;
                    }
                };

                let mut filled = false;
                if let Some(date) = detail.list_date.as_deref().and_then(parse_feed_date) {
                    if asset.listing_date != Some(date) {
                        asset.listing_date = Some(date);
                        filled = true;
                    }
                }
                filled |= fill_text(&mut asset.corporate_url, detail.homepage_url);
                filled |= fill_text(&mut asset.description, detail.description);
                if let Some(branding) = detail.branding {
                    filled |= fill_text(&mut asset.icon_url, branding.icon_url);
                }

                asset.detail_refreshed_at = Some(now);
                if filled {
                    asset.last_updated = now;
                    report.enriched += 1;
                }
            }

            Ok(report)
        })
    }
}

fn normalize_listing(payload: PolygonTickerPayload) -> Option<Asset> {
    let ticker = match Ticker::parse(&payload.ticker) {
        Ok(ticker) => ticker,
        Err(error) => {
            warn!(ticker = %payload.ticker, %error, "skipping listing with invalid ticker");
            return None;
        }
    };

    let mut asset = Asset::new(ticker);
    asset.name = non_empty(payload.name);
    asset.primary_exchange = non_empty(payload.primary_exchange);
    asset.composite_figi = non_empty(payload.composite_figi);
    asset.share_class_figi = non_empty(payload.share_class_figi);
    asset.cik = non_empty(payload.cik);
    asset.asset_type = classify_type_code(&payload.kind);
    asset.source = Some(FeedId::Polygon);
    Some(asset)
}

fn fill_text(field: &mut Option<String>, incoming: Option<String>) -> bool {
    match incoming.and_then(non_empty) {
        Some(value) if field.as_deref() != Some(value.as_str()) => {
            *field = Some(value);
            true
        }
        _ => false,
    }
}

fn parse_feed_date(value: &str) -> Option<CalendarDate> {
    if value.is_empty() {
        return None;
    }
    match CalendarDate::parse(value) {
        Ok(date) => Some(date),
        Err(error) => {
            warn!(value, %error, "could not parse feed-reported date");
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct PolygonTickersPage {
    #[serde(default)]
    results: Vec<PolygonTickerPayload>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PolygonTickerPayload {
    #[serde(default)]
    ticker: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    primary_exchange: String,
    #[serde(default)]
    composite_figi: String,
    #[serde(default)]
    share_class_figi: String,
    #[serde(default)]
    cik: String,
    #[serde(default, rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct PolygonTickerDetailResponse {
    #[serde(default)]
    status: String,
    results: Option<PolygonTickerDetail>,
}

#[derive(Debug, Deserialize)]
struct PolygonTickerDetail {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    homepage_url: Option<String>,
    #[serde(default)]
    list_date: Option<String>,
    #[serde(default)]
    branding: Option<PolygonBranding>,
}

#[derive(Debug, Deserialize)]
struct PolygonBranding {
    #[serde(default)]
    icon_url: Option<String>,
}
