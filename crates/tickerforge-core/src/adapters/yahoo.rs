//! Descriptive-metadata enricher backed by the quote-summary endpoint.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::feed::{AssetEnricher, EnrichReport, FeedError};
use crate::http_client::{HttpClient, HttpRequest};
use crate::throttling::{FeedPolicy, ThrottlingQueue};
use crate::{non_empty, Asset, AssetType, FeedId, Ticker, UtcDateTime};

const QUOTE_SUMMARY_BASE: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary";
const QUOTE_SUMMARY_MODULES: &str = "assetProfile%2CfundProfile%2Cprice%2CesgScores";

pub struct YahooEnricher {
    http_client: Arc<dyn HttpClient>,
    throttle: ThrottlingQueue,
    limit: Option<usize>,
}

impl YahooEnricher {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            throttle: ThrottlingQueue::from_policy(&FeedPolicy::yahoo_default()),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    async fn fetch_summary(&self, ticker: &Ticker) -> Result<QuoteSummary, FeedError> {
        let url = format!(
            "{QUOTE_SUMMARY_BASE}/{}?modules={QUOTE_SUMMARY_MODULES}&ssl=true",
            urlencoding::encode(ticker.as_str())
        );

        let response = self
            .http_client
            .execute(HttpRequest::get(url))
            .await
            .map_err(|error| FeedError::transport(error.message()))?;

        if !response.is_success() {
            return Err(FeedError::transport(format!(
                "quote-summary endpoint returned status {}",
                response.status
            )));
        }

        let wrapper: QuoteSummaryEnvelope = serde_json::from_str(&response.body)
            .map_err(|error| FeedError::decode(format!("quote-summary decode failed: {error}")))?;

        wrapper
            .quote_summary
            .and_then(|summary| summary.result.into_iter().next())
            .ok_or_else(|| FeedError::invalid_response("quote-summary returned no result"))
    }
}

/// Records worth a metadata call: common stock missing industry, sector,
/// or description; mutual funds missing a name; ETFs missing a
/// description. Everything else already has what this source can offer.
fn needs_metadata(asset: &Asset) -> bool {
    if asset.is_delisted() {
        return false;
    }
    match asset.asset_type {
        AssetType::CommonStock => {
            asset.industry.is_none() || asset.sector.is_none() || asset.description.is_none()
        }
        AssetType::MutualFund => asset.name.is_none(),
        AssetType::Etf => asset.description.is_none(),
        _ => false,
    }
}

impl AssetEnricher for YahooEnricher {
    fn id(&self) -> FeedId {
        FeedId::Yahoo
    }

    fn enrich<'a>(
        &'a self,
        assets: &'a mut [Asset],
    ) -> Pin<Box<dyn Future<Output = Result<EnrichReport, FeedError>> + Send + 'a>> {
        Box::pin(async move {
            let mut report = EnrichReport::default();

            for asset in assets.iter_mut() {
                if !needs_metadata(asset) {
                    continue;
                }
                if let Some(limit) = self.limit {
                    if report.examined >= limit {
                        break;
                    }
                }
                report.examined += 1;

                self.throttle.wait().await;
                let summary = match self.fetch_summary(&asset.ticker).await {
                    Ok(summary) => summary,
                    Err(error) => {
                        warn!(ticker = %asset.ticker, %error, "quote-summary fetch failed");
                        continue;
                    }
                };

                if apply_summary(asset, summary) {
                    asset.last_updated = UtcDateTime::now();
                    report.enriched += 1;
                }
            }

            Ok(report)
        })
    }
}

fn apply_summary(asset: &mut Asset, summary: QuoteSummary) -> bool {
    let mut filled = false;

    if let Some(profile) = summary.asset_profile {
        if asset.headquarters.is_none() {
            if let Some(headquarters) = format_headquarters(&profile) {
                asset.headquarters = Some(headquarters);
                filled = true;
            }
        }
        filled |= fill_differing(&mut asset.description, profile.summary);
        filled |= fill_differing(&mut asset.industry, profile.industry);
        filled |= fill_differing(&mut asset.sector, profile.sector);
        filled |= fill_differing(&mut asset.corporate_url, profile.website);
    }

    if asset.name.is_none() {
        if let Some(name) = summary.price.and_then(|price| price.long_name).and_then(non_empty) {
            asset.name = Some(name);
            filled = true;
        }
    }

    // Funds without a business summary fall back to the peer-group label.
    if asset.description.is_none() {
        if let Some(peer_group) = summary
            .esg_scores
            .and_then(|esg| esg.peer_group)
            .and_then(non_empty)
        {
            asset.description = Some(peer_group);
            filled = true;
        }
    }

    filled
}

fn fill_differing(field: &mut Option<String>, incoming: Option<String>) -> bool {
    match incoming.and_then(non_empty) {
        Some(value) if field.as_deref() != Some(value.as_str()) => {
            *field = Some(value);
            true
        }
        _ => false,
    }
}

fn format_headquarters(profile: &AssetProfile) -> Option<String> {
    let city = profile.city.as_deref().and_then(|city| non_empty(city))?;
    match profile.state.as_deref().and_then(|state| non_empty(state)) {
        Some(state) => Some(format!("{city}, {state}")),
        None => Some(city),
    }
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: Option<QuoteSummaryWrapper>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryWrapper {
    #[serde(default)]
    result: Vec<QuoteSummary>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    #[serde(rename = "assetProfile")]
    asset_profile: Option<AssetProfile>,
    price: Option<PriceBlock>,
    #[serde(rename = "esgScores")]
    esg_scores: Option<EsgBlock>,
}

#[derive(Debug, Deserialize)]
struct AssetProfile {
    #[serde(rename = "longBusinessSummary")]
    summary: Option<String>,
    industry: Option<String>,
    sector: Option<String>,
    website: Option<String>,
    city: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceBlock {
    #[serde(rename = "longName")]
    long_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EsgBlock {
    #[serde(rename = "peerGroup")]
    peer_group: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, HttpResponse};
    use std::sync::Mutex;

    struct CannedHttpClient {
        responses: Mutex<Vec<Result<HttpResponse, HttpError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl CannedHttpClient {
        fn new(responses: Vec<Result<HttpResponse, HttpError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().expect("request store").clone()
        }
    }

    impl HttpClient for CannedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests.lock().expect("request store").push(request);
            let mut responses = self.responses.lock().expect("response store");
            let response = if responses.is_empty() {
                Ok(HttpResponse::ok_json(r#"{"quoteSummary":{"result":[]}}"#))
            } else {
                responses.remove(0)
            };
            Box::pin(async move { response })
        }
    }

    const SUMMARY_RESPONSE: &str = r#"{
        "quoteSummary": {
            "result": [
                {
                    "assetProfile": {
                        "longBusinessSummary": "Designs consumer electronics.",
                        "industry": "Consumer Electronics",
                        "sector": "Technology",
                        "website": "https://www.apple.com",
                        "city": "Cupertino",
                        "state": "CA"
                    },
                    "price": {"longName": "Apple Inc."},
                    "esgScores": {"peerGroup": "Technology Hardware"}
                }
            ]
        }
    }"#;

    fn stock_missing_metadata(ticker: &str) -> Asset {
        let mut asset = Asset::new(Ticker::parse(ticker).expect("valid ticker"));
        asset.asset_type = AssetType::CommonStock;
        asset
    }

    #[tokio::test]
    async fn fills_profile_fields_for_common_stock() {
        let client = Arc::new(CannedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            SUMMARY_RESPONSE,
        ))]));
        let enricher = YahooEnricher::new(client.clone());

        let mut assets = vec![stock_missing_metadata("AAPL")];
        let report = enricher.enrich(&mut assets).await.expect("enrich succeeds");

        assert_eq!(report.enriched, 1);
        let asset = &assets[0];
        assert_eq!(asset.industry.as_deref(), Some("Consumer Electronics"));
        assert_eq!(asset.sector.as_deref(), Some("Technology"));
        assert_eq!(asset.name.as_deref(), Some("Apple Inc."));
        assert_eq!(asset.headquarters.as_deref(), Some("Cupertino, CA"));
        assert_eq!(asset.corporate_url.as_deref(), Some("https://www.apple.com"));

        let requests = client.recorded_requests();
        assert!(requests[0].url.contains("/quoteSummary/AAPL?"));
    }

    #[tokio::test]
    async fn fund_description_falls_back_to_peer_group() {
        let response = r#"{
            "quoteSummary": {
                "result": [
                    {
                        "price": {"longName": "Vanguard Total Stock Market Index Fund"},
                        "esgScores": {"peerGroup": "US Equity Large Cap Blend"}
                    }
                ]
            }
        }"#;
        let client = Arc::new(CannedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            response,
        ))]));
        let enricher = YahooEnricher::new(client);

        let mut fund = Asset::new(Ticker::parse("VTSAX").expect("valid ticker"));
        fund.asset_type = AssetType::MutualFund;
        let mut assets = vec![fund];

        enricher.enrich(&mut assets).await.expect("enrich succeeds");

        assert_eq!(
            assets[0].name.as_deref(),
            Some("Vanguard Total Stock Market Index Fund")
        );
        assert_eq!(
            assets[0].description.as_deref(),
            Some("US Equity Large Cap Blend")
        );
    }

    #[tokio::test]
    async fn complete_records_are_not_queried() {
        let client = Arc::new(CannedHttpClient::new(Vec::new()));
        let enricher = YahooEnricher::new(client.clone());

        let mut complete = stock_missing_metadata("AAPL");
        complete.industry = Some(String::from("Consumer Electronics"));
        complete.sector = Some(String::from("Technology"));
        complete.description = Some(String::from("Designs consumer electronics."));

        let mut assets = vec![complete];
        let report = enricher.enrich(&mut assets).await.expect("enrich succeeds");

        assert_eq!(report.examined, 0);
        assert!(client.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn limit_caps_lookup_count() {
        let client = Arc::new(CannedHttpClient::new(Vec::new()));
        let enricher = YahooEnricher::new(client.clone()).with_limit(Some(1));

        let mut assets = vec![
            stock_missing_metadata("AAA"),
            stock_missing_metadata("BBB"),
            stock_missing_metadata("CCC"),
        ];
        let report = enricher.enrich(&mut assets).await.expect("enrich succeeds");

        assert_eq!(report.examined, 1);
        assert_eq!(client.recorded_requests().len(), 1);
    }
}
