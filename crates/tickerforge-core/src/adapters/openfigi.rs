//! Cross-source identifier mapping enricher for the OpenFIGI-style
//! batch mapping API.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::feed::{AssetEnricher, EnrichReport, FeedError};
use crate::http_client::{HttpClient, HttpRequest};
use crate::throttling::{FeedPolicy, ThrottlingQueue};
use crate::{non_empty, Asset, AssetType, FeedId, UtcDateTime};

const MAPPING_URL: &str = "https://api.openfigi.com/v3/mapping";

/// The mapping API caps one request at 100 identifiers.
const MAX_BATCH: usize = 100;

pub struct OpenFigiEnricher {
    http_client: Arc<dyn HttpClient>,
    api_key: Option<String>,
    throttle: ThrottlingQueue,
}

impl OpenFigiEnricher {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: Option<String>) -> Self {
        Self {
            http_client,
            api_key,
            throttle: ThrottlingQueue::from_policy(&FeedPolicy::openfigi_default()),
        }
    }

    async fn map_batch(
        &self,
        queries: &[MappingQuery],
    ) -> Result<HashMap<String, MappedInstrument>, FeedError> {
        let body = serde_json::to_string(queries)
            .map_err(|error| FeedError::decode(format!("mapping query encode failed: {error}")))?;

        let mut request = HttpRequest::post(MAPPING_URL).with_json_body(body);
        if let Some(api_key) = &self.api_key {
            request = request.with_header("X-OPENFIGI-APIKEY", api_key.clone());
        }

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| FeedError::transport(error.message()))?;

        if !response.is_success() {
            return Err(FeedError::transport(format!(
                "mapping endpoint returned status {}",
                response.status
            )));
        }

        let results: Vec<MappingResult> = serde_json::from_str(&response.body)
            .map_err(|error| FeedError::decode(format!("mapping decode failed: {error}")))?;

        let mut by_ticker = HashMap::new();
        for result in results {
            for instrument in result.data {
                by_ticker.insert(instrument.ticker.clone(), instrument);
            }
        }
        Ok(by_ticker)
    }
}

impl AssetEnricher for OpenFigiEnricher {
    fn id(&self) -> FeedId {
        FeedId::OpenFigi
    }

    fn enrich<'a>(
        &'a self,
        assets: &'a mut [Asset],
    ) -> Pin<Box<dyn Future<Output = Result<EnrichReport, FeedError>> + Send + 'a>> {
        Box::pin(async move {
            let mut report = EnrichReport::default();

            // Only active records still missing an identifier or a
            // classification are worth a mapping call.
            let candidates: Vec<usize> = assets
                .iter()
                .enumerate()
                .filter(|(_, asset)| {
                    asset.is_active()
                        && (asset.composite_figi.is_none() || asset.asset_type.is_unknown())
                })
                .map(|(index, _)| index)
                .collect();
            report.examined = candidates.len();

            for chunk in candidates.chunks(MAX_BATCH) {
                let queries: Vec<MappingQuery> = chunk
                    .iter()
                    .map(|&index| MappingQuery::for_ticker(assets[index].ticker.as_str()))
                    .collect();

                self.throttle.wait().await;
                let mapped = match self.map_batch(&queries).await {
                    Ok(mapped) => mapped,
                    Err(error) => {
                        warn!(%error, batch = chunk.len(), "mapping batch failed");
                        continue;
                    }
                };

                for &index in chunk {
                    let asset = &mut assets[index];
                    let Some(instrument) = mapped.get(asset.ticker.as_str()) else {
                        continue;
                    };

                    let mut filled = false;
                    if let Some(figi) = non_empty(instrument.composite_figi.clone()) {
                        if asset.composite_figi.as_deref() != Some(figi.as_str()) {
                            asset.composite_figi = Some(figi);
                            filled = true;
                        }
                    }
                    if let Some(figi) = non_empty(instrument.share_class_figi.clone()) {
                        if asset.share_class_figi.as_deref() != Some(figi.as_str()) {
                            asset.share_class_figi = Some(figi);
                            filled = true;
                        }
                    }

                    if asset.asset_type.is_unknown() {
                        if let Some(classified) = classify_security(asset, instrument) {
                            asset.asset_type = classified;
                            filled = true;
                        }
                    }

                    if filled {
                        asset.last_updated = UtcDateTime::now();
                        report.enriched += 1;
                    }
                }
            }

            Ok(report)
        })
    }
}

/// Map the two-level security-type taxonomy onto the registry
/// classification. An unrecognized sub-type under a fund-like parent is a
/// logged anomaly that leaves the type unset rather than guessing a class.
fn classify_security(asset: &Asset, instrument: &MappedInstrument) -> Option<AssetType> {
    match instrument.security_type2.as_str() {
        "Common Stock" | "Partnership Shares" => Some(AssetType::CommonStock),
        "Depositary Receipt" => Some(AssetType::DepositaryReceipt),
        "Mutual Fund" => match instrument.security_type.as_str() {
            "ETP" => Some(AssetType::Etf),
            "Open-End Fund" => Some(AssetType::MutualFund),
            "Closed-End Fund" => Some(AssetType::ClosedEndFund),
            other => {
                warn!(
                    ticker = %asset.ticker,
                    security_type = other,
                    security_type2 = %instrument.security_type2,
                    composite_figi = %instrument.composite_figi,
                    "unrecognized fund sub-type; leaving asset type unset"
                );
                None
            }
        },
        "" => None,
        other => {
            warn!(
                ticker = %asset.ticker,
                security_type = %instrument.security_type,
                security_type2 = other,
                composite_figi = %instrument.composite_figi,
                "unrecognized security type; leaving asset type unset"
            );
            None
        }
    }
}

#[derive(Debug, Serialize)]
struct MappingQuery {
    #[serde(rename = "idType")]
    id_type: &'static str,
    #[serde(rename = "idValue")]
    id_value: String,
    #[serde(rename = "exchCode")]
    exchange_code: &'static str,
}

impl MappingQuery {
    fn for_ticker(ticker: &str) -> Self {
        Self {
            id_type: "TICKER",
            id_value: ticker.to_owned(),
            exchange_code: "US",
        }
    }
}

#[derive(Debug, Deserialize)]
struct MappingResult {
    #[serde(default)]
    data: Vec<MappedInstrument>,
}

#[derive(Debug, Deserialize)]
struct MappedInstrument {
    #[serde(default)]
    ticker: String,
    #[serde(default, rename = "compositeFIGI")]
    composite_figi: String,
    #[serde(default, rename = "shareClassFIGI")]
    share_class_figi: String,
    #[serde(default, rename = "securityType")]
    security_type: String,
    #[serde(default, rename = "securityType2")]
    security_type2: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, HttpResponse};
    use crate::Ticker;
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
                Ok(HttpResponse::ok_json("[]"))
            } else {
                responses.remove(0)
            };
            Box::pin(async move { response })
        }
    }

    fn unclassified(ticker: &str) -> Asset {
        Asset::new(Ticker::parse(ticker).expect("valid ticker"))
    }

    const MAPPING_RESPONSE: &str = r#"[
        {
            "data": [
                {
                    "ticker": "AAPL",
                    "compositeFIGI": "BBG000B9XRY4",
                    "shareClassFIGI": "BBG001S5N8V8",
                    "securityType": "Common Stock",
                    "securityType2": "Common Stock"
                },
                {
                    "ticker": "PDI",
                    "compositeFIGI": "BBG002N1KRC9",
                    "shareClassFIGI": "",
                    "securityType": "Closed-End Fund",
                    "securityType2": "Mutual Fund"
                }
            ]
        }
    ]"#;

    #[tokio::test]
    async fn fills_identifiers_and_classifies_fund_sub_types() {
        let client = Arc::new(CannedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            MAPPING_RESPONSE,
        ))]));
        let enricher = OpenFigiEnricher::new(client.clone(), Some(String::from("figi-key")));

        let mut assets = vec![unclassified("AAPL"), unclassified("PDI")];
        let report = enricher.enrich(&mut assets).await.expect("enrich succeeds");

        assert_eq!(report.examined, 2);
        assert_eq!(report.enriched, 2);
        assert_eq!(assets[0].composite_figi.as_deref(), Some("BBG000B9XRY4"));
        assert_eq!(assets[0].asset_type, AssetType::CommonStock);
        assert_eq!(assets[1].asset_type, AssetType::ClosedEndFund);
        assert_eq!(assets[1].share_class_figi, None);

        let requests = client.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].headers.get("x-openfigi-apikey").map(String::as_str),
            Some("figi-key")
        );
        let body = requests[0].body.as_deref().expect("query body present");
        assert!(body.contains(r#""idValue":"AAPL""#));
        assert!(body.contains(r#""exchCode":"US""#));
    }

    #[tokio::test]
    async fn unrecognized_fund_sub_type_leaves_type_unset() {
        let response = r#"[
            {
                "data": [
                    {
                        "ticker": "ODD",
                        "compositeFIGI": "BBG00ODD0001",
                        "shareClassFIGI": "",
                        "securityType": "Unit Investment Trust",
                        "securityType2": "Mutual Fund"
                    }
                ]
            }
        ]"#;
        let client = Arc::new(CannedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            response,
        ))]));
        let enricher = OpenFigiEnricher::new(client, None);

        let mut assets = vec![unclassified("ODD")];
        enricher.enrich(&mut assets).await.expect("enrich succeeds");

        // The identifier is still taken, but the class stays unknown so the
        // cleaning filter can drop the record instead of persisting a guess.
        assert_eq!(assets[0].composite_figi.as_deref(), Some("BBG00ODD0001"));
        assert_eq!(assets[0].asset_type, AssetType::Unknown);
    }

    #[tokio::test]
    async fn classified_records_with_identifiers_are_not_queried() {
        let client = Arc::new(CannedHttpClient::new(Vec::new()));
        let enricher = OpenFigiEnricher::new(client.clone(), None);

        let mut complete = unclassified("SPY");
        complete.composite_figi = Some(String::from("BBG000BDTBL9"));
        complete.asset_type = AssetType::Etf;

        let mut assets = vec![complete];
        let report = enricher.enrich(&mut assets).await.expect("enrich succeeds");

        assert_eq!(report.examined, 0);
        assert!(client.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn delisted_records_are_not_queried() {
        let client = Arc::new(CannedHttpClient::new(Vec::new()));
        let enricher = OpenFigiEnricher::new(client.clone(), None);

        let mut retired = unclassified("ENRN");
        retired.delisting_date =
            Some(crate::CalendarDate::parse("2001-12-02").expect("valid date"));

        let mut assets = vec![retired];
        let report = enricher.enrich(&mut assets).await.expect("enrich succeeds");

        assert_eq!(report.examined, 0);
        assert!(client.recorded_requests().is_empty());
    }
}
