//! Mutual-fund/listing feed consuming the Tiingo-style supported-tickers
//! CSV dump.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::warn;

use crate::feed::{AssetFeed, FeedError};
use crate::http_client::{HttpClient, HttpRequest};
use crate::throttling::{FeedPolicy, ThrottlingQueue};
use crate::{non_empty, Asset, AssetType, CalendarDate, FeedId, Ticker};

const SUPPORTED_TICKERS_URL: &str =
    "https://apimedia.tiingo.com/docs/tiingo/daily/supported_tickers.csv";

const VALID_EXCHANGES: [&str; 7] = [
    "AMEX",
    "BATS",
    "NASDAQ",
    "NMFQS",
    "NYSE",
    "NYSE ARCA",
    "NYSE MKT",
];

/// End dates younger than this are treated as transient upstream noise and
/// cleared; real delistings stay absent from the feed for good.
const END_DATE_GRACE_DAYS: i32 = 7;

pub struct TiingoFeed {
    http_client: Arc<dyn HttpClient>,
    throttle: ThrottlingQueue,
    today: CalendarDate,
}

impl TiingoFeed {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            throttle: ThrottlingQueue::from_policy(&FeedPolicy::tiingo_default()),
            today: CalendarDate::today_utc(),
        }
    }

    pub fn with_today(mut self, today: CalendarDate) -> Self {
        self.today = today;
        self
    }
}

impl AssetFeed for TiingoFeed {
    fn id(&self) -> FeedId {
        FeedId::Tiingo
    }

    fn fetch<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Asset>, FeedError>> + Send + 'a>> {
        Box::pin(async move {
            self.throttle.wait().await;

            let response = self
                .http_client
                .execute(HttpRequest::get(SUPPORTED_TICKERS_URL))
                .await
                .map_err(|error| FeedError::transport(error.message()))?;

            if !response.is_success() {
                return Err(FeedError::transport(format!(
                    "supported-tickers download returned status {}",
                    response.status
                )));
            }

            parse_supported_tickers(&response.body, self.today)
        })
    }
}

/// Parse the supported-tickers CSV dump into registry records.
fn parse_supported_tickers(body: &str, today: CalendarDate) -> Result<Vec<Asset>, FeedError> {
    let mut lines = body.lines();
    let header = lines
        .next()
        .ok_or_else(|| FeedError::decode("supported-tickers document is empty"))?;
    let columns = TiingoColumns::from_header(header)?;

    let mut assets = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();
        let Some(row) = columns.row(&fields) else {
            warn!(line, "skipping malformed supported-tickers row");
            continue;
        };

        if !VALID_EXCHANGES.contains(&row.exchange) {
            continue;
        }
        // A row with neither lifecycle date carries no listing information.
        if row.start_date.is_empty() && row.end_date.is_empty() {
            continue;
        }
        if is_ignored_ticker(row.ticker) {
            continue;
        }

        let normalized = row.ticker.replace('-', "/");
        let ticker = match Ticker::parse(&normalized) {
            Ok(ticker) => ticker,
            Err(error) => {
                warn!(ticker = row.ticker, %error, "skipping row with invalid ticker");
                continue;
            }
        };

        let mut asset = Asset::new(ticker);
        asset.listing_date = parse_date_lenient(row.start_date);
        asset.delisting_date = parse_date_lenient(row.end_date);
        asset.primary_exchange = non_empty(row.exchange);
        asset.source = Some(FeedId::Tiingo);
        asset.asset_type = match row.asset_type {
            "Stock" => AssetType::CommonStock,
            "ETF" => AssetType::Etf,
            "Mutual Fund" => AssetType::MutualFund,
            _ => AssetType::Unknown,
        };

        if let Some(end) = asset.delisting_date {
            let age_days = today.into_inner().to_julian_day() - end.into_inner().to_julian_day();
            if age_days < END_DATE_GRACE_DAYS {
                asset.delisting_date = None;
            }
        }

        // Only still-listed records enter the run; the differ handles
        // disappearances.
        if asset.is_active() {
            assets.push(asset);
        }
    }

    Ok(assets)
}

struct TiingoColumns {
    ticker: usize,
    exchange: usize,
    asset_type: usize,
    start_date: usize,
    end_date: usize,
}

struct TiingoRow<'a> {
    ticker: &'a str,
    exchange: &'a str,
    asset_type: &'a str,
    start_date: &'a str,
    end_date: &'a str,
}

impl TiingoColumns {
    fn from_header(header: &str) -> Result<Self, FeedError> {
        let names: Vec<&str> = header.split(',').map(str::trim).collect();
        let find = |name: &str| {
            names
                .iter()
                .position(|column| *column == name)
                .ok_or_else(|| {
                    FeedError::decode(format!("supported-tickers header missing '{name}' column"))
                })
        };

        Ok(Self {
            ticker: find("ticker")?,
            exchange: find("exchange")?,
            asset_type: find("assetType")?,
            start_date: find("startDate")?,
            end_date: find("endDate")?,
        })
    }

    fn row<'a>(&self, fields: &[&'a str]) -> Option<TiingoRow<'a>> {
        Some(TiingoRow {
            ticker: fields.get(self.ticker)?.trim(),
            exchange: fields.get(self.exchange)?.trim(),
            asset_type: fields.get(self.asset_type)?.trim(),
            start_date: fields.get(self.start_date)?.trim(),
            end_date: fields.get(self.end_date)?.trim(),
        })
    }
}

/// Structural ticker rules: test issues, tickers with share-type suffixes
/// (warrants, preferreds, units), and anything containing whitespace.
fn is_ignored_ticker(ticker: &str) -> bool {
    if ticker.starts_with("ATEST") || ticker.starts_with("NTEST") || ticker.starts_with("PTEST") {
        return true;
    }
    if ticker.contains(' ') {
        return true;
    }
    // Alphanumeric root followed by a dashed suffix.
    if let Some(dash) = ticker.find('-') {
        if dash > 0 && ticker[..dash].chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return true;
        }
    }
    // Four-character root followed by a W/P/U share-type marker.
    let chars: Vec<char> = ticker.chars().collect();
    if chars.len() > 4
        && chars[..4].iter().all(|ch| ch.is_ascii_alphanumeric())
        && matches!(chars[4], 'W' | 'P' | 'U')
    {
        return true;
    }
    false
}

fn parse_date_lenient(value: &str) -> Option<CalendarDate> {
    if value.is_empty() {
        return None;
    }
    match CalendarDate::parse(value) {
        Ok(date) => Some(date),
        Err(error) => {
            warn!(value, %error, "could not parse supported-tickers date");
            None
        }
    }
}
