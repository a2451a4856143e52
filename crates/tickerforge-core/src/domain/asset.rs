use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CalendarDate, Ticker, UtcDateTime, ValidationError};

/// Canonical instrument classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    CommonStock,
    Etf,
    Etn,
    ClosedEndFund,
    MutualFund,
    DepositaryReceipt,
    #[default]
    Unknown,
}

impl AssetType {
    pub const ALL: [Self; 7] = [
        Self::CommonStock,
        Self::Etf,
        Self::Etn,
        Self::ClosedEndFund,
        Self::MutualFund,
        Self::DepositaryReceipt,
        Self::Unknown,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CommonStock => "Common Stock",
            Self::Etf => "Exchange Traded Fund",
            Self::Etn => "Exchange Traded Note",
            Self::ClosedEndFund => "Closed-End Fund",
            Self::MutualFund => "Mutual Fund",
            Self::DepositaryReceipt => "Depositary Receipt",
            Self::Unknown => "Unknown",
        }
    }

    pub const fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl Display for AssetType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Common Stock" => Ok(Self::CommonStock),
            "Exchange Traded Fund" => Ok(Self::Etf),
            "Exchange Traded Note" => Ok(Self::Etn),
            "Closed-End Fund" => Ok(Self::ClosedEndFund),
            "Mutual Fund" => Ok(Self::MutualFund),
            "Depositary Receipt" => Ok(Self::DepositaryReceipt),
            "Unknown" => Ok(Self::Unknown),
            other => Err(ValidationError::InvalidAssetType {
                value: other.to_owned(),
            }),
        }
    }
}

/// Canonical upstream feed identifiers used for provenance tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedId {
    Polygon,
    Tiingo,
    OpenFigi,
    Yahoo,
}

impl FeedId {
    pub const ALL: [Self; 4] = [Self::Polygon, Self::Tiingo, Self::OpenFigi, Self::Yahoo];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Polygon => "polygon",
            Self::Tiingo => "tiingo",
            Self::OpenFigi => "openfigi",
            Self::Yahoo => "yahoo",
        }
    }
}

impl Display for FeedId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "polygon" => Ok(Self::Polygon),
            "tiingo" => Ok(Self::Tiingo),
            "openfigi" => Ok(Self::OpenFigi),
            "yahoo" => Ok(Self::Yahoo),
            other => Err(ValidationError::InvalidFeed {
                value: other.to_owned(),
            }),
        }
    }
}

/// One registry record for a tradeable instrument.
///
/// Identity is the ticker (source-local) plus the composite FIGI once an
/// enrichment pass has assigned one. `None` in any optional field means the
/// value is not yet known; merges only ever replace `None` or a differing
/// populated value, never erase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub ticker: Ticker,
    pub name: Option<String>,
    pub description: Option<String>,
    pub primary_exchange: Option<String>,
    #[serde(default)]
    pub asset_type: AssetType,
    pub composite_figi: Option<String>,
    pub share_class_figi: Option<String>,
    pub cusip: Option<String>,
    pub isin: Option<String>,
    pub cik: Option<String>,
    pub listing_date: Option<CalendarDate>,
    pub delisting_date: Option<CalendarDate>,
    pub industry: Option<String>,
    pub sector: Option<String>,
    pub icon_url: Option<String>,
    pub corporate_url: Option<String>,
    pub headquarters: Option<String>,
    #[serde(default)]
    pub similar_tickers: Vec<String>,
    pub source: Option<FeedId>,
    /// When the descriptive-detail enrichment last ran for this record.
    pub detail_refreshed_at: Option<UtcDateTime>,

    #[serde(default)]
    pub updated: bool,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub update_reasons: Vec<String>,
    pub last_updated: UtcDateTime,
}

impl Asset {
    pub fn new(ticker: Ticker) -> Self {
        Self {
            ticker,
            name: None,
            description: None,
            primary_exchange: None,
            asset_type: AssetType::Unknown,
            composite_figi: None,
            share_class_figi: None,
            cusip: None,
            isin: None,
            cik: None,
            listing_date: None,
            delisting_date: None,
            industry: None,
            sector: None,
            icon_url: None,
            corporate_url: None,
            headquarters: None,
            similar_tickers: Vec::new(),
            source: None,
            detail_refreshed_at: None,
            updated: false,
            is_new: false,
            update_reasons: Vec::new(),
            last_updated: UtcDateTime::now(),
        }
    }

    /// Active means no delisting date has been recorded.
    pub fn is_active(&self) -> bool {
        self.delisting_date.is_none()
    }

    pub fn is_delisted(&self) -> bool {
        self.delisting_date.is_some()
    }
}

/// Normalize a free-text upstream value: trim, and map empty to `None`.
pub fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_type_labels_round_trip() {
        for asset_type in AssetType::ALL {
            let parsed: AssetType = asset_type.as_str().parse().expect("label must parse");
            assert_eq!(parsed, asset_type);
        }
    }

    #[test]
    fn rejects_unrecognized_asset_type_label() {
        let err = AssetType::from_str("Synthetic History").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidAssetType { .. }));
    }

    #[test]
    fn active_is_derived_from_delisting_date() {
        let mut asset = Asset::new(Ticker::parse("AAPL").expect("valid ticker"));
        assert!(asset.is_active());

        asset.delisting_date = Some(CalendarDate::parse("2024-05-01").expect("valid date"));
        assert!(!asset.is_active());
        assert!(asset.is_delisted());
    }

    #[test]
    fn non_empty_drops_whitespace_only_values() {
        assert_eq!(non_empty("  "), None);
        assert_eq!(non_empty(""), None);
        assert_eq!(non_empty(" Apple Inc. "), Some(String::from("Apple Inc.")));
    }
}
