//! Supporting collection filters applied before reconciliation.

use tracing::debug;

use crate::{Asset, FeedId};

/// Drop records that lack a composite identifier or carry an unknown asset
/// type. Runs after enrichment has had its chance to fill both.
pub fn clean_assets(assets: Vec<Asset>) -> Vec<Asset> {
    let before = assets.len();
    let clean: Vec<Asset> = assets
        .into_iter()
        .filter(|asset| {
            asset
                .composite_figi
                .as_deref()
                .is_some_and(|figi| !figi.is_empty())
                && !asset.asset_type.is_unknown()
        })
        .collect();
    debug!(before, after = clean.len(), "cleaned assets");
    clean
}

/// Drop tickers that are not fully upper-case. Lower-case listings are
/// foreign or synthetic line entries the registry does not carry.
pub fn filter_mixed_case(assets: Vec<Asset>) -> Vec<Asset> {
    assets
        .into_iter()
        .filter(|asset| asset.ticker.is_upper())
        .collect()
}

/// Normalize free-text fields in place.
///
/// Must run before any merge comparison: merges compare values verbatim,
/// and trimming afterwards would surface spurious changes on the next run.
pub fn trim_whitespace(assets: &mut [Asset]) {
    for asset in assets {
        trim_field(&mut asset.name);
        trim_field(&mut asset.description);
        trim_field(&mut asset.cik);
        trim_field(&mut asset.cusip);
        trim_field(&mut asset.industry);
        trim_field(&mut asset.sector);
        trim_field(&mut asset.isin);
    }
}

fn trim_field(field: &mut Option<String>) {
    if let Some(value) = field {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            *field = None;
        } else if trimmed.len() != value.len() {
            *field = Some(trimmed.to_owned());
        }
    }
}

/// Fill a default provenance tag on records that reached persistence
/// without one: mutual funds come from the fund feed, everything else from
/// the listing feed.
pub fn default_sources(assets: &mut [Asset]) {
    for asset in assets {
        if asset.source.is_none() {
            asset.source = Some(if asset.asset_type == crate::AssetType::MutualFund {
                FeedId::Tiingo
            } else {
                FeedId::Polygon
            });
        }
    }
}
