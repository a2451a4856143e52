//! Field-level merge policy for same-ticker asset records.
//!
//! Merging mutates the existing record in place and reports every field
//! change as structured data so callers can audit a run without parsing
//! log output.

use std::collections::{HashMap, HashSet};

use tracing::{error, warn};

use crate::{Asset, AssetType, CalendarDate, Ticker, UtcDateTime};

/// A single field overwrite applied during a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: String,
    pub new: String,
}

impl FieldChange {
    pub fn reason(&self) -> String {
        format!("{} changed '{}' to '{}'", self.field, self.old, self.new)
    }
}

/// Recoverable contract and data-quality anomalies surfaced by a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAnomaly {
    /// The two records do not describe the same instrument; nothing merged.
    TickerMismatch { existing: Ticker, incoming: Ticker },
    /// Both records carry a populated asset type and they disagree; the
    /// existing value is kept.
    AssetTypeConflict {
        ticker: Ticker,
        existing: AssetType,
        incoming: AssetType,
    },
}

/// Result of one merge call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub changes: Vec<FieldChange>,
    pub anomalies: Vec<MergeAnomaly>,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Merge fields from `incoming` into `existing`.
///
/// A populated incoming value overwrites a differing existing value; an
/// empty incoming value never erases. The asset type only fills an unset
/// value. A ticker mismatch is a logged no-op, never an error.
pub fn merge_asset(existing: &mut Asset, incoming: &Asset) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    if existing.ticker != incoming.ticker {
        error!(
            existing = %existing.ticker,
            incoming = %incoming.ticker,
            "cannot merge assets with different tickers"
        );
        outcome.anomalies.push(MergeAnomaly::TickerMismatch {
            existing: existing.ticker.clone(),
            incoming: incoming.ticker.clone(),
        });
        return outcome;
    }

    if existing.asset_type.is_unknown() && !incoming.asset_type.is_unknown() {
        existing.asset_type = incoming.asset_type;
    } else if !existing.asset_type.is_unknown()
        && !incoming.asset_type.is_unknown()
        && existing.asset_type != incoming.asset_type
    {
        warn!(
            ticker = %existing.ticker,
            existing = %existing.asset_type,
            incoming = %incoming.asset_type,
            "conflicting asset types; keeping existing value"
        );
        outcome.anomalies.push(MergeAnomaly::AssetTypeConflict {
            ticker: existing.ticker.clone(),
            existing: existing.asset_type,
            incoming: incoming.asset_type,
        });
    }

    let changes = &mut outcome.changes;
    merge_text("CIK", &mut existing.cik, &incoming.cik, changes);
    merge_text("CUSIP", &mut existing.cusip, &incoming.cusip, changes);
    merge_text(
        "CompositeFigi",
        &mut existing.composite_figi,
        &incoming.composite_figi,
        changes,
    );
    merge_text(
        "ShareClassFigi",
        &mut existing.share_class_figi,
        &incoming.share_class_figi,
        changes,
    );
    merge_text(
        "CorporateUrl",
        &mut existing.corporate_url,
        &incoming.corporate_url,
        changes,
    );
    merge_date(
        "DelistingDate",
        &mut existing.delisting_date,
        &incoming.delisting_date,
        changes,
    );
    merge_text(
        "Description",
        &mut existing.description,
        &incoming.description,
        changes,
    );
    merge_text(
        "Headquarters",
        &mut existing.headquarters,
        &incoming.headquarters,
        changes,
    );
    merge_text("ISIN", &mut existing.isin, &incoming.isin, changes);
    merge_text("IconUrl", &mut existing.icon_url, &incoming.icon_url, changes);
    merge_text(
        "Industry",
        &mut existing.industry,
        &incoming.industry,
        changes,
    );
    merge_date(
        "ListingDate",
        &mut existing.listing_date,
        &incoming.listing_date,
        changes,
    );
    merge_text("Name", &mut existing.name, &incoming.name, changes);
    merge_text(
        "PrimaryExchange",
        &mut existing.primary_exchange,
        &incoming.primary_exchange,
        changes,
    );
    merge_text("Sector", &mut existing.sector, &incoming.sector, changes);

    // Source is compared by plain inequality, not emptiness.
    if existing.source != incoming.source {
        changes.push(FieldChange {
            field: "Source",
            old: display_source(existing.source.map(|s| s.as_str().to_owned())),
            new: display_source(incoming.source.map(|s| s.as_str().to_owned())),
        });
        existing.source = incoming.source;
    }

    if outcome.changed() {
        existing.updated = true;
        existing
            .update_reasons
            .extend(outcome.changes.iter().map(FieldChange::reason));
        existing.last_updated = UtcDateTime::now();
    }

    outcome
}

fn merge_text(
    field: &'static str,
    existing: &mut Option<String>,
    incoming: &Option<String>,
    changes: &mut Vec<FieldChange>,
) {
    if let Some(value) = incoming {
        if existing.as_deref() != Some(value.as_str()) {
            changes.push(FieldChange {
                field,
                old: existing.clone().unwrap_or_default(),
                new: value.clone(),
            });
            *existing = Some(value.clone());
        }
    }
}

fn merge_date(
    field: &'static str,
    existing: &mut Option<CalendarDate>,
    incoming: &Option<CalendarDate>,
    changes: &mut Vec<FieldChange>,
) {
    if let Some(value) = incoming {
        if existing.as_ref() != Some(value) {
            changes.push(FieldChange {
                field,
                old: existing.map(|d| d.to_string()).unwrap_or_default(),
                new: value.to_string(),
            });
            *existing = Some(*value);
        }
    }
}

fn display_source(value: Option<String>) -> String {
    value.unwrap_or_default()
}

/// Result of combining two per-source record lists.
#[derive(Debug, Default)]
pub struct MergedLists {
    pub assets: Vec<Asset>,
    /// Tickers present only in the first list.
    pub first_only: Vec<Ticker>,
    /// Tickers present only in the second list.
    pub second_only: Vec<Ticker>,
    pub anomalies: Vec<MergeAnomaly>,
}

/// Combine two per-source lists. Records in `first` receive merges from
/// same-ticker records in `second`; tickers unique to either list survive
/// unchanged.
pub fn merge_asset_lists(first: Vec<Asset>, second: Vec<Asset>) -> MergedLists {
    let mut merged = MergedLists {
        assets: first,
        ..MergedLists::default()
    };

    let mut index_by_ticker: HashMap<Ticker, usize> = merged
        .assets
        .iter()
        .enumerate()
        .map(|(index, asset)| (asset.ticker.clone(), index))
        .collect();
    let second_tickers: HashSet<Ticker> =
        second.iter().map(|asset| asset.ticker.clone()).collect();

    for asset in &merged.assets {
        if !second_tickers.contains(&asset.ticker) {
            merged.first_only.push(asset.ticker.clone());
        }
    }

    for incoming in second {
        match index_by_ticker.get(&incoming.ticker) {
            Some(&index) => {
                let outcome = merge_asset(&mut merged.assets[index], &incoming);
                merged.anomalies.extend(outcome.anomalies);
            }
            None => {
                index_by_ticker.insert(incoming.ticker.clone(), merged.assets.len());
                merged.second_only.push(incoming.ticker.clone());
                merged.assets.push(incoming);
            }
        }
    }

    merged
}
