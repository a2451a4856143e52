//! Composite-identifier deduplication.
//!
//! Listings sharing a composite FIGI describe the same underlying
//! instrument family; at most one survivor per identifier may reach
//! persistence. The survivor is chosen by an ordered list of comparison
//! stages applied left-to-right until one discriminates, so each stage can
//! be tested on its own.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::info;

use crate::{Asset, AssetType, CalendarDate, Ticker};

/// Identity summary of one candidate within a duplicate group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupCandidate {
    pub ticker: Ticker,
    pub asset_type: AssetType,
    pub listing_date: Option<CalendarDate>,
}

impl DedupCandidate {
    fn from_asset(asset: &Asset) -> Self {
        Self {
            ticker: asset.ticker.clone(),
            asset_type: asset.asset_type,
            listing_date: asset.listing_date,
        }
    }
}

/// One survivor selection, including what was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupDecision {
    pub composite_figi: String,
    pub survivor: DedupCandidate,
    pub discarded: Vec<DedupCandidate>,
}

/// An ordering stage; `Less` means the first candidate is preferred.
type Stage = fn(&Asset, &Asset) -> Ordering;

/// Stages in priority order: instrument class rank, then listing recency.
/// Input order breaks any remaining tie.
const STAGES: &[Stage] = &[by_type_rank, by_listing_date];

fn type_rank(asset_type: AssetType) -> u8 {
    match asset_type {
        AssetType::CommonStock => 0,
        AssetType::ClosedEndFund => 1,
        _ => 2,
    }
}

/// Common stock outranks everything; closed-end funds outrank the rest.
fn by_type_rank(a: &Asset, b: &Asset) -> Ordering {
    type_rank(a.asset_type).cmp(&type_rank(b.asset_type))
}

/// Later listing date wins. A missing date never wins, and a missing date
/// on either side leaves the stage undecided.
fn by_listing_date(a: &Asset, b: &Asset) -> Ordering {
    match (a.listing_date, b.listing_date) {
        (Some(a_listed), Some(b_listed)) => b_listed.cmp(&a_listed),
        _ => Ordering::Equal,
    }
}

fn compare_candidates(a: &Asset, b: &Asset) -> Ordering {
    for stage in STAGES {
        let ordering = stage(a, b);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Collapse records sharing a composite FIGI to one survivor each.
///
/// Records without an identifier pass through unchanged, as do singleton
/// groups. Returns the thinned collection plus one decision record per
/// collapsed group.
pub fn deduplicate(records: Vec<Asset>) -> (Vec<Asset>, Vec<DedupDecision>) {
    let mut output = Vec::with_capacity(records.len());
    let mut groups: HashMap<String, Vec<Asset>> = HashMap::new();
    let mut group_order: Vec<String> = Vec::new();

    for asset in records {
        match asset.composite_figi.clone() {
            Some(figi) if !figi.is_empty() => {
                let group = groups.entry(figi.clone()).or_default();
                if group.is_empty() {
                    group_order.push(figi);
                }
                group.push(asset);
            }
            _ => output.push(asset),
        }
    }

    let mut decisions = Vec::new();
    for figi in group_order {
        let Some(mut group) = groups.remove(&figi) else {
            continue;
        };

        if group.len() == 1 {
            output.push(group.remove(0));
            continue;
        }

        let mut survivor_index = 0;
        for index in 1..group.len() {
            // Strict preference only; ties keep the first-encountered
            // candidate, so selection is stable on input order.
            if compare_candidates(&group[index], &group[survivor_index]) == Ordering::Less {
                survivor_index = index;
            }
        }

        let survivor = group.remove(survivor_index);
        let discarded: Vec<DedupCandidate> = group.iter().map(DedupCandidate::from_asset).collect();
        let decision = DedupDecision {
            composite_figi: figi.clone(),
            survivor: DedupCandidate::from_asset(&survivor),
            discarded,
        };
        info!(
            composite_figi = %figi,
            survivor = %decision.survivor.ticker,
            discarded = decision.discarded.len(),
            "deduplicating composite identifier group"
        );
        decisions.push(decision);
        output.push(survivor);
    }

    (output, decisions)
}
