//! Registry differ: merges the incoming generation into the previous one,
//! detecting additions and inferring delistings.

use std::collections::HashMap;

use tracing::info;

use crate::merge::{merge_asset, FieldChange, MergeAnomaly};
use crate::{Asset, CalendarDate, Ticker, UtcDateTime};

/// Reconciled next generation plus the structured audit trail of how it
/// was produced.
#[derive(Debug, Default)]
pub struct ReconcileDiff {
    pub assets: Vec<Asset>,
    pub merged_count: usize,
    pub new_count: usize,
    pub inferred_delistings: usize,
    pub changes: Vec<(Ticker, FieldChange)>,
    pub anomalies: Vec<MergeAnomaly>,
}

/// Reconcile the previous registry generation against the current run's
/// combined fetch.
///
/// Delisted records are excluded from both lookups: they neither receive
/// merges nor count as "still present". Every active ticker from either
/// generation appears in the output: survivors are merged in place, new
/// tickers are stamped, and active tickers absent from the incoming set are
/// marked delisted as of `today`.
pub fn reconcile(existing: Vec<Asset>, incoming: Vec<Asset>, today: CalendarDate) -> ReconcileDiff {
    let mut diff = ReconcileDiff::default();

    let mut existing_active: HashMap<Ticker, Asset> = HashMap::new();
    let mut existing_order: Vec<Ticker> = Vec::new();
    for asset in existing {
        if asset.is_delisted() {
            info!(ticker = %asset.ticker, "retired asset excluded from reconciliation");
            continue;
        }
        existing_order.push(asset.ticker.clone());
        existing_active.insert(asset.ticker.clone(), asset);
    }

    for incoming_asset in incoming {
        if incoming_asset.is_delisted() {
            info!(ticker = %incoming_asset.ticker, "incoming record already delisted; dropped");
            continue;
        }

        match existing_active.remove(&incoming_asset.ticker) {
            Some(mut survivor) => {
                let outcome = merge_asset(&mut survivor, &incoming_asset);
                diff.merged_count += 1;
                diff.changes.extend(
                    outcome
                        .changes
                        .into_iter()
                        .map(|change| (survivor.ticker.clone(), change)),
                );
                diff.anomalies.extend(outcome.anomalies);
                diff.assets.push(survivor);
            }
            None => {
                let mut added = incoming_asset;
                if added.listing_date.is_none() {
                    added.listing_date = Some(today);
                }
                added.is_new = true;
                added.last_updated = UtcDateTime::now();
                info!(ticker = %added.ticker, "new asset");
                diff.new_count += 1;
                diff.assets.push(added);
            }
        }
    }

    // Anything left in the filtered existing map vanished from this run's
    // combined fetch: infer a delisting.
    for ticker in existing_order {
        let Some(mut vanished) = existing_active.remove(&ticker) else {
            continue;
        };
        vanished.delisting_date = Some(today);
        vanished.updated = true;
        vanished.update_reasons.push(String::from("asset delisted"));
        vanished.last_updated = UtcDateTime::now();
        info!(ticker = %vanished.ticker, delisted = %today, "inferred delisting");
        diff.inferred_delistings += 1;
        diff.assets.push(vanished);
    }

    diff
}
