//! Reconciliation orchestrator.
//!
//! Sequences one batch run: fetch every feed, combine the per-source lists,
//! enrich, filter, deduplicate, diff against the previous generation, and
//! apply the safety valve. The orchestrator owns one mutable collection per
//! generation; records are never aliased into two collections.

use std::sync::Arc;

use tracing::{info, warn};

use crate::dedup::{deduplicate, DedupDecision};
use crate::diff::reconcile;
use crate::feed::{AssetEnricher, AssetFeed};
use crate::filters::{clean_assets, default_sources, filter_mixed_case, trim_whitespace};
use crate::merge::{merge_asset_lists, FieldChange, MergeAnomaly};
use crate::safety::{check_removal_limit, SafetyViolation};
use crate::{Asset, CalendarDate, Ticker};

/// Explicit run configuration; core functions take only what they need.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Maximum number of delisted records a single run may persist.
    pub max_removed: usize,
    /// Optional cap on the combined candidate set, for trial runs.
    pub limit: Option<usize>,
    /// The run's notion of "today", stamped on new listings and inferred
    /// delistings.
    pub today: CalendarDate,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_removed: 25,
            limit: None,
            today: CalendarDate::today_utc(),
        }
    }
}

/// Everything a run produced, ready for persistence handoff.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub assets: Vec<Asset>,
    pub fetched: usize,
    pub merged_count: usize,
    pub new_count: usize,
    pub inferred_delistings: usize,
    pub removed_count: usize,
    pub changes: Vec<(Ticker, FieldChange)>,
    pub anomalies: Vec<MergeAnomaly>,
    pub dedup_decisions: Vec<DedupDecision>,
}

/// Single-run reconciliation driver.
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Run one reconciliation batch.
    ///
    /// Feed and enrichment failures are absorbed: a failing feed
    /// contributes nothing and the run continues. The only error is the
    /// safety-valve violation, which aborts before any persistence.
    pub async fn run(
        &self,
        feeds: &[Arc<dyn AssetFeed>],
        enrichers: &[Arc<dyn AssetEnricher>],
        existing: Vec<Asset>,
    ) -> Result<RunOutcome, SafetyViolation> {
        let mut outcome = RunOutcome::default();

        let mut combined: Vec<Asset> = Vec::new();
        for feed in feeds {
            let mut batch = match feed.fetch().await {
                Ok(batch) => batch,
                Err(error) => {
                    warn!(feed = %feed.id(), %error, "feed fetch failed; continuing without it");
                    continue;
                }
            };
            info!(feed = %feed.id(), records = batch.len(), "fetched feed");

            // Normalize before any merge comparison.
            trim_whitespace(&mut batch);

            if combined.is_empty() {
                combined = batch;
            } else {
                let merged = merge_asset_lists(combined, batch);
                info!(
                    feed = %feed.id(),
                    combined_only = merged.first_only.len(),
                    feed_only = merged.second_only.len(),
                    "combined feed into candidate set"
                );
                outcome.anomalies.extend(merged.anomalies);
                combined = merged.assets;
            }
        }
        outcome.fetched = combined.len();

        if let Some(limit) = self.config.limit {
            if combined.len() > limit {
                combined.truncate(limit);
            }
        }

        combined = filter_mixed_case(combined);

        for enricher in enrichers {
            match enricher.enrich(&mut combined).await {
                Ok(report) => info!(
                    enricher = %enricher.id(),
                    examined = report.examined,
                    enriched = report.enriched,
                    "enrichment pass complete"
                ),
                Err(error) => {
                    warn!(enricher = %enricher.id(), %error, "enrichment pass failed; continuing");
                }
            }
        }

        combined = clean_assets(combined);

        let (mut deduped, decisions) = deduplicate(combined);
        outcome.dedup_decisions = decisions;

        default_sources(&mut deduped);

        let diff = reconcile(existing, deduped, self.config.today);
        outcome.merged_count = diff.merged_count;
        outcome.new_count = diff.new_count;
        outcome.inferred_delistings = diff.inferred_delistings;
        outcome.changes.extend(diff.changes);
        outcome.anomalies.extend(diff.anomalies);
        outcome.assets = diff.assets;

        outcome.removed_count = check_removal_limit(&outcome.assets, self.config.max_removed)?;

        info!(
            assets = outcome.assets.len(),
            new = outcome.new_count,
            delisted = outcome.removed_count,
            "reconciliation complete"
        );
        Ok(outcome)
    }
}
