//! Core contracts for tickerforge.
//!
//! This crate contains:
//! - Canonical asset records and validation
//! - The reconciliation engine: field merge policy, registry differ,
//!   composite-identifier deduplication, and the removal safety valve
//! - Feed/enricher traits and the upstream adapters behind them

pub mod adapters;
pub mod dedup;
pub mod diff;
pub mod feed;
pub mod filters;
pub mod http_client;
pub mod merge;
pub mod pipeline;
pub mod safety;
pub mod throttling;

mod domain;
mod error;

pub use dedup::{deduplicate, DedupCandidate, DedupDecision};
pub use diff::{reconcile, ReconcileDiff};
pub use domain::{non_empty, Asset, AssetType, CalendarDate, FeedId, Ticker, UtcDateTime};
pub use error::{CoreError, ValidationError};
pub use feed::{AssetEnricher, AssetFeed, EnrichReport, FeedError, FeedErrorKind};
pub use filters::{clean_assets, default_sources, filter_mixed_case, trim_whitespace};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};
pub use merge::{merge_asset, merge_asset_lists, FieldChange, MergeAnomaly, MergeOutcome};
pub use pipeline::{ReconcileConfig, Reconciler, RunOutcome};
pub use safety::{check_removal_limit, removal_count, SafetyViolation};
pub use throttling::{FeedPolicy, ThrottlingQueue};
