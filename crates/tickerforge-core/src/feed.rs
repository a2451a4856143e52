use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::{Asset, FeedId};

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedErrorKind {
    Transport,
    Decode,
    RateLimited,
    InvalidResponse,
}

/// Structured feed error. Feed failures never abort a run; the
/// orchestrator logs them and continues with whatever the feed returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedError {
    kind: FeedErrorKind,
    message: String,
    retryable: bool,
}

impl FeedError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: FeedErrorKind::Transport,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: FeedErrorKind::Decode,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: FeedErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self {
            kind: FeedErrorKind::InvalidResponse,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> FeedErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FeedErrorKind::Transport => "feed.transport",
            FeedErrorKind::Decode => "feed.decode",
            FeedErrorKind::RateLimited => "feed.rate_limited",
            FeedErrorKind::InvalidResponse => "feed.invalid_response",
        }
    }
}

impl Display for FeedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for FeedError {}

/// Summary of one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichReport {
    /// Records that qualified for enrichment.
    pub examined: usize,
    /// Records that received at least one field.
    pub enriched: usize,
}

/// Upstream listing feed: produces a full per-source record list per run.
pub trait AssetFeed: Send + Sync {
    fn id(&self) -> FeedId;

    fn fetch<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Asset>, FeedError>> + Send + 'a>>;
}

/// Enrichment adapter: fills missing fields on the combined candidate set
/// in place.
pub trait AssetEnricher: Send + Sync {
    fn id(&self) -> FeedId;

    fn enrich<'a>(
        &'a self,
        assets: &'a mut [Asset],
    ) -> Pin<Box<dyn Future<Output = Result<EnrichReport, FeedError>> + Send + 'a>>;
}
