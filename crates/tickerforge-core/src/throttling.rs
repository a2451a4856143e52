use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::FeedId;

/// Per-feed request budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPolicy {
    pub feed_id: FeedId,
    pub quota_window: Duration,
    pub quota_limit: u32,
}

impl FeedPolicy {
    /// Free-tier reference API: 5 requests per minute.
    pub fn polygon_default() -> Self {
        Self {
            feed_id: FeedId::Polygon,
            quota_window: Duration::from_secs(60),
            quota_limit: 5,
        }
    }

    /// The fund list is one bulk download; the budget only guards retries.
    pub fn tiingo_default() -> Self {
        Self {
            feed_id: FeedId::Tiingo,
            quota_window: Duration::from_secs(60),
            quota_limit: 10,
        }
    }

    /// Mapping API allows 25 batch requests per 6 seconds.
    pub fn openfigi_default() -> Self {
        Self {
            feed_id: FeedId::OpenFigi,
            quota_window: Duration::from_secs(6),
            quota_limit: 25,
        }
    }

    /// Quote-summary scraping budget: 120 requests per minute.
    pub fn yahoo_default() -> Self {
        Self {
            feed_id: FeedId::Yahoo,
            quota_window: Duration::from_secs(60),
            quota_limit: 120,
        }
    }

    pub fn default_for(feed_id: FeedId) -> Self {
        match feed_id {
            FeedId::Polygon => Self::polygon_default(),
            FeedId::Tiingo => Self::tiingo_default(),
            FeedId::OpenFigi => Self::openfigi_default(),
            FeedId::Yahoo => Self::yahoo_default(),
        }
    }
}

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// In-memory throttle shared by an adapter's request loop.
#[derive(Clone)]
pub struct ThrottlingQueue {
    limiter: Arc<DirectRateLimiter>,
}

impl ThrottlingQueue {
    pub fn new(quota_window: Duration, quota_limit: u32) -> Self {
        let quota = quota_from_window(quota_window, quota_limit);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn from_policy(policy: &FeedPolicy) -> Self {
        Self::new(policy.quota_window, policy.quota_limit)
    }

    /// Tries to acquire rate budget without waiting.
    pub fn acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Waits until rate budget is available.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let safe_limit = quota_limit.max(1);
    let burst = NonZeroU32::new(safe_limit).expect("safe limit must be non-zero");

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(safe_limit)).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .expect("period is always greater than zero")
        .allow_burst(burst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_burst_up_to_quota_limit() {
        let queue = ThrottlingQueue::new(Duration::from_secs(60), 2);

        assert!(queue.acquire());
        assert!(queue.acquire());
        assert!(!queue.acquire());
    }

    #[test]
    fn policies_carry_expected_budgets() {
        let polygon = FeedPolicy::polygon_default();
        assert_eq!(polygon.quota_limit, 5);
        assert_eq!(polygon.quota_window, Duration::from_secs(60));

        let openfigi = FeedPolicy::default_for(FeedId::OpenFigi);
        assert_eq!(openfigi.quota_limit, 25);
        assert_eq!(openfigi.quota_window, Duration::from_secs(6));
    }
}
