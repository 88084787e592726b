//! Fixed-window rate limiting per (identity, action).

use std::time::Duration;

use common::Identity;
use store::{CounterStore, StoreError};

/// Rate limit configuration for one action.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum admitted requests per window.
    pub limit: u32,
    /// Window length.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Within budget.
    Allowed {
        /// Requests left in the current window.
        remaining: u32,
    },
    /// Over budget for the current window.
    Denied {
        /// Time until the window expires and the budget resets.
        retry_after: Duration,
    },
}

impl Admission {
    /// Returns true for [`Admission::Allowed`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

/// Fixed-window request counter per (identity, action).
///
/// One atomic increment per request, with the window expiry armed by the
/// counter store's own TTL on the first increment of a fresh window — no
/// sweeps, no per-identity timers. The budget resets at a fixed boundary,
/// so a burst straddling it can see up to twice the limit; that is an
/// accepted tradeoff for bot deterrence, not a fairness guarantee. Denied
/// attempts still count against the window.
#[derive(Clone)]
pub struct RateLimiter<C: CounterStore> {
    counters: C,
    config: RateLimitConfig,
}

impl<C: CounterStore> RateLimiter<C> {
    /// Creates a rate limiter over the given counter store.
    pub fn new(counters: C, config: RateLimitConfig) -> Self {
        Self { counters, config }
    }

    /// Returns the configured limit and window.
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    fn budget_key(identity: &Identity, action: &str) -> String {
        format!("rate:{identity}:{action}")
    }

    /// Counts this attempt and decides whether it is within budget.
    #[tracing::instrument(skip(self), fields(identity = %identity))]
    pub async fn admit(&self, identity: &Identity, action: &str) -> Result<Admission, StoreError> {
        let key = Self::budget_key(identity, action);
        let count = self
            .counters
            .incr_with_ttl(&key, 1, self.config.window)
            .await?;

        if count > i64::from(self.config.limit) {
            let retry_after = self
                .counters
                .ttl_remaining(&key)
                .await?
                .unwrap_or(self.config.window);
            metrics::counter!("rate_limit_denied_total").increment(1);
            tracing::debug!(count, "rate limit exceeded");
            return Ok(Admission::Denied { retry_after });
        }

        let remaining = self.config.limit - count as u32;
        Ok(Admission::Allowed { remaining })
    }
}
