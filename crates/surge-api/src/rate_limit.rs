//! Per-buyer rate limiting.
//!
//! Advisory only: admission correctness never depends on it (the oversell and
//! one-per-buyer guarantees live in the engine). Disabled by default; enable
//! it to shield the coordinator from pathological single-client bursts.
//!
//! ## Response Headers
//!
//! When rate limited, the purchase route returns:
//! - `429 Too Many Requests` status
//! - `Retry-After` header with seconds to wait

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

// ============================================================================
// Configuration
// ============================================================================

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled.
    #[serde(default)]
    pub enabled: bool,

    /// Requests per minute per buyer.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Maximum burst size (requests allowed above steady rate).
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

const fn default_requests_per_minute() -> u32 {
    600
}

const fn default_burst_size() -> u32 {
    50
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_minute: default_requests_per_minute(),
            burst_size: default_burst_size(),
        }
    }
}

// ============================================================================
// Rate Limiter State
// ============================================================================

/// Per-buyer rate limiter using in-memory state.
type BuyerLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Rate limiting state shared across all request handlers.
#[derive(Clone)]
pub struct RateLimitState {
    config: RateLimitConfig,
    limiters: Arc<RwLock<HashMap<String, Arc<BuyerLimiter>>>>,
}

impl std::fmt::Debug for RateLimitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitState")
            .field("config", &self.config)
            .field("limiters", &"<HashMap>")
            .finish()
    }
}

impl RateLimitState {
    /// Creates new rate limit state with the given configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            limiters: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Checks the rate limit for a buyer.
    pub async fn check(&self, user: &str) -> RateLimitResult {
        if !self.config.enabled {
            return RateLimitResult::Allowed;
        }

        let limiter = self.get_or_create_limiter(user).await;
        match limiter.check() {
            Ok(()) => RateLimitResult::Allowed,
            Err(not_until) => {
                let retry_after =
                    not_until.wait_time_from(governor::clock::Clock::now(&DefaultClock::default()));
                RateLimitResult::Limited {
                    retry_after_secs: retry_after.as_secs().max(1),
                }
            }
        }
    }

    async fn get_or_create_limiter(&self, user: &str) -> Arc<BuyerLimiter> {
        // Fast path: check if limiter exists
        {
            let read_guard = self.limiters.read().await;
            if let Some(limiter) = read_guard.get(user) {
                return Arc::clone(limiter);
            }
        }

        // Slow path: create new limiter
        let mut write_guard = self.limiters.write().await;

        // Double-check after acquiring write lock
        if let Some(limiter) = write_guard.get(user) {
            return Arc::clone(limiter);
        }

        let replenish_rate =
            NonZeroU32::new(self.config.requests_per_minute.max(1)).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(self.config.burst_size.max(1)).unwrap_or(NonZeroU32::MIN);

        let quota = Quota::per_minute(replenish_rate).allow_burst(burst);
        let limiter = Arc::new(RateLimiter::direct(quota));

        write_guard.insert(user.to_string(), Arc::clone(&limiter));
        limiter
    }
}

/// Result of a rate limit check.
#[derive(Debug)]
pub enum RateLimitResult {
    /// Request is allowed.
    Allowed,
    /// Request is rate limited.
    Limited {
        /// Seconds until the client can retry.
        retry_after_secs: u64,
    },
}
