//! Token-bucket admission rate limiter.
//!
//! One shared bucket refills continuously at `rate` tokens per second up to
//! `capacity`; every admitted request takes one token. On top of that each
//! source may make at most `per_source_limit` requests between two bulk
//! resets of the per-source counters, which happen once per `window`.
//!
//! The bulk reset is coarse: a source near its ceiling just before a reset
//! can burst again right after it.
//!
//! All state sits behind a single lock, taken by [`RateLimiter::allow`] and
//! [`RateLimiter::cleanup`] alike.

use crate::config::{ConfigError, RateLimitConfig};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_updated: Instant,
    last_cleanup: Instant,
    per_source: HashMap<String, u32>,
}

/// Token-bucket rate limiter with a per-source ceiling.
///
/// # Examples
///
/// ```
/// use safectx_gateway::config::RateLimitConfig;
/// use safectx_gateway::rate_limiter::RateLimiter;
/// use std::time::Duration;
///
/// let limiter = RateLimiter::new(RateLimitConfig::new(1.0, 2.0, Duration::from_secs(60)));
/// assert!(limiter.allow("10.0.0.1"));
/// assert!(limiter.allow("10.0.0.1"));
/// assert!(!limiter.allow("10.0.0.1"));
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter with a full bucket.
    ///
    /// `config` is taken as given; a capacity below one token denies every
    /// request. Use [`RateLimiter::try_new`] to reject such configurations.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        let now = Instant::now();
        Self {
            state: Mutex::new(Bucket {
                tokens: config.capacity,
                last_updated: now,
                last_cleanup: now,
                per_source: HashMap::new(),
            }),
            config,
        }
    }

    /// Create a limiter after checking `config`.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] from [`RateLimitConfig::validate`].
    pub fn try_new(config: RateLimitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// The limiter's configuration.
    #[must_use]
    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Decide whether a request from `source` is admitted now.
    #[must_use]
    pub fn allow(&self, source: &str) -> bool {
        self.allow_at(source, Instant::now())
    }

    /// Decide whether a request from `source` is admitted at `now`.
    ///
    /// `now` earlier than the last observed instant adds no tokens.
    #[must_use]
    pub fn allow_at(&self, source: &str, now: Instant) -> bool {
        let Some(mut bucket) = self.lock() else {
            return false;
        };

        if now.saturating_duration_since(bucket.last_cleanup) >= self.config.window {
            bucket.per_source.clear();
            bucket.last_cleanup = now;
        }

        let elapsed = now.saturating_duration_since(bucket.last_updated).as_secs_f64();
        bucket.tokens = elapsed.mul_add(self.config.rate, bucket.tokens).min(self.config.capacity);
        if now > bucket.last_updated {
            bucket.last_updated = now;
        }

        if bucket.tokens < 1.0 {
            tracing::debug!(source = %source, "Global rate limit exceeded");
            return false;
        }

        let count = bucket.per_source.get(source).copied().unwrap_or(0);
        if count >= self.config.per_source_limit {
            tracing::debug!(source = %source, count = count, "Per-source rate limit exceeded");
            return false;
        }

        bucket.tokens -= 1.0;
        bucket.per_source.insert(source.to_string(), count + 1);
        true
    }

    /// Reset every per-source counter now.
    pub fn cleanup(&self) {
        if let Some(mut bucket) = self.lock() {
            bucket.per_source.clear();
            bucket.last_cleanup = Instant::now();
        }
    }

    /// Tokens currently in the bucket (as of the last call).
    #[must_use]
    pub fn available_tokens(&self) -> f64 {
        self.lock().map_or(0.0, |bucket| bucket.tokens)
    }

    /// Requests admitted for `source` since the last reset.
    #[must_use]
    pub fn source_count(&self, source: &str) -> u32 {
        self.lock()
            .and_then(|bucket| bucket.per_source.get(source).copied())
            .unwrap_or(0)
    }

    /// Lock the bucket; a poisoned lock fails closed.
    fn lock(&self) -> Option<MutexGuard<'_, Bucket>> {
        match self.state.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                tracing::error!("Rate limiter lock poisoned, denying request");
                None
            }
        }
    }
}
