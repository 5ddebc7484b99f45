//! Gateway configuration.
//!
//! Configuration values are provided by the application (or read from the
//! environment with [`GatewayConfig::from_env`]) and checked with
//! [`GatewayConfig::validate`] before any component is built.

use std::time::Duration;
use thiserror::Error;

/// A configuration value that violates its constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid configuration: {field}: {message}")]
pub struct ConfigError {
    /// Dotted path of the offending option.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ConfigError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Where sessions are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// In-process map. Suitable only for a single running instance.
    Memory,

    /// Redis-compatible networked store.
    Redis {
        /// Connection URL (e.g. `redis://127.0.0.1:6379/0`).
        url: String,
        /// Key namespace prefix.
        namespace: String,
    },
}

/// Session lifecycle configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lifetime of a session from creation or last refresh.
    ///
    /// Default: 24 hours
    pub session_timeout: Duration,

    /// Maximum number of live sessions per user.
    ///
    /// Default: 5
    pub max_sessions_per_user: usize,

    /// Serialise session creation per user so concurrent creates cannot both
    /// pass the maximum check. Only effective within one process.
    ///
    /// Default: `false`
    pub strict_user_limit: bool,

    /// Backing store.
    ///
    /// Default: [`StoreConfig::Memory`]
    pub store: StoreConfig,
}

impl SessionConfig {
    /// Set session timeout.
    #[must_use]
    pub const fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Set maximum sessions per user.
    #[must_use]
    pub const fn with_max_sessions_per_user(mut self, max: usize) -> Self {
        self.max_sessions_per_user = max;
        self
    }

    /// Enable or disable per-user create serialisation.
    #[must_use]
    pub const fn with_strict_user_limit(mut self, strict: bool) -> Self {
        self.strict_user_limit = strict;
        self
    }

    /// Set backing store.
    #[must_use]
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Check session options.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero timeout, a zero maximum, or an
    /// incomplete Redis configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_timeout.is_zero() {
            return Err(ConfigError::new(
                "session.session_timeout",
                "session timeout must be greater than 0",
            ));
        }

        if self.max_sessions_per_user == 0 {
            return Err(ConfigError::new(
                "session.max_sessions_per_user",
                "max sessions per user must be greater than 0",
            ));
        }

        if let StoreConfig::Redis { url, namespace } = &self.store {
            if url.trim().is_empty() {
                return Err(ConfigError::new(
                    "session.redis.url",
                    "Redis URL must be specified",
                ));
            }
            if namespace.trim().is_empty() {
                return Err(ConfigError::new(
                    "session.redis.namespace",
                    "Redis key namespace must be specified",
                ));
            }
        }

        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(24 * 60 * 60),
            max_sessions_per_user: 5,
            strict_user_limit: false,
            store: StoreConfig::Memory,
        }
    }
}

/// Rate limiter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Bucket refill rate in tokens per second.
    ///
    /// Default: 10.0
    pub rate: f64,

    /// Bucket capacity (maximum burst).
    ///
    /// Default: 10.0
    pub capacity: f64,

    /// Cadence at which per-source counters are reset in bulk.
    ///
    /// Default: 60 seconds
    pub window: Duration,

    /// Requests a single source may make between two bulk resets.
    ///
    /// Default: 100
    pub per_source_limit: u32,
}

impl RateLimitConfig {
    /// Create a configuration with the given rate, capacity and window.
    #[must_use]
    pub const fn new(rate: f64, capacity: f64, window: Duration) -> Self {
        Self {
            rate,
            capacity,
            window,
            per_source_limit: 100,
        }
    }

    /// Set the per-source ceiling.
    #[must_use]
    pub const fn with_per_source_limit(mut self, limit: u32) -> Self {
        self.per_source_limit = limit;
        self
    }

    /// Check limiter options.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any option is not strictly positive, or
    /// if `capacity` is below one token (such a bucket never admits).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.rate.is_finite() && self.rate > 0.0) {
            return Err(ConfigError::new(
                "rate_limit.rate",
                "rate must be a positive number",
            ));
        }
        if !(self.capacity.is_finite() && self.capacity >= 1.0) {
            return Err(ConfigError::new(
                "rate_limit.capacity",
                "capacity must be a number of at least 1",
            ));
        }
        if self.window.is_zero() {
            return Err(ConfigError::new(
                "rate_limit.window",
                "window must be greater than 0",
            ));
        }
        if self.per_source_limit == 0 {
            return Err(ConfigError::new(
                "rate_limit.per_source_limit",
                "per-source limit must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(10.0, 10.0, Duration::from_secs(60))
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Session lifecycle options.
    pub session: SessionConfig,
    /// Admission rate limiting options.
    pub rate_limit: RateLimitConfig,
}

impl GatewayConfig {
    /// Check every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session.validate()?;
        self.rate_limit.validate()
    }

    /// Load configuration from `SAFECTX_*` environment variables, falling back
    /// to defaults for anything unset, then validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable cannot be parsed or the resulting
    /// configuration is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`GatewayConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let store = match lookup("SAFECTX_SESSION_STORE").as_deref() {
            None | Some("memory") => StoreConfig::Memory,
            Some("redis") => StoreConfig::Redis {
                url: lookup("SAFECTX_REDIS_URL")
                    .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
                namespace: lookup("SAFECTX_REDIS_NAMESPACE")
                    .unwrap_or_else(|| "safectx".to_string()),
            },
            Some(_) => {
                return Err(ConfigError::new(
                    "session.store",
                    "invalid session store type, must be 'memory' or 'redis'",
                ));
            }
        };

        let session = SessionConfig {
            session_timeout: parse(
                &lookup,
                "SAFECTX_SESSION_TIMEOUT_SECS",
                "session.session_timeout",
            )?
            .map_or(defaults.session.session_timeout, Duration::from_secs),
            max_sessions_per_user: parse(
                &lookup,
                "SAFECTX_MAX_SESSIONS_PER_USER",
                "session.max_sessions_per_user",
            )?
            .unwrap_or(defaults.session.max_sessions_per_user),
            strict_user_limit: parse(
                &lookup,
                "SAFECTX_STRICT_USER_LIMIT",
                "session.strict_user_limit",
            )?
            .unwrap_or(defaults.session.strict_user_limit),
            store,
        };

        let rate_limit = RateLimitConfig {
            rate: parse(&lookup, "SAFECTX_RATE_LIMIT_RATE", "rate_limit.rate")?
                .unwrap_or(defaults.rate_limit.rate),
            capacity: parse(&lookup, "SAFECTX_RATE_LIMIT_CAPACITY", "rate_limit.capacity")?
                .unwrap_or(defaults.rate_limit.capacity),
            window: parse(&lookup, "SAFECTX_RATE_LIMIT_WINDOW_SECS", "rate_limit.window")?
                .map_or(defaults.rate_limit.window, Duration::from_secs),
            per_source_limit: parse(
                &lookup,
                "SAFECTX_RATE_LIMIT_PER_SOURCE",
                "rate_limit.per_source_limit",
            )?
            .unwrap_or(defaults.rate_limit.per_source_limit),
        };

        let config = Self { session, rate_limit };
        config.validate()?;
        Ok(config)
    }
}

/// Parse an optional variable, reporting unparsable values against `field`.
fn parse<T, F>(lookup: &F, key: &str, field: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::new(field, format!("cannot parse {key}={raw}")))
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.session_timeout, Duration::from_secs(86_400));
        assert_eq!(config.session.max_sessions_per_user, 5);
        assert_eq!(config.session.store, StoreConfig::Memory);
        assert_eq!(config.rate_limit.per_source_limit, 100);
    }

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfig::default()
            .with_session_timeout(Duration::from_secs(60))
            .with_max_sessions_per_user(2)
            .with_strict_user_limit(true);

        assert_eq!(config.session_timeout, Duration::from_secs(60));
        assert_eq!(config.max_sessions_per_user, 2);
        assert!(config.strict_user_limit);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = SessionConfig::default().with_session_timeout(Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "session.session_timeout");
    }

    #[test]
    fn test_zero_max_sessions_rejected() {
        let config = SessionConfig::default().with_max_sessions_per_user(0);
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "session.max_sessions_per_user");
    }

    #[test]
    fn test_redis_requires_url() {
        let config = SessionConfig::default().with_store(StoreConfig::Redis {
            url: String::new(),
            namespace: "safectx".to_string(),
        });
        assert_eq!(config.validate().unwrap_err().field, "session.redis.url");
    }

    #[test]
    fn test_rate_limit_must_be_positive() {
        let config = RateLimitConfig::new(0.0, 10.0, Duration::from_secs(1));
        assert_eq!(config.validate().unwrap_err().field, "rate_limit.rate");

        let config = RateLimitConfig::new(1.0, -1.0, Duration::from_secs(1));
        assert_eq!(config.validate().unwrap_err().field, "rate_limit.capacity");

        let config = RateLimitConfig::new(1.0, 0.5, Duration::from_secs(1));
        assert_eq!(config.validate().unwrap_err().field, "rate_limit.capacity");
        assert!(RateLimitConfig::new(1.0, 1.0, Duration::from_secs(1)).validate().is_ok());

        let config = RateLimitConfig::new(1.0, 1.0, Duration::ZERO);
        assert_eq!(config.validate().unwrap_err().field, "rate_limit.window");

        let config = RateLimitConfig::default().with_per_source_limit(0);
        assert_eq!(
            config.validate().unwrap_err().field,
            "rate_limit.per_source_limit"
        );
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = GatewayConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.session.store, StoreConfig::Memory);
        assert!((config.rate_limit.rate - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_lookup_redis() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("SAFECTX_SESSION_STORE", "redis"),
            ("SAFECTX_REDIS_URL", "redis://cache:6379/2"),
            ("SAFECTX_SESSION_TIMEOUT_SECS", "3600"),
            ("SAFECTX_MAX_SESSIONS_PER_USER", "3"),
            ("SAFECTX_STRICT_USER_LIMIT", "true"),
            ("SAFECTX_RATE_LIMIT_CAPACITY", "50"),
        ]))
        .unwrap();

        assert_eq!(
            config.session.store,
            StoreConfig::Redis {
                url: "redis://cache:6379/2".to_string(),
                namespace: "safectx".to_string(),
            }
        );
        assert_eq!(config.session.session_timeout, Duration::from_secs(3600));
        assert_eq!(config.session.max_sessions_per_user, 3);
        assert!(config.session.strict_user_limit);
        assert!((config.rate_limit.capacity - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_lookup_rejects_unknown_store() {
        let err = GatewayConfig::from_lookup(lookup_from(&[("SAFECTX_SESSION_STORE", "etcd")]))
            .unwrap_err();
        assert_eq!(err.field, "session.store");
    }

    #[test]
    fn test_from_lookup_rejects_garbage_numbers() {
        let err = GatewayConfig::from_lookup(lookup_from(&[(
            "SAFECTX_MAX_SESSIONS_PER_USER",
            "many",
        )]))
        .unwrap_err();
        assert_eq!(err.field, "session.max_sessions_per_user");
        assert!(err.message.contains("many"));
    }

    #[test]
    fn test_from_lookup_validates_result() {
        let err = GatewayConfig::from_lookup(lookup_from(&[("SAFECTX_SESSION_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert_eq!(err.field, "session.session_timeout");
    }
}
