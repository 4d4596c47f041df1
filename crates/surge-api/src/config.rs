//! Server configuration.

use serde::{Deserialize, Serialize};

use surge_core::{Error, Result};

use crate::rate_limit::RateLimitConfig;

/// Configuration for the Surge API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server port.
    pub http_port: u16,

    /// Order-log connection string.
    ///
    /// When unset in debug mode, an in-memory order log is used instead;
    /// outside debug mode it is a startup error.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Maximum order-log connections in the pool.
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Sale served when a request omits `sale_id`.
    #[serde(default = "default_sale_id")]
    pub default_sale_id: String,

    /// TTL for coordinator user marks in seconds.
    ///
    /// Should slightly exceed the sale window; default 24 hours.
    #[serde(default = "default_mark_ttl_secs")]
    pub mark_ttl_secs: u64,

    /// Enable debug mode.
    ///
    /// When enabled:
    /// - missing `SURGE_DATABASE_URL` falls back to in-memory storage
    /// - logs are pretty-printed instead of JSON
    #[serde(default)]
    pub debug: bool,

    /// CORS configuration.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Rate limiting configuration (advisory; correctness never depends on it).
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_db_max_connections() -> u32 {
    20
}

fn default_sale_id() -> String {
    "default".to_string()
}

fn default_mark_ttl_secs() -> u64 {
    86_400
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            database_url: None,
            db_max_connections: default_db_max_connections(),
            default_sale_id: default_sale_id(),
            mark_ttl_secs: default_mark_ttl_secs(),
            debug: false,
            cors: CorsConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// CORS configuration for browser-based access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins. Use `["*"]` to allow all origins (development only).
    /// Empty list disables CORS entirely.
    pub allowed_origins: Vec<String>,

    /// Max age for preflight cache (seconds).
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            // Default: disabled (secure-by-default).
            allowed_origins: Vec::new(),
            max_age_seconds: 3600,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Supported env vars:
    /// - `SURGE_HTTP_PORT`
    /// - `SURGE_DATABASE_URL`
    /// - `SURGE_DB_MAX_CONNECTIONS`
    /// - `SURGE_DEFAULT_SALE_ID`
    /// - `SURGE_MARK_TTL_SECS`
    /// - `SURGE_DEBUG`
    /// - `SURGE_CORS_ALLOWED_ORIGINS` (comma-separated, or `*`)
    /// - `SURGE_CORS_MAX_AGE_SECONDS`
    /// - `SURGE_RATE_LIMIT_ENABLED`
    /// - `SURGE_RATE_LIMIT_PER_MINUTE`
    /// - `SURGE_RATE_LIMIT_BURST`
    ///
    /// # Errors
    ///
    /// Returns an error if any environment variable is present but cannot be
    /// parsed.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = env_u16("SURGE_HTTP_PORT")? {
            config.http_port = port;
        }
        config.database_url = env_string("SURGE_DATABASE_URL");
        if let Some(max) = env_u32("SURGE_DB_MAX_CONNECTIONS")? {
            if max == 0 {
                return Err(Error::Validation {
                    message: "SURGE_DB_MAX_CONNECTIONS must be greater than 0".to_string(),
                });
            }
            config.db_max_connections = max;
        }
        if let Some(sale) = env_string("SURGE_DEFAULT_SALE_ID") {
            config.default_sale_id = sale;
        }
        if let Some(ttl) = env_u64("SURGE_MARK_TTL_SECS")? {
            if ttl == 0 {
                return Err(Error::Validation {
                    message: "SURGE_MARK_TTL_SECS must be greater than 0".to_string(),
                });
            }
            config.mark_ttl_secs = ttl;
        }
        if let Some(debug) = env_bool("SURGE_DEBUG")? {
            config.debug = debug;
        }

        if let Some(origins) = env_string("SURGE_CORS_ALLOWED_ORIGINS") {
            config.cors.allowed_origins = parse_cors_allowed_origins(&origins);
        }
        if let Some(max_age) = env_u64("SURGE_CORS_MAX_AGE_SECONDS")? {
            config.cors.max_age_seconds = max_age;
        }

        if let Some(enabled) = env_bool("SURGE_RATE_LIMIT_ENABLED")? {
            config.rate_limit.enabled = enabled;
        }
        if let Some(per_minute) = env_u32("SURGE_RATE_LIMIT_PER_MINUTE")? {
            config.rate_limit.requests_per_minute = per_minute;
        }
        if let Some(burst) = env_u32("SURGE_RATE_LIMIT_BURST")? {
            config.rate_limit.burst_size = burst;
        }

        Ok(config)
    }

    /// Returns the mark TTL as a `std::time::Duration`.
    #[must_use]
    pub const fn mark_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.mark_ttl_secs)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_u16(name: &str) -> Result<Option<u16>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u16>().map(Some).map_err(|e| Error::Validation {
        message: format!("{name} must be a u16: {e}"),
    })
}

fn env_u32(name: &str) -> Result<Option<u32>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u32>().map(Some).map_err(|e| Error::Validation {
        message: format!("{name} must be a u32: {e}"),
    })
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u64>().map(Some).map_err(|e| Error::Validation {
        message: format!("{name} must be a u64: {e}"),
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(Error::Validation {
            message: format!("{name} must be a boolean (true/false/1/0)"),
        }),
    }
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    parse_bool(name, &v).map(Some)
}

fn parse_cors_allowed_origins(value: &str) -> Vec<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed == "*" {
        return vec!["*".to_string()];
    }

    trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
