use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::BillingError;
use crate::utils::get_env_with_prefix;

/// Main configuration for a tenantpay deployment
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub checkout: CheckoutConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

/// Limits and timings for checkout, ledger and gateway behaviour
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CheckoutConfig {
    /// Window in which an identical pending payment is refused (0 disables)
    #[serde(default = "default_duplicate_window_secs")]
    pub duplicate_window_secs: u64,
    /// Idle lifetime of a checkout session before `purge_expired` drops it
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Largest accepted proof-of-payment upload in bytes (default: 5MB)
    #[serde(default = "default_max_proof_bytes")]
    pub max_proof_bytes: usize,
    /// Artificial latency of the simulated gateway
    #[serde(default)]
    pub gateway_latency_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            duplicate_window_secs: default_duplicate_window_secs(),
            session_ttl_secs: default_session_ttl_secs(),
            max_proof_bytes: default_max_proof_bytes(),
            gateway_latency_ms: 0,
        }
    }
}

impl CheckoutConfig {
    #[must_use]
    pub fn duplicate_window(&self) -> Duration {
        Duration::from_secs(self.duplicate_window_secs)
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    #[must_use]
    pub fn gateway_latency(&self) -> Duration {
        Duration::from_millis(self.gateway_latency_ms)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

fn default_duplicate_window_secs() -> u64 {
    600
}

fn default_session_ttl_secs() -> u64 {
    3600
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}

fn default_max_proof_bytes() -> usize {
    5 * 1024 * 1024 // 5MB default
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_checkout(mut self, checkout: CheckoutConfig) -> Self {
        self.config.checkout = checkout;
        self
    }

    /// Set the duplicate-submission window. Zero disables the check.
    ///
    /// Rounded up to whole seconds, so only an exact zero disables it.
    pub fn with_duplicate_window(mut self, window: Duration) -> Self {
        self.config.checkout.duplicate_window_secs = ceil_secs(window);
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.config.checkout.session_ttl_secs = ceil_secs(ttl);
        self
    }

    pub fn with_max_proof_bytes(mut self, max_proof_bytes: usize) -> Self {
        self.config.checkout.max_proof_bytes = max_proof_bytes;
        self
    }

    pub fn with_gateway_latency(mut self, latency: Duration) -> Self {
        self.config.checkout.gateway_latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Load configuration from environment variables with TENANTPAY_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }
        if let Some(window) = get_env_with_prefix("DUPLICATE_WINDOW_SECS") {
            if let Ok(secs) = window.parse() {
                self.config.checkout.duplicate_window_secs = secs;
            }
        }
        if let Some(ttl) = get_env_with_prefix("SESSION_TTL_SECS") {
            if let Ok(secs) = ttl.parse() {
                self.config.checkout.session_ttl_secs = secs;
            }
        }
        if let Some(max) = get_env_with_prefix("MAX_PROOF_BYTES") {
            if let Ok(bytes) = max.parse() {
                self.config.checkout.max_proof_bytes = bytes;
            }
        }
        if let Some(latency) = get_env_with_prefix("GATEWAY_LATENCY_MS") {
            if let Ok(ms) = latency.parse() {
                self.config.checkout.gateway_latency_ms = ms;
            }
        }

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Config` if:
    /// - The log level is not one of trace, debug, info, warn, error
    /// - The session TTL is zero
    /// - The maximum proof size is zero
    pub fn build(self) -> crate::error::Result<Config> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(BillingError::config(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if self.config.checkout.session_ttl_secs == 0 {
            return Err(BillingError::config(
                "Checkout session TTL must be greater than 0",
            ));
        }

        if self.config.checkout.max_proof_bytes == 0 {
            return Err(BillingError::config(
                "Maximum proof size must be greater than 0",
            ));
        }

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
