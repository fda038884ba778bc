//! tenantpay - subscription billing and payment reconciliation for
//! multi-tenant SaaS
//!
//! Tenants move between subscription plans by paying through an online
//! gateway (Stripe, Flutterwave, Paystack) or by manual bank transfer
//! verified by an operator. The crate keeps a transaction ledger as the
//! source of truth and applies plan changes only for settled payments.
//!
//! # Features
//!
//! - **Checkout**: per-attempt state machine with duplicate-submission guard
//! - **Ledger**: atomic settlement with optimistic status transitions
//! - **Review**: admin queue for manual payments with proof of payment
//! - **Audit**: trait-based audit trail, tracing-backed by default
//! - **API** (`api` feature): Axum router exposing the whole flow as JSON
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenantpay::{ConfigBuilder, billing::{BillingService, InMemoryBillingStore}};
//!
//! # fn main() -> tenantpay::Result<()> {
//! let config = ConfigBuilder::new().from_env().build()?;
//! tenantpay::init_tracing_with_config(&config);
//!
//! let billing = BillingService::builder()
//!     .with_store(Arc::new(InMemoryBillingStore::new()))
//!     .with_config(config.checkout)
//!     .build()?;
//! # let _ = billing;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "api")]
pub mod api;
pub mod billing;
mod config;
mod error;
pub mod utils;

// Re-exports for public API
pub use config::{CheckoutConfig, Config, ConfigBuilder, LoggingConfig};
pub use error::{BillingError, Result};
#[cfg(feature = "api")]
pub use error::ErrorResponse;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "tenantpay=debug")
/// - `TENANTPAY_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = utils::get_env_with_prefix("LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    install(env_filter, json_logs);
}

/// Initialize tracing with a custom configuration
pub fn init_tracing_with_config(config: &Config) {
    install(EnvFilter::new(&config.logging.level), config.logging.json);
}

fn install(env_filter: EnvFilter, json: bool) {
    // A subscriber may already be installed (tests, embedding apps).
    let result = if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };
    if let Err(err) = result {
        tracing::debug!(error = %err, "Tracing subscriber already installed");
    }
}
