// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregator;
pub mod api;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod projection;
pub mod providers;
pub mod report;
pub mod session;

// ---- Re-exports for stable public API ----
pub use crate::aggregator::{CacheStatus, FetchOptions, TrafficAggregator};
pub use crate::config::DashboardConfig;
pub use crate::error::FetchError;
pub use crate::report::{Metric, ProviderId, TrafficReport};

use axum::Router;

use crate::api::{create_router, AppState};
use crate::metrics::Metrics;

/// Router over an already built aggregator, without `/metrics`.
pub fn router(aggregator: TrafficAggregator) -> Router {
    create_router(AppState { aggregator })
}

/// Full application from an explicit config: API routes plus `/metrics`.
pub fn app_with_config(cfg: &DashboardConfig) -> anyhow::Result<Router> {
    let aggregator = bootstrap::build_aggregator(cfg)?;
    let metrics = Metrics::init(cfg.cache.ttl_secs)?;
    Ok(router(aggregator).merge(metrics.router()))
}

/// Full application from `config/dashboard.toml` (or `$WETRAN_CONFIG_PATH`).
pub async fn app() -> anyhow::Result<Router> {
    let cfg = DashboardConfig::load_default()?;
    app_with_config(&cfg)
}
