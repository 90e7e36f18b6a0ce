// src/bootstrap.rs
//! Wires config into a ready aggregator: HTTP client, auth backend,
//! session (optionally persisted) and the configured adapters.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::aggregator::TrafficAggregator;
use crate::config::DashboardConfig;
use crate::providers::fixture::FixtureProvider;
use crate::providers::http::build_client;
use crate::providers::internal::InternalStatsProvider;
use crate::providers::similarweb::SimilarWebProvider;
use crate::providers::traffic_api::TrafficApiProvider;
use crate::session::auth::HttpAuthBackend;
use crate::session::persist::FileTokenStore;
use crate::session::Session;

pub fn build_session(cfg: &DashboardConfig, client: reqwest::Client) -> Session {
    let backend = Arc::new(HttpAuthBackend::new(cfg.auth.base_url.clone(), client));
    match &cfg.auth.token_file {
        Some(path) => {
            info!(target: "session", path = %path.display(), "session persistence enabled");
            Session::restore(backend, Arc::new(FileTokenStore::new(path)))
        }
        None => Session::new(backend),
    }
}

pub fn build_aggregator(cfg: &DashboardConfig) -> Result<TrafficAggregator> {
    let client = build_client(cfg.connect_timeout(), cfg.upstream_timeout())
        .context("building upstream HTTP client")?;

    let session = Arc::new(build_session(cfg, client.clone()));
    let mut builder = TrafficAggregator::builder(session)
        .cache_ttl(cfg.cache_ttl())
        .upstream_timeout(cfg.upstream_timeout());

    if let Some(base) = cfg.internal_base_url() {
        builder = builder.provider(Arc::new(InternalStatsProvider::new(base, client.clone())));
    }
    if let Some(sw) = &cfg.providers.similarweb {
        builder = builder.provider(Arc::new(SimilarWebProvider::new(
            sw.base_url.clone(),
            sw.rapidapi_host.clone(),
            sw.api_key.clone(),
            client.clone(),
        )));
    }
    if let Some(ta) = &cfg.providers.trafficapi {
        builder = builder.provider(Arc::new(TrafficApiProvider::new(
            ta.base_url.clone(),
            ta.api_key.clone(),
            client.clone(),
        )));
    }
    if cfg.providers.fixture {
        let fixture = FixtureProvider::builtin();
        info!(target: "bootstrap", domains = ?fixture.domains(), "fixture provider enabled");
        builder = builder.provider(Arc::new(fixture));
    }

    Ok(builder.build())
}
