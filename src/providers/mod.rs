// src/providers/mod.rs
//! Upstream traffic data sources behind one capability set.
//!
//! Each adapter turns a domain into an [`UpstreamRequest`], executes it and
//! classifies the outcome into a provider-specific [`RawResponse`] or a
//! [`FetchError`]. Swapping the data source never changes caller code.

pub mod fixture;
pub mod http;
pub mod internal;
pub mod similarweb;
pub mod traffic_api;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::report::ProviderId;

pub use self::http::UpstreamRequest;
use self::internal::InternalStatsPayload;
use self::similarweb::SimilarWebPayload;
use self::traffic_api::TrafficApiPayload;

/// A successfully classified upstream payload, still in provider shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    InternalStats(InternalStatsPayload),
    SimilarWeb(SimilarWebPayload),
    TrafficApi(TrafficApiPayload),
    /// Fixture rows share the TrafficAPI layout.
    Fixture(TrafficApiPayload),
}

impl RawResponse {
    pub fn provider(&self) -> ProviderId {
        match self {
            RawResponse::InternalStats(_) => ProviderId::InternalStats,
            RawResponse::SimilarWeb(_) => ProviderId::SimilarWebLike,
            RawResponse::TrafficApi(_) => ProviderId::TrafficApiLike,
            RawResponse::Fixture(_) => ProviderId::FixtureTable,
        }
    }
}

#[async_trait]
pub trait TrafficProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Gated providers need a session token attached before dispatch.
    fn requires_auth(&self) -> bool {
        false
    }

    /// Describes the upstream call for `domain`. No I/O.
    fn build_request(&self, domain: &str) -> Result<UpstreamRequest, FetchError>;

    async fn execute(&self, request: UpstreamRequest) -> Result<RawResponse, FetchError>;

    /// Build + execute without auth. The aggregator goes through
    /// `build_request`/`execute` itself so it can attach the session token.
    async fn query(&self, domain: &str) -> Result<RawResponse, FetchError> {
        let request = self.build_request(domain)?;
        self.execute(request).await
    }
}

pub type DynProvider = Arc<dyn TrafficProvider>;

/// Local precondition shared by all adapters: trimmed and non-empty.
pub(crate) fn checked_domain(domain: &str) -> Result<&str, FetchError> {
    let d = domain.trim();
    if d.is_empty() {
        return Err(FetchError::InvalidDomain(domain.to_string()));
    }
    Ok(d)
}

/// Shape check: converts the classified JSON body into the provider's
/// payload type, or `UnparsableResponse`.
pub(crate) fn decode_payload<T: serde::de::DeserializeOwned>(
    provider: ProviderId,
    value: serde_json::Value,
) -> Result<T, FetchError> {
    serde_json::from_value(value).map_err(|e| {
        tracing::warn!(target: "provider", provider = %provider, error = %e, "payload shape mismatch");
        metrics::counter!("traffic_provider_shape_errors_total", "provider" => provider.slug())
            .increment(1);
        FetchError::UnparsableResponse
    })
}
