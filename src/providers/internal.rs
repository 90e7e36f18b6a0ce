use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::http::{join_url, send_json, UpstreamRequest};
use super::{checked_domain, decode_payload, RawResponse, TrafficProvider};
use crate::error::FetchError;
use crate::report::ProviderId;

/// `GET {base}/traffic/stats?website=<domain>` on the dashboard's own
/// backend. Every field is optional; values may be numbers, numeric strings
/// or `"N/A"`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalStatsPayload {
    pub website: Option<String>,
    pub visits: Option<Value>,
    #[serde(alias = "avgTimeOnSite")]
    pub avg_visit_duration: Option<Value>,
    pub pages_per_visit: Option<Value>,
    pub global_rank: Option<Value>,
    /// ISO date -> visit count.
    pub monthly_visits: Option<Map<String, Value>>,
    /// Source name -> share (fraction or percent).
    pub traffic_sources: Option<Map<String, Value>>,
    pub top_countries: Option<Vec<InternalCountry>>,
    pub top_keywords: Option<Vec<InternalKeyword>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalCountry {
    pub country_code: Option<String>,
    pub name: Option<String>,
    pub share: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InternalKeyword {
    pub term: Option<String>,
    pub volume: Option<Value>,
}

pub struct InternalStatsProvider {
    base_url: String,
    client: Client,
}

impl InternalStatsProvider {
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl TrafficProvider for InternalStatsProvider {
    fn id(&self) -> ProviderId {
        ProviderId::InternalStats
    }

    fn requires_auth(&self) -> bool {
        true
    }

    fn build_request(&self, domain: &str) -> Result<UpstreamRequest, FetchError> {
        let domain = checked_domain(domain)?;
        Ok(UpstreamRequest::get(join_url(&self.base_url, "traffic/stats"))
            .with_query("website", domain))
    }

    async fn execute(&self, request: UpstreamRequest) -> Result<RawResponse, FetchError> {
        let body = send_json(&self.client, self.id(), &request).await?;
        decode_payload(self.id(), body).map(RawResponse::InternalStats)
    }
}
