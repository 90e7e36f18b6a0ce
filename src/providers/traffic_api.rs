use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::http::{join_url, send_json, UpstreamRequest};
use super::{checked_domain, decode_payload, RawResponse, TrafficProvider};
use crate::error::FetchError;
use crate::report::ProviderId;

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficApiPayload {
    pub traffic: Option<TrafficBlock>,
    pub backlinks: Option<Backlinks>,
    pub seo_score: Option<Value>,
}

/// Parallel `labels`/`values` arrays, e.g. `["Jan", ...]` / `[200, ...]`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TrafficBlock {
    pub overview: Option<String>,
    pub labels: Option<Vec<Value>>,
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Backlinks {
    pub total: Option<Value>,
}

/// `GET {base}/website/traffic?url=<domain>&apiKey=<key>`.
pub struct TrafficApiProvider {
    base_url: String,
    api_key: String,
    client: Client,
}

impl TrafficApiProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client,
        }
    }
}

#[async_trait]
impl TrafficProvider for TrafficApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::TrafficApiLike
    }

    fn build_request(&self, domain: &str) -> Result<UpstreamRequest, FetchError> {
        let domain = checked_domain(domain)?;
        Ok(UpstreamRequest::get(join_url(&self.base_url, "website/traffic"))
            .with_query("url", domain)
            .with_query("apiKey", self.api_key.as_str()))
    }

    async fn execute(&self, request: UpstreamRequest) -> Result<RawResponse, FetchError> {
        let body = send_json(&self.client, self.id(), &request).await?;
        decode_payload(self.id(), body).map(RawResponse::TrafficApi)
    }
}
