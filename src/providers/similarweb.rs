use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::http::{join_url, send_json, UpstreamRequest};
use super::{checked_domain, decode_payload, RawResponse, TrafficProvider};
use crate::error::FetchError;
use crate::report::ProviderId;

pub const DEFAULT_RAPIDAPI_HOST: &str = "similarweb-traffic.p.rapidapi.com";

/// SimilarWeb-style body. Key spellings (including `Engagments`) follow
/// the upstream verbatim.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SimilarWebPayload {
    pub site_name: Option<String>,
    /// ISO date -> visit count.
    pub estimated_monthly_visits: Option<Map<String, Value>>,
    #[serde(alias = "Engagements")]
    pub engagments: Option<Engagements>,
    pub global_rank: Option<GlobalRank>,
    /// Source name -> share, 0-100 or 0-1 depending on plan.
    pub traffic_sources: Option<Map<String, Value>>,
    pub top_country_shares: Option<Vec<CountryShareRow>>,
    pub top_keywords: Option<Vec<KeywordRow>>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Engagements {
    pub visits: Option<Value>,
    pub time_on_site: Option<Value>,
    pub page_per_visit: Option<Value>,
    pub bounce_rate: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GlobalRank {
    pub rank: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CountryShareRow {
    pub country_code: Option<String>,
    pub name: Option<String>,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeywordRow {
    pub name: Option<String>,
    pub volume: Option<Value>,
}

/// `GET {base}/traffic?domain=<domain>` with RapidAPI key headers.
pub struct SimilarWebProvider {
    base_url: String,
    rapidapi_host: String,
    api_key: String,
    client: Client,
}

impl SimilarWebProvider {
    pub fn new(
        base_url: impl Into<String>,
        rapidapi_host: impl Into<String>,
        api_key: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            rapidapi_host: rapidapi_host.into(),
            api_key: api_key.into(),
            client,
        }
    }
}

#[async_trait]
impl TrafficProvider for SimilarWebProvider {
    fn id(&self) -> ProviderId {
        ProviderId::SimilarWebLike
    }

    fn build_request(&self, domain: &str) -> Result<UpstreamRequest, FetchError> {
        let domain = checked_domain(domain)?;
        Ok(UpstreamRequest::get(join_url(&self.base_url, "traffic"))
            .with_query("domain", domain)
            .with_header("X-Rapidapi-Key", self.api_key.as_str())
            .with_header("X-Rapidapi-Host", self.rapidapi_host.as_str()))
    }

    async fn execute(&self, request: UpstreamRequest) -> Result<RawResponse, FetchError> {
        let body = send_json(&self.client, self.id(), &request).await?;
        decode_payload(self.id(), body).map(RawResponse::SimilarWeb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_domain_and_key_headers() {
        let p = SimilarWebProvider::new("https://sw.example/", DEFAULT_RAPIDAPI_HOST, "k-123", Client::new());
        let req = p.build_request("  google.com ").unwrap();
        assert_eq!(req.url, "https://sw.example/traffic");
        assert_eq!(req.query_value("domain"), Some("google.com"));
        assert_eq!(req.header("X-Rapidapi-Key"), Some("k-123"));
        assert_eq!(req.header("X-Rapidapi-Host"), Some(DEFAULT_RAPIDAPI_HOST));
    }

    #[test]
    fn empty_domain_fails_before_any_io() {
        let p = SimilarWebProvider::new("https://sw.example", DEFAULT_RAPIDAPI_HOST, "k", Client::new());
        assert!(matches!(
            p.build_request("   "),
            Err(FetchError::InvalidDomain(_))
        ));
    }

    #[test]
    fn wrong_field_types_fail_the_shape_check() {
        let v = serde_json::json!({ "TopCountryShares": "US" });
        let res: Result<SimilarWebPayload, _> = decode_payload(ProviderId::SimilarWebLike, v);
        assert_eq!(res, Err(FetchError::UnparsableResponse));
    }
}
