//! In-memory fixture table: same contract as the network adapters, no I/O.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use super::traffic_api::{Backlinks, TrafficApiPayload, TrafficBlock};
use super::{checked_domain, RawResponse, TrafficProvider, UpstreamRequest};
use crate::error::FetchError;
use crate::report::ProviderId;

const FIXTURE_SCHEME: &str = "fixture://";

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub struct FixtureProvider {
    table: HashMap<String, TrafficApiPayload>,
}

impl FixtureProvider {
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// The two sample sites the dashboard ships with.
    pub fn builtin() -> Self {
        Self::empty()
            .with_entry(
                "google.com",
                sample(
                    "Google sees billions of visitors every day.",
                    [200, 250, 300, 320, 350, 370, 390, 400, 450, 500, 550, 600],
                    50_000_000,
                    98,
                ),
            )
            .with_entry(
                "facebook.com",
                sample(
                    "Facebook remains one of the top social platforms globally.",
                    [150, 180, 210, 230, 250, 270, 290, 300, 320, 350, 380, 400],
                    30_000_000,
                    95,
                ),
            )
    }

    /// Keys are matched exactly; callers pass normalized domains.
    pub fn with_entry(mut self, domain: impl Into<String>, payload: TrafficApiPayload) -> Self {
        self.table.insert(domain.into(), payload);
        self
    }

    pub fn domains(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.table.keys().map(String::as_str).collect();
        v.sort_unstable();
        v
    }
}

fn sample(overview: &str, values: [u64; 12], backlinks: u64, seo_score: u64) -> TrafficApiPayload {
    TrafficApiPayload {
        traffic: Some(TrafficBlock {
            overview: Some(overview.to_string()),
            labels: Some(MONTHS.iter().map(|m| Value::from(*m)).collect()),
            values: Some(values.iter().map(|v| Value::from(*v)).collect()),
        }),
        backlinks: Some(Backlinks {
            total: Some(Value::from(backlinks)),
        }),
        seo_score: Some(Value::from(seo_score)),
    }
}

#[async_trait]
impl TrafficProvider for FixtureProvider {
    fn id(&self) -> ProviderId {
        ProviderId::FixtureTable
    }

    fn build_request(&self, domain: &str) -> Result<UpstreamRequest, FetchError> {
        let domain = checked_domain(domain)?;
        Ok(UpstreamRequest::get(format!("{FIXTURE_SCHEME}{domain}")))
    }

    async fn execute(&self, request: UpstreamRequest) -> Result<RawResponse, FetchError> {
        let key = request
            .url
            .strip_prefix(FIXTURE_SCHEME)
            .unwrap_or(request.url.as_str());
        self.table
            .get(key)
            .cloned()
            .map(RawResponse::Fixture)
            .ok_or(FetchError::NoDataForDomain)
    }
}
