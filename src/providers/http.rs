//! Shared upstream plumbing: request description, reqwest dispatch and the
//! status/body classification every HTTP adapter relies on.

use std::time::Duration;

use metrics::counter;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::error::FetchError;
use crate::report::ProviderId;

const USER_AGENT: &str = "wetran/0.1 (+traffic dashboard backend)";
const MAX_MESSAGE_CHARS: usize = 200;

/// A GET request described as data, so auth can be attached (and tests can
/// inspect it) before anything touches the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl UpstreamRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[cfg(test)]
    pub(crate) fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// reqwest client shared by one adapter. The request timeout is a backstop;
/// the aggregator enforces its own bound around `execute`.
pub fn build_client(connect_timeout: Duration, timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .build()
}

/// Joins a configured base URL and a path without doubling slashes.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Sends `req` and returns the JSON body of a successful response.
pub async fn send_json(
    client: &Client,
    provider: ProviderId,
    req: &UpstreamRequest,
) -> Result<Value, FetchError> {
    let mut builder = client.get(&req.url).query(&req.query);
    for (k, v) in &req.headers {
        builder = builder.header(k.as_str(), v.as_str());
    }

    let resp = match builder.send().await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!(
                target: "provider",
                provider = %provider,
                timeout = e.is_timeout(),
                error = %e,
                "provider http error"
            );
            counter!("traffic_provider_transport_errors_total", "provider" => provider.slug())
                .increment(1);
            return Err(FetchError::UpstreamUnreachable);
        }
    };

    let status = resp.status();
    let body = resp.text().await.map_err(|e| {
        tracing::warn!(target: "provider", provider = %provider, error = %e, "reading body failed");
        FetchError::UpstreamUnreachable
    })?;

    classify_response(status.as_u16(), &body)
}

/// Maps an upstream status + body to either a JSON payload or a `FetchError`.
pub fn classify_response(status: u16, body: &str) -> Result<Value, FetchError> {
    if status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
        return Err(FetchError::RateLimited);
    }
    if !(200..300).contains(&status) {
        return Err(FetchError::UpstreamRejected {
            status,
            message: rejection_message(status, body),
        });
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(FetchError::NoDataForDomain);
    }
    let value: Value =
        serde_json::from_str(trimmed).map_err(|_| FetchError::UnparsableResponse)?;
    if is_empty_payload(&value) || is_not_found_marker(&value) {
        return Err(FetchError::NoDataForDomain);
    }
    Ok(value)
}

fn is_empty_payload(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

// `{"message": "Domain not found"}`-style bodies sent with a 200.
fn is_not_found_marker(v: &Value) -> bool {
    let Some(obj) = v.as_object() else {
        return false;
    };
    let only_meta = obj
        .keys()
        .all(|k| matches!(k.as_str(), "message" | "error" | "status" | "success"));
    let says_not_found = ["message", "error"].iter().any(|k| {
        obj.get(*k)
            .and_then(Value::as_str)
            .is_some_and(|s| {
                let s = s.to_ascii_lowercase();
                s.contains("not found") || s.contains("no data")
            })
    });
    only_meta && says_not_found
}

fn rejection_message(status: u16, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        ["message", "error"]
            .iter()
            .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
    });
    let msg = from_json.unwrap_or_else(|| body.trim().to_string());
    if msg.is_empty() {
        return StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("upstream error")
            .to_string();
    }
    msg.chars().take(MAX_MESSAGE_CHARS).collect()
}
