// tests/providers_http.rs
//
// HTTP adapters against a local mock upstream (httpmock).
//
// Covered:
// - SimilarWeb-like: request shape (domain query + RapidAPI headers) and a
//   full payload through normalization
// - TrafficAPI-like: url/apiKey query, labels/values series
// - classification: 429 -> RateLimited, 500 -> UpstreamRejected,
//   bad JSON -> UnparsableResponse, empty/{} -> NoDataForDomain,
//   dead host -> UpstreamUnreachable

use std::time::Duration;

use chrono::Utc;
use httpmock::prelude::*;
use serde_json::json;

use wetran::normalize::{normalize, NormalizeContext};
use wetran::providers::http::build_client;
use wetran::providers::similarweb::SimilarWebProvider;
use wetran::providers::traffic_api::TrafficApiProvider;
use wetran::providers::TrafficProvider;
use wetran::{FetchError, Metric, ProviderId};

fn client() -> reqwest::Client {
    build_client(Duration::from_secs(2), Duration::from_secs(5)).expect("client")
}

fn similarweb(server: &MockServer) -> SimilarWebProvider {
    SimilarWebProvider::new(server.base_url(), "sw.test.host", "sw-key", client())
}

fn trafficapi(server: &MockServer) -> TrafficApiProvider {
    TrafficApiProvider::new(server.base_url(), "ta-key", client())
}

fn ctx(domain: &str) -> NormalizeContext<'_> {
    NormalizeContext {
        domain,
        fetched_at: Utc::now(),
    }
}

#[tokio::test]
async fn similarweb_request_and_payload_normalize() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/traffic")
                .query_param("domain", "example.com")
                .header("x-rapidapi-key", "sw-key")
                .header("x-rapidapi-host", "sw.test.host");
            then.status(200).json_body(json!({
                "SiteName": "example.com",
                "EstimatedMonthlyVisits": {
                    "2024-03-01": 1300,
                    "2024-01-01": 1100,
                    "2024-02-01": "1,200"
                },
                "Engagments": {
                    "Visits": "1234567",
                    "TimeOnSite": "185.4",
                    "PagePerVisit": "N/A",
                    "BounceRate": "0.45"
                },
                "GlobalRank": { "Rank": 1204 },
                "TrafficSources": { "Direct": 45, "Search": 55 },
                "TopCountryShares": [
                    { "CountryCode": "US", "Name": "United States", "Value": 0.45 }
                ],
                "TopKeywords": [
                    { "Name": "example", "Volume": 12000 },
                    { "Name": "sample", "Volume": null }
                ]
            }));
        })
        .await;

    let provider = similarweb(&server);
    let raw = provider.query("example.com").await.expect("query");
    m.assert_async().await;

    let report = normalize(ProviderId::SimilarWebLike, raw, &ctx("example.com")).unwrap();
    assert_eq!(report.monthly_visits, Metric::Known(1_234_567));
    assert_eq!(report.avg_time_on_site_seconds, Metric::Known(185.4));
    assert_eq!(report.pages_per_visit, Metric::Unknown, "N/A is unknown, not 0");
    assert_eq!(report.global_rank, Metric::Known(1204));

    let months: Vec<u32> = report.monthly_series.iter().map(|p| p.period.month).collect();
    assert_eq!(months, vec![1, 2, 3], "date keys sorted chronologically");
    assert_eq!(report.monthly_series[1].value, 1200.0);

    let direct = report.traffic_sources.get("Direct").unwrap().get();
    let search = report.traffic_sources.get("Search").unwrap().get();
    assert!((direct - 0.45).abs() < 1e-9);
    assert!((search - 0.55).abs() < 1e-9);

    assert_eq!(report.top_keywords[1].volume, Metric::Unknown);
}

#[tokio::test]
async fn trafficapi_request_carries_url_and_key() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/website/traffic")
                .query_param("url", "example.com")
                .query_param("apiKey", "ta-key");
            then.status(200).json_body(json!({
                "traffic": {
                    "overview": "Steady growth.",
                    "labels": ["Jan", "Feb", "Mar"],
                    "values": [100, 120, 140]
                },
                "backlinks": { "total": 5400 },
                "seoScore": 71
            }));
        })
        .await;

    let raw = trafficapi(&server).query("example.com").await.expect("query");
    assert_eq!(m.hits_async().await, 1);

    let report = normalize(ProviderId::TrafficApiLike, raw, &ctx("example.com")).unwrap();
    assert_eq!(report.monthly_series.len(), 3);
    assert_eq!(report.overview.as_deref(), Some("Steady growth."));
    assert_eq!(report.backlinks, Metric::Known(5400));
    assert_eq!(report.seo_score, Metric::Known(71.0));
}

#[tokio::test]
async fn status_429_is_rate_limited() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/traffic");
            then.status(429).body("Too many requests");
        })
        .await;

    assert_eq!(
        similarweb(&server).query("example.com").await,
        Err(FetchError::RateLimited)
    );
}

#[tokio::test]
async fn status_500_is_rejected_with_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/website/traffic");
            then.status(500).json_body(json!({ "message": "internal failure" }));
        })
        .await;

    assert_eq!(
        trafficapi(&server).query("example.com").await,
        Err(FetchError::UpstreamRejected {
            status: 500,
            message: "internal failure".into()
        })
    );
}

#[tokio::test]
async fn non_json_body_is_unparsable() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/traffic");
            then.status(200).body("<html>maintenance</html>");
        })
        .await;

    assert_eq!(
        similarweb(&server).query("example.com").await,
        Err(FetchError::UnparsableResponse)
    );
}

#[tokio::test]
async fn wrong_shape_is_unparsable() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/website/traffic");
            then.status(200).json_body(json!({ "traffic": "not an object" }));
        })
        .await;

    assert_eq!(
        trafficapi(&server).query("example.com").await,
        Err(FetchError::UnparsableResponse)
    );
}

#[tokio::test]
async fn empty_bodies_mean_no_data() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/traffic").query_param("domain", "empty.com");
            then.status(200).body("");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/traffic").query_param("domain", "blank.com");
            then.status(200).json_body(json!({}));
        })
        .await;

    let p = similarweb(&server);
    assert_eq!(p.query("empty.com").await, Err(FetchError::NoDataForDomain));
    assert_eq!(p.query("blank.com").await, Err(FetchError::NoDataForDomain));
}

#[tokio::test]
async fn dead_upstream_is_unreachable() {
    // Port 9 (discard) on localhost is closed in test environments.
    let provider = TrafficApiProvider::new("http://127.0.0.1:9", "k", client());
    assert_eq!(
        provider.query("example.com").await,
        Err(FetchError::UpstreamUnreachable)
    );
}
