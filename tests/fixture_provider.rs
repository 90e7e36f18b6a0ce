// tests/fixture_provider.rs
//
// The fixture table end to end: adapter -> normalization -> projections.

use chrono::Utc;
use wetran::normalize::{normalize, NormalizeContext};
use wetran::projection::{dashboard_view, time_series};
use wetran::providers::fixture::FixtureProvider;
use wetran::providers::TrafficProvider;
use wetran::{FetchError, Metric, ProviderId};

#[tokio::test]
async fn google_fixture_normalizes_to_twelve_monthly_points() {
    let provider = FixtureProvider::builtin();
    let raw = provider.query("google.com").await.expect("fixture row");

    let ctx = NormalizeContext {
        domain: "google.com",
        fetched_at: Utc::now(),
    };
    let report = normalize(ProviderId::FixtureTable, raw, &ctx).expect("normalize");

    assert_eq!(report.domain, "google.com");
    assert_eq!(report.source_provider, ProviderId::FixtureTable);
    assert_eq!(report.monthly_series.len(), 12);
    assert_eq!(report.global_rank, Metric::Unknown, "fixture carries no rank");
    assert_eq!(report.backlinks, Metric::Known(50_000_000));
    assert_eq!(report.seo_score, Metric::Known(98.0));

    let series = time_series(&report);
    let labels: Vec<&str> = series.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"]
    );
    assert_eq!(series.first().map(|p| p.value), Some(200.0));
    assert_eq!(series.last().map(|p| p.value), Some(600.0));

    let view = dashboard_view(&report);
    assert_eq!(
        view.overview.as_deref(),
        Some("Google sees billions of visitors every day.")
    );
    assert!(view.sources.is_empty());
}

#[tokio::test]
async fn unknown_domain_has_no_data() {
    let provider = FixtureProvider::builtin();
    assert_eq!(
        provider.query("unknown-domain.test").await,
        Err(FetchError::NoDataForDomain)
    );
}

#[tokio::test]
async fn fixture_rows_can_be_loaded_from_json() {
    let json = std::fs::read_to_string("tests/fixtures/trafficapi_example_com.json")
        .expect("missing tests/fixtures/trafficapi_example_com.json");
    let payload = serde_json::from_str(&json).expect("trafficapi shape");

    let provider = FixtureProvider::empty().with_entry("example.com", payload);
    assert_eq!(provider.domains(), vec!["example.com"]);

    let raw = provider.query("example.com").await.expect("row");
    let ctx = NormalizeContext {
        domain: "example.com",
        fetched_at: Utc::now(),
    };
    let report = normalize(ProviderId::FixtureTable, raw, &ctx).expect("normalize");
    assert_eq!(report.monthly_series.len(), 3);
    assert_eq!(report.backlinks, Metric::Known(1_200));
    assert_eq!(report.seo_score, Metric::Unknown, "\"N/A\" stays unknown");
}
