// src/projection.rs
//! Renderer-ready views of a [`TrafficReport`].
//!
//! Pure functions; an empty report yields empty vectors, never a panic.
//! Unknown metrics render as text (`"unknown"`, `"N/A"`) instead of zero.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::report::{Metric, TrafficReport};

pub const UNKNOWN_TEXT: &str = "unknown";
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryValue {
    pub category: String,
    /// Fraction in `[0, 1]`.
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryRow {
    pub country_code: String,
    pub name: String,
    pub share: Option<f64>,
    pub share_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordRow {
    pub term: String,
    pub volume: Option<u64>,
    pub volume_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCard {
    pub label: &'static str,
    pub value_text: String,
}

/// Everything the dashboard page renders for one report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub domain: String,
    pub cards: Vec<MetricCard>,
    pub series: Vec<SeriesPoint>,
    pub sources: Vec<CategoryValue>,
    pub countries: Vec<CountryRow>,
    pub keywords: Vec<KeywordRow>,
    pub overview: Option<String>,
}

/// Month-labelled points in report order. A series that spans more than
/// one calendar year gets `"Jan 2024"`-style labels so they stay distinct.
pub fn time_series(report: &TrafficReport) -> Vec<SeriesPoint> {
    let years: BTreeSet<i32> = report
        .monthly_series
        .iter()
        .filter_map(|p| p.period.year)
        .collect();
    let with_year = years.len() > 1;

    report
        .monthly_series
        .iter()
        .filter(|p| p.value.is_finite())
        .map(|p| {
            let label = match (with_year, p.period.year) {
                (true, Some(y)) => format!("{} {y}", p.period.abbr()),
                _ => p.period.abbr().to_string(),
            };
            SeriesPoint {
                label,
                value: p.value,
            }
        })
        .collect()
}

pub fn source_distribution(report: &TrafficReport) -> Vec<CategoryValue> {
    report
        .traffic_sources
        .iter()
        .map(|(name, share)| CategoryValue {
            category: name.to_string(),
            value: share.get(),
        })
        .collect()
}

pub fn country_rows(report: &TrafficReport) -> Vec<CountryRow> {
    report
        .top_countries
        .iter()
        .map(|c| {
            let share = c.share.known();
            CountryRow {
                country_code: c.country_code.clone(),
                name: c.name.clone(),
                share: share.map(|s| s.get()),
                share_text: share
                    .map(|s| s.percent_text())
                    .unwrap_or_else(|| UNKNOWN_TEXT.to_string()),
            }
        })
        .collect()
}

pub fn keyword_rows(report: &TrafficReport) -> Vec<KeywordRow> {
    report
        .top_keywords
        .iter()
        .map(|k| {
            let volume = k.volume.known();
            KeywordRow {
                term: k.term.clone(),
                volume,
                volume_text: volume
                    .map(|v| format!("{} searches", group_thousands(v)))
                    .unwrap_or_else(|| UNKNOWN_TEXT.to_string()),
            }
        })
        .collect()
}

/// Headline numbers: visits, time on site, pages per visit, global rank.
pub fn metric_cards(report: &TrafficReport) -> Vec<MetricCard> {
    vec![
        card(
            "Monthly visits",
            report.monthly_visits.map(group_thousands),
        ),
        card(
            "Avg. time on site",
            report.avg_time_on_site_seconds.map(duration_text),
        ),
        card(
            "Pages per visit",
            report.pages_per_visit.map(|v| format!("{v:.2}")),
        ),
        card(
            "Global rank",
            report.global_rank.map(|r| format!("#{}", group_thousands(r))),
        ),
    ]
}

pub fn dashboard_view(report: &TrafficReport) -> DashboardView {
    DashboardView {
        domain: report.domain.clone(),
        cards: metric_cards(report),
        series: time_series(report),
        sources: source_distribution(report),
        countries: country_rows(report),
        keywords: keyword_rows(report),
        overview: report.overview.clone(),
    }
}

fn card(label: &'static str, value: Metric<String>) -> MetricCard {
    MetricCard {
        label,
        value_text: value.known().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    }
}

/// `1234567` -> `"1,234,567"`
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `185.4` -> `"3m 05s"`; under a minute -> `"42s"`.
fn duration_text(secs: f64) -> String {
    let total = secs.round() as u64;
    let (m, s) = (total / 60, total % 60);
    if m == 0 {
        format!("{s}s")
    } else {
        format!("{m}m {s:02}s")
    }
}
