//! # Normalization
//! Provider payload -> canonical [`TrafficReport`].
//!
//! - Date-keyed visit maps become a chronological `monthly_series`.
//! - Share maps reported on a 0-100 scale are rescaled to 0.0-1.0.
//! - `"N/A"`, `null`, empty or non-numeric values become `Metric::Unknown`,
//!   never `0`.
//! - A payload with no recognizable field at all is `UnparsableResponse`.
//!
//! Pure and deterministic: `fetched_at` is supplied by the caller.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::FetchError;
use crate::providers::internal::InternalStatsPayload;
use crate::providers::similarweb::SimilarWebPayload;
use crate::providers::traffic_api::TrafficApiPayload;
use crate::providers::RawResponse;
use crate::report::{
    CountryShare, Keyword, Metric, MonthlyPoint, Period, ProviderId, Share, SourceShares,
    TrafficReport,
};

/// Share lists summing above this are taken to be percentages.
/// Any share above this marks the whole list as 0-100.
const PERCENT_SCALE_THRESHOLD: f64 = 1.0;
const SEO_SCORE_MAX: f64 = 100.0;

pub struct NormalizeContext<'a> {
    pub domain: &'a str,
    pub fetched_at: DateTime<Utc>,
}

pub fn normalize(
    provider: ProviderId,
    raw: RawResponse,
    ctx: &NormalizeContext<'_>,
) -> Result<TrafficReport, FetchError> {
    if raw.provider() != provider {
        tracing::warn!(
            target: "normalize",
            expected = %provider,
            got = %raw.provider(),
            "payload from unexpected provider"
        );
        return Err(FetchError::UnparsableResponse);
    }

    match raw {
        RawResponse::InternalStats(p) => from_internal(p, ctx),
        RawResponse::SimilarWeb(p) => from_similarweb(p, ctx),
        RawResponse::TrafficApi(p) => from_traffic_api(p, ProviderId::TrafficApiLike, ctx),
        RawResponse::Fixture(p) => from_traffic_api(p, ProviderId::FixtureTable, ctx),
    }
}

fn from_similarweb(
    p: SimilarWebPayload,
    ctx: &NormalizeContext<'_>,
) -> Result<TrafficReport, FetchError> {
    let recognized = p.estimated_monthly_visits.is_some()
        || p.engagments.is_some()
        || p.global_rank.is_some()
        || p.traffic_sources.is_some()
        || p.top_country_shares.is_some()
        || p.top_keywords.is_some();
    if !recognized {
        return Err(FetchError::UnparsableResponse);
    }

    let mut report = TrafficReport::empty(ctx.domain, ProviderId::SimilarWebLike, ctx.fetched_at);

    if let Some(eng) = &p.engagments {
        report.monthly_visits = count(eng.visits.as_ref());
        report.avg_time_on_site_seconds = seconds(eng.time_on_site.as_ref());
        report.pages_per_visit = non_negative(eng.page_per_visit.as_ref());
    }
    report.global_rank = rank(p.global_rank.as_ref().and_then(|g| g.rank.as_ref()));

    if let Some(map) = &p.estimated_monthly_visits {
        report.monthly_series = series_from_date_map(map);
    }
    if let Some(map) = &p.traffic_sources {
        report.traffic_sources = share_map(map);
    }
    if let Some(rows) = &p.top_country_shares {
        report.top_countries = countries(
            rows.iter()
                .map(|r| (r.country_code.as_deref(), r.name.as_deref(), r.value.as_ref())),
        );
    }
    if let Some(rows) = &p.top_keywords {
        report.top_keywords = keywords(
            rows.iter()
                .map(|r| (r.name.as_deref(), r.volume.as_ref())),
        );
    }

    Ok(report)
}

fn from_internal(
    p: InternalStatsPayload,
    ctx: &NormalizeContext<'_>,
) -> Result<TrafficReport, FetchError> {
    let recognized = p.visits.is_some()
        || p.avg_visit_duration.is_some()
        || p.pages_per_visit.is_some()
        || p.global_rank.is_some()
        || p.monthly_visits.is_some()
        || p.traffic_sources.is_some()
        || p.top_countries.is_some()
        || p.top_keywords.is_some();
    if !recognized {
        return Err(FetchError::UnparsableResponse);
    }

    let mut report = TrafficReport::empty(ctx.domain, ProviderId::InternalStats, ctx.fetched_at);
    report.monthly_visits = count(p.visits.as_ref());
    report.avg_time_on_site_seconds = seconds(p.avg_visit_duration.as_ref());
    report.pages_per_visit = non_negative(p.pages_per_visit.as_ref());
    report.global_rank = rank(p.global_rank.as_ref());

    if let Some(map) = &p.monthly_visits {
        report.monthly_series = series_from_date_map(map);
    }
    if let Some(map) = &p.traffic_sources {
        report.traffic_sources = share_map(map);
    }
    if let Some(rows) = &p.top_countries {
        report.top_countries = countries(
            rows.iter()
                .map(|r| (r.country_code.as_deref(), r.name.as_deref(), r.share.as_ref())),
        );
    }
    if let Some(rows) = &p.top_keywords {
        report.top_keywords = keywords(rows.iter().map(|r| (r.term.as_deref(), r.volume.as_ref())));
    }

    Ok(report)
}

fn from_traffic_api(
    p: TrafficApiPayload,
    provider: ProviderId,
    ctx: &NormalizeContext<'_>,
) -> Result<TrafficReport, FetchError> {
    if p.traffic.is_none() && p.backlinks.is_none() && p.seo_score.is_none() {
        return Err(FetchError::UnparsableResponse);
    }

    let mut report = TrafficReport::empty(ctx.domain, provider, ctx.fetched_at);

    if let Some(traffic) = &p.traffic {
        report.overview = traffic
            .overview
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let labels = traffic.labels.as_deref().unwrap_or_default();
        let values = traffic.values.as_deref().unwrap_or_default();
        if labels.len() != values.len() {
            tracing::debug!(
                target: "normalize",
                labels = labels.len(),
                values = values.len(),
                "label/value length mismatch; extra entries ignored"
            );
        }
        report.monthly_series = series_from_labels(labels, values);
    }
    report.backlinks = count(p.backlinks.as_ref().and_then(|b| b.total.as_ref()));
    report.seo_score = match non_negative(p.seo_score.as_ref()) {
        Metric::Known(v) if v <= SEO_SCORE_MAX => Metric::Known(v),
        _ => Metric::Unknown,
    };

    Ok(report)
}

// ---------------------------------------------------------------------------
// Lenient value readers
// ---------------------------------------------------------------------------

/// Number or numeric string (`"1,234"`); `"N/A"`, `null`, `""` -> `None`.
fn number(v: Option<&Value>) -> Option<f64> {
    let n = match v? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, ',' | '_' | ' '))
                .collect();
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn non_negative(v: Option<&Value>) -> Metric<f64> {
    number(v).filter(|n| *n >= 0.0).into()
}

fn count(v: Option<&Value>) -> Metric<u64> {
    non_negative(v).map(|n| n.round() as u64)
}

fn rank(v: Option<&Value>) -> Metric<u64> {
    match count(v) {
        Metric::Known(r) if r >= 1 => Metric::Known(r),
        _ => Metric::Unknown,
    }
}

/// Seconds as a number, or a clock string `HH:MM:SS` / `MM:SS`.
fn seconds(v: Option<&Value>) -> Metric<f64> {
    if let Some(Value::String(s)) = v {
        if s.contains(':') {
            return parse_clock(s).into();
        }
    }
    non_negative(v)
}

fn parse_clock(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }
    let mut total = 0.0;
    for part in parts {
        let n: f64 = part.trim().parse().ok()?;
        if !n.is_finite() || n < 0.0 {
            return None;
        }
        total = total * 60.0 + n;
    }
    Some(total)
}

/// Rescales a list of raw share values to fractions, dropping entries that
/// cannot be represented. Scale is decided once per list from its largest
/// value, so fractions that round to a sum slightly above 1 stay fractions.
fn to_shares(raw: &[Option<f64>]) -> Vec<Option<Share>> {
    let max = raw
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    let scale = if max > PERCENT_SCALE_THRESHOLD {
        100.0
    } else {
        1.0
    };
    raw.iter()
        .map(|v| v.and_then(|v| Share::new(v / scale)))
        .collect()
}

fn share_map(map: &Map<String, Value>) -> SourceShares {
    let names: Vec<&String> = map.keys().collect();
    let raw: Vec<Option<f64>> = map.values().map(|v| number(Some(v))).collect();
    let mut out = SourceShares::default();
    for (name, share) in names.into_iter().zip(to_shares(&raw)) {
        match share {
            Some(s) => out.insert(name.trim(), s),
            None => tracing::debug!(target: "normalize", source = %name, "dropping invalid share"),
        }
    }
    out
}

fn countries<'a>(
    rows: impl Iterator<Item = (Option<&'a str>, Option<&'a str>, Option<&'a Value>)>,
) -> Vec<CountryShare> {
    let rows: Vec<_> = rows
        .filter_map(|(code, name, value)| {
            let code = code.map(str::trim).filter(|c| {
                c.len() == 2 && c.chars().all(|ch| ch.is_ascii_alphabetic())
            });
            match code {
                Some(code) => Some((code.to_ascii_uppercase(), name, number(value))),
                None => {
                    tracing::debug!(target: "normalize", ?name, "dropping country without ISO code");
                    None
                }
            }
        })
        .collect();

    let raw: Vec<Option<f64>> = rows.iter().map(|(_, _, v)| *v).collect();
    rows.into_iter()
        .zip(to_shares(&raw))
        .map(|((code, name, _), share)| CountryShare {
            name: name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| code.clone()),
            country_code: code,
            share: share.into(),
        })
        .collect()
}

fn keywords<'a>(rows: impl Iterator<Item = (Option<&'a str>, Option<&'a Value>)>) -> Vec<Keyword> {
    rows.filter_map(|(term, volume)| {
        let term = term.map(str::trim).filter(|t| !t.is_empty())?;
        Some(Keyword {
            term: term.to_string(),
            volume: count(volume),
        })
    })
    .collect()
}

fn series_from_date_map(map: &Map<String, Value>) -> Vec<MonthlyPoint> {
    let points = map
        .iter()
        .filter_map(|(label, value)| point(label, Some(value)))
        .collect();
    finish_series(points)
}

fn series_from_labels(labels: &[Value], values: &[Value]) -> Vec<MonthlyPoint> {
    let points = labels
        .iter()
        .zip(values)
        .filter_map(|(label, value)| {
            let label = match label {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            point(&label, Some(value))
        })
        .collect();
    finish_series(points)
}

fn point(label: &str, value: Option<&Value>) -> Option<MonthlyPoint> {
    let Some(period) = Period::parse(label) else {
        tracing::debug!(target: "normalize", %label, "unparsable period label");
        return None;
    };
    match non_negative(value) {
        Metric::Known(v) => Some(MonthlyPoint { period, value: v }),
        Metric::Unknown => None,
    }
}

/// Dated series are sorted chronologically; yearless ones keep provider
/// order. Repeated periods keep the first occurrence.
fn finish_series(mut points: Vec<MonthlyPoint>) -> Vec<MonthlyPoint> {
    if points.iter().all(|p| p.period.year.is_some()) {
        points.sort_by_key(|p| p.period);
    }
    let mut seen = std::collections::HashSet::new();
    points.retain(|p| seen.insert(p.period));
    points
}
