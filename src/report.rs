//! Canonical, provider-independent traffic model.
//!
//! Everything downstream of normalization (cache, projections, HTTP layer)
//! only ever sees these types. Missing data is `Metric::Unknown`, never a
//! zero: "0 visits" and "we don't know" are different answers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Upstream data sources the aggregator can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "internal")]
    InternalStats,
    #[serde(rename = "similarweb")]
    SimilarWebLike,
    #[serde(rename = "trafficapi")]
    TrafficApiLike,
    #[serde(rename = "fixture")]
    FixtureTable,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::InternalStats,
        ProviderId::SimilarWebLike,
        ProviderId::TrafficApiLike,
        ProviderId::FixtureTable,
    ];

    /// URL/config slug.
    pub fn slug(self) -> &'static str {
        match self {
            ProviderId::InternalStats => "internal",
            ProviderId::SimilarWebLike => "similarweb",
            ProviderId::TrafficApiLike => "trafficapi",
            ProviderId::FixtureTable => "fixture",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ProviderId::InternalStats => "internal traffic stats",
            ProviderId::SimilarWebLike => "SimilarWeb",
            ProviderId::TrafficApiLike => "TrafficAPI",
            ProviderId::FixtureTable => "sample data",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ProviderId::ALL
            .into_iter()
            .find(|p| p.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown provider '{s}'"))
    }
}

/// A value that is either established or explicitly unknown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric<T> {
    Known(T),
    Unknown,
}

impl<T> Metric<T> {
    pub fn is_known(&self) -> bool {
        matches!(self, Metric::Known(_))
    }

    pub fn known(self) -> Option<T> {
        match self {
            Metric::Known(v) => Some(v),
            Metric::Unknown => None,
        }
    }

    pub fn as_ref(&self) -> Metric<&T> {
        match self {
            Metric::Known(v) => Metric::Known(v),
            Metric::Unknown => Metric::Unknown,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Metric<U> {
        match self {
            Metric::Known(v) => Metric::Known(f(v)),
            Metric::Unknown => Metric::Unknown,
        }
    }
}

impl<T> From<Option<T>> for Metric<T> {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => Metric::Known(v),
            None => Metric::Unknown,
        }
    }
}

impl<T: Serialize> Serialize for Metric<T> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Metric::Known(v) => s.serialize_some(v),
            Metric::Unknown => s.serialize_none(),
        }
    }
}

/// Fraction in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Share(f64);

impl Share {
    pub fn new(v: f64) -> Option<Self> {
        (v.is_finite() && (0.0..=1.0).contains(&v)).then_some(Share(v))
    }

    pub fn get(self) -> f64 {
        self.0
    }

    /// `0.4512` -> `"45.12%"`
    pub fn percent_text(self) -> String {
        format!("{:.2}%", self.0 * 100.0)
    }
}

const MONTH_ABBR: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const MONTH_FULL: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// A calendar month. Providers that label points only by month name
/// (`"Jan"`) yield a period without a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Period {
    pub year: Option<i32>,
    /// 1..=12
    pub month: u32,
}

impl Period {
    pub fn ym(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Period {
            year: Some(year),
            month,
        })
    }

    pub fn month_only(month: u32) -> Option<Self> {
        (1..=12)
            .contains(&month)
            .then_some(Period { year: None, month })
    }

    /// Accepts `YYYY-MM-DD` (optionally followed by a time part),
    /// `YYYY-MM`, and English month names or abbreviations.
    pub fn parse(label: &str) -> Option<Self> {
        let s = label.trim();
        if s.is_empty() {
            return None;
        }

        let date_part = s.get(..10).unwrap_or(s);
        if let Ok(d) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
            return Period::ym(d.year(), d.month());
        }
        if let Ok(d) = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d") {
            return Period::ym(d.year(), d.month());
        }

        let lower = s.to_ascii_lowercase();
        MONTH_FULL
            .iter()
            .position(|full| {
                *full == lower || (lower.len() >= 3 && full.starts_with(lower.as_str()))
            })
            .and_then(|idx| Period::month_only(idx as u32 + 1))
    }

    /// Abbreviated month name, e.g. `"Jan"`.
    pub fn abbr(&self) -> &'static str {
        MONTH_ABBR[(self.month.clamp(1, 12) - 1) as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPoint {
    pub period: Period,
    pub value: f64,
}

/// Source name -> share, in the order the provider listed them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceShares(Vec<(String, Share)>);

impl SourceShares {
    /// Inserts or replaces; a replaced key keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, share: Share) {
        let name = name.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = share,
            None => self.0.push((name, share)),
        }
    }

    pub fn get(&self, name: &str) -> Option<Share> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Share)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SourceShares {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryShare {
    /// ISO-3166 alpha-2, uppercase.
    pub country_code: String,
    pub name: String,
    pub share: Metric<Share>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Keyword {
    pub term: String,
    pub volume: Metric<u64>,
}

/// The canonical report. Built once by normalization, then only read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficReport {
    pub domain: String,
    pub monthly_visits: Metric<u64>,
    pub avg_time_on_site_seconds: Metric<f64>,
    pub pages_per_visit: Metric<f64>,
    pub global_rank: Metric<u64>,
    pub monthly_series: Vec<MonthlyPoint>,
    pub traffic_sources: SourceShares,
    pub top_countries: Vec<CountryShare>,
    pub top_keywords: Vec<Keyword>,
    pub overview: Option<String>,
    pub backlinks: Metric<u64>,
    pub seo_score: Metric<f64>,
    pub source_provider: ProviderId,
    pub fetched_at: DateTime<Utc>,
}

impl TrafficReport {
    /// Empty report: every metric unknown, every list empty.
    pub fn empty(domain: impl Into<String>, provider: ProviderId, fetched_at: DateTime<Utc>) -> Self {
        Self {
            domain: domain.into(),
            monthly_visits: Metric::Unknown,
            avg_time_on_site_seconds: Metric::Unknown,
            pages_per_visit: Metric::Unknown,
            global_rank: Metric::Unknown,
            monthly_series: Vec::new(),
            traffic_sources: SourceShares::default(),
            top_countries: Vec::new(),
            top_keywords: Vec::new(),
            overview: None,
            backlinks: Metric::Unknown,
            seo_score: Metric::Unknown,
            source_provider: provider,
            fetched_at,
        }
    }
}
