// src/aggregator.rs
//! Fetch orchestrator: the one entry point the dashboard calls.
//!
//! `fetch(domain, provider)` normalizes the domain, gates on the session,
//! serves fresh cache entries, joins an identical in-flight fetch when one
//! exists and otherwise starts a new *flight*. A flight is a spawned task,
//! so a caller that goes away does not cancel it; its result still lands in
//! the cache for the next caller.
//!
//! Cache and in-flight map share one `std::sync::Mutex` that is never held
//! across an `.await`. Waiters receive the flight result over a
//! `tokio::sync::watch` channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, histogram};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::normalize_domain;
use crate::error::FetchError;
use crate::normalize::{normalize, NormalizeContext};
use crate::providers::{DynProvider, TrafficProvider};
use crate::report::{ProviderId, TrafficReport};
use crate::session::{Session, AUTH_HEADER};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

type Key = (String, ProviderId);
type FlightResult = Result<TrafficReport, FetchError>;

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Skip the cache and any in-flight fetch; always start a new flight.
    pub force_refresh: bool,
    /// Maximum acceptable age of a cached report; aggregator default if `None`.
    pub ttl: Option<Duration>,
}

impl FetchOptions {
    pub fn refresh() -> Self {
        Self {
            force_refresh: true,
            ttl: None,
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            force_refresh: false,
            ttl: Some(ttl),
        }
    }
}

/// How a successful fetch was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    /// Waited on a flight another caller started.
    Joined,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Joined => "JOINED",
            CacheStatus::Miss => "MISS",
        }
    }
}

struct CacheEntry {
    report: TrafficReport,
    inserted: Instant,
    seq: u64,
}

struct Flight {
    seq: u64,
    rx: watch::Receiver<Option<FlightResult>>,
}

#[derive(Default)]
struct State {
    cache: HashMap<Key, CacheEntry>,
    inflight: HashMap<Key, Flight>,
    next_seq: u64,
}

struct Inner {
    providers: HashMap<ProviderId, DynProvider>,
    session: Arc<Session>,
    default_ttl: Duration,
    upstream_timeout: Duration,
    state: Mutex<State>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[derive(Clone)]
pub struct TrafficAggregator {
    inner: Arc<Inner>,
}

pub struct AggregatorBuilder {
    providers: HashMap<ProviderId, DynProvider>,
    session: Arc<Session>,
    default_ttl: Duration,
    upstream_timeout: Duration,
}

impl AggregatorBuilder {
    /// Registers an adapter under its own id; a later one with the same id wins.
    pub fn provider(mut self, provider: DynProvider) -> Self {
        self.providers.insert(provider.id(), provider);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    pub fn build(self) -> TrafficAggregator {
        let mut ids: Vec<ProviderId> = self.providers.keys().copied().collect();
        ids.sort();
        info!(
            target: "aggregator",
            providers = ?ids,
            ttl_secs = self.default_ttl.as_secs(),
            timeout_ms = self.upstream_timeout.as_millis() as u64,
            "traffic aggregator ready"
        );
        TrafficAggregator {
            inner: Arc::new(Inner {
                providers: self.providers,
                session: self.session,
                default_ttl: self.default_ttl,
                upstream_timeout: self.upstream_timeout,
                state: Mutex::new(State::default()),
            }),
        }
    }
}

enum Plan {
    Hit(TrafficReport),
    Join(watch::Receiver<Option<FlightResult>>, u64),
    Fly(watch::Sender<Option<FlightResult>>, u64),
}

impl TrafficAggregator {
    pub fn builder(session: Arc<Session>) -> AggregatorBuilder {
        AggregatorBuilder {
            providers: HashMap::new(),
            session,
            default_ttl: DEFAULT_CACHE_TTL,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    pub fn providers(&self) -> Vec<ProviderId> {
        let mut ids: Vec<ProviderId> = self.inner.providers.keys().copied().collect();
        ids.sort();
        ids
    }

    pub async fn fetch(
        &self,
        domain: &str,
        provider: ProviderId,
        options: FetchOptions,
    ) -> Result<TrafficReport, FetchError> {
        self.fetch_with_status(domain, provider, options)
            .await
            .map(|(report, _)| report)
    }

    pub async fn fetch_with_status(
        &self,
        domain: &str,
        provider: ProviderId,
        options: FetchOptions,
    ) -> Result<(TrafficReport, CacheStatus), FetchError> {
        let result = self.dispatch(domain, provider, options).await;
        if let Err(e) = &result {
            counter!("traffic_fetch_errors_total", "kind" => e.kind()).increment(1);
        }
        result
    }

    async fn dispatch(
        &self,
        domain: &str,
        provider: ProviderId,
        options: FetchOptions,
    ) -> Result<(TrafficReport, CacheStatus), FetchError> {
        let domain = normalize_domain(domain)?;
        let adapter = self
            .inner
            .providers
            .get(&provider)
            .cloned()
            .ok_or(FetchError::ProviderNotConfigured(provider))?;

        // Before the cache: a signed-out user never sees gated data.
        if adapter.requires_auth() && !self.inner.session.is_authenticated() {
            debug!(target: "aggregator", %domain, %provider, "gated provider without session");
            return Err(FetchError::Unauthenticated);
        }

        let ttl = options.ttl.unwrap_or(self.inner.default_ttl);
        let key: Key = (domain, provider);

        let plan = {
            let mut st = self.inner.lock();
            Self::plan(&mut st, &key, ttl, options.force_refresh)
        };

        match plan {
            Plan::Hit(report) => {
                counter!("traffic_cache_hits_total").increment(1);
                debug!(target: "aggregator", domain = %key.0, %provider, "cache hit");
                Ok((report, CacheStatus::Hit))
            }
            Plan::Join(rx, seq) => {
                counter!("traffic_inflight_joins_total").increment(1);
                debug!(target: "aggregator", domain = %key.0, %provider, seq, "joined in-flight fetch");
                self.wait(rx, &key, seq)
                    .await
                    .map(|r| (r, CacheStatus::Joined))
            }
            Plan::Fly(tx, seq) => {
                counter!("traffic_cache_misses_total").increment(1);
                let rx = tx.subscribe();
                tokio::spawn(run_flight(self.inner.clone(), adapter, key.clone(), seq, tx));
                self.wait(rx, &key, seq).await.map(|r| (r, CacheStatus::Miss))
            }
        }
    }

    fn plan(st: &mut State, key: &Key, ttl: Duration, force_refresh: bool) -> Plan {
        if !force_refresh {
            if let Some(entry) = st.cache.get(key) {
                if entry.inserted.elapsed() < ttl {
                    return Plan::Hit(entry.report.clone());
                }
            }
            if let Some(flight) = st.inflight.get(key) {
                return Plan::Join(flight.rx.clone(), flight.seq);
            }
        }

        st.next_seq += 1;
        let seq = st.next_seq;
        let (tx, rx) = watch::channel(None);
        // A forced refresh replaces an older flight's slot; that flight
        // still publishes to its own waiters.
        st.inflight.insert(key.clone(), Flight { seq, rx });
        Plan::Fly(tx, seq)
    }

    async fn wait(
        &self,
        mut rx: watch::Receiver<Option<FlightResult>>,
        key: &Key,
        seq: u64,
    ) -> FlightResult {
        match rx.wait_for(Option::is_some).await {
            Ok(v) => v.clone().unwrap_or(Err(FetchError::UpstreamUnreachable)),
            Err(_) => {
                // The flight died without publishing (panicked task).
                warn!(target: "aggregator", domain = %key.0, provider = %key.1, seq, "flight ended without a result");
                let mut st = self.inner.lock();
                if st.inflight.get(key).is_some_and(|f| f.seq == seq) {
                    st.inflight.remove(key);
                }
                Err(FetchError::UpstreamUnreachable)
            }
        }
    }

    /// The stored report for a key regardless of age.
    pub fn cached(&self, domain: &str, provider: ProviderId) -> Option<TrafficReport> {
        let domain = normalize_domain(domain).ok()?;
        self.inner
            .lock()
            .cache
            .get(&(domain, provider))
            .map(|e| e.report.clone())
    }

    /// Drops the cache entry for a key. Returns whether one existed.
    pub fn invalidate(&self, domain: &str, provider: ProviderId) -> bool {
        let Ok(domain) = normalize_domain(domain) else {
            return false;
        };
        self.inner.lock().cache.remove(&(domain, provider)).is_some()
    }

    /// Removes entries older than `ttl`; returns how many went.
    pub fn purge_expired(&self, ttl: Duration) -> usize {
        let mut st = self.inner.lock();
        let before = st.cache.len();
        st.cache.retain(|_, e| e.inserted.elapsed() < ttl);
        let purged = before - st.cache.len();
        if purged > 0 {
            debug!(target: "aggregator", purged, "purged expired cache entries");
        }
        purged
    }
}

async fn run_flight(
    inner: Arc<Inner>,
    adapter: DynProvider,
    key: Key,
    seq: u64,
    tx: watch::Sender<Option<FlightResult>>,
) {
    let result = fly(&inner, adapter.as_ref(), &key.0).await;

    {
        let mut st = inner.lock();
        if let Ok(report) = &result {
            // Never let a slower, older flight overwrite a newer report.
            let superseded = st.cache.get(&key).is_some_and(|e| e.seq > seq);
            if !superseded {
                st.cache.insert(
                    key.clone(),
                    CacheEntry {
                        report: report.clone(),
                        inserted: Instant::now(),
                        seq,
                    },
                );
            }
        }
        if st.inflight.get(&key).is_some_and(|f| f.seq == seq) {
            st.inflight.remove(&key);
        }
    }

    match &result {
        Ok(_) => debug!(target: "aggregator", domain = %key.0, provider = %key.1, seq, "flight stored"),
        Err(e) => info!(target: "aggregator", domain = %key.0, provider = %key.1, seq, error = %e, "flight failed"),
    }
    tx.send_replace(Some(result));
}

async fn fly(inner: &Inner, adapter: &dyn TrafficProvider, domain: &str) -> FlightResult {
    let provider = adapter.id();
    let gated = adapter.requires_auth();

    let request = adapter.build_request(domain)?;
    let request = inner.session.attach(request, gated)?;
    let sent_token = request.header(AUTH_HEADER).map(str::to_string);

    counter!("traffic_upstream_calls_total", "provider" => provider.slug()).increment(1);
    let started = Instant::now();
    let outcome = tokio::time::timeout(inner.upstream_timeout, adapter.execute(request)).await;
    histogram!("traffic_upstream_ms").record(started.elapsed().as_secs_f64() * 1000.0);

    let raw = match outcome {
        Err(_) => {
            warn!(
                target: "aggregator",
                %domain,
                %provider,
                timeout_ms = inner.upstream_timeout.as_millis() as u64,
                "upstream timed out"
            );
            return Err(FetchError::UpstreamUnreachable);
        }
        Ok(Err(e)) => {
            if gated && e.is_auth_rejection() {
                if let (FetchError::UpstreamRejected { status, .. }, Some(token)) =
                    (&e, sent_token.as_deref())
                {
                    inner.session.expire(*status, token);
                }
            }
            return Err(e);
        }
        Ok(Ok(raw)) => raw,
    };

    let ctx = NormalizeContext {
        domain,
        fetched_at: Utc::now(),
    };
    normalize(provider, raw, &ctx)
}
