use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static METRICS: OnceCell<Metrics> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Installs the Prometheus recorder once per process; later calls reuse it.
    pub fn init(cache_ttl_secs: u64) -> anyhow::Result<Self> {
        let m = METRICS.get_or_try_init(|| -> anyhow::Result<Metrics> {
            let handle = PrometheusBuilder::new().install_recorder()?;
            Ok(Metrics { handle })
        })?;

        // Static gauge with the configured cache TTL.
        gauge!("traffic_cache_ttl_seconds").set(cache_ttl_secs as f64);

        Ok(m.clone())
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
