//! Prometheus metrics recording and endpoint.

use futures::StreamExt;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use wayfarer_agent::OutboundStream;

/// Install the Prometheus metrics recorder and return the handle for rendering.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

/// Record an HTTP request to `route` with its duration.
pub fn record_request(route: &str, duration_secs: f64) {
    let labels = [("route", route.to_string())];
    metrics::counter!("http_requests_total", &labels).increment(1);
    metrics::histogram!("http_request_duration_seconds", &labels).record(duration_secs);
}

/// Record an error of a given kind.
pub fn record_error(kind: &str) {
    let labels = [("kind", kind.to_string())];
    metrics::counter!("errors_total", &labels).increment(1);
}

/// Counts a streamed plan run as active until dropped.
pub struct ActiveRun(());

impl ActiveRun {
    pub fn start() -> Self {
        metrics::gauge!("plan_runs_active").increment(1.0);
        Self(())
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        metrics::gauge!("plan_runs_active").decrement(1.0);
    }
}

/// Keep an [`ActiveRun`] alive for as long as `events` is being streamed.
pub fn track_run(events: OutboundStream) -> OutboundStream {
    let active = ActiveRun::start();
    Box::pin(events.inspect(move |_| {
        let _ = &active;
    }))
}
