//! Route handlers.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
#[cfg(feature = "metrics")]
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use tracing::{info, warn};

use wayfarer_agent::{plan_event_stream, preview_stream, OutboundEvent, OutboundStream, PlanOutcome};
use wayfarer_core::types::{PlanRequest, PlanResponse};

use crate::error::ApiError;
use crate::state::AppState;

type Body = Result<Json<PlanRequest>, JsonRejection>;

fn accept(body: Body) -> Result<PlanRequest, ApiError> {
    let Json(request) = body?;
    request.validate()?;
    Ok(request)
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /plan`: single-shot plan as JSON.
pub async fn plan(
    State(state): State<Arc<AppState>>,
    body: Body,
) -> Result<Json<PlanResponse>, ApiError> {
    #[cfg(feature = "metrics")]
    let start = Instant::now();

    let request = accept(body)?;
    info!(destination = %request.destination, "Single-shot plan requested");

    let outcome = state.agent.plan_once(&request).await;

    #[cfg(feature = "metrics")]
    crate::metrics::record_request("/plan", start.elapsed().as_secs_f64());

    match outcome {
        Ok(PlanOutcome::Planned(response)) => Ok(Json(response)),
        Ok(PlanOutcome::Malformed { raw }) => {
            #[cfg(feature = "metrics")]
            crate::metrics::record_error("malformed_output");
            Err(ApiError::MalformedOutput { raw })
        }
        Err(e) => {
            warn!(%e, "Single-shot plan failed");
            #[cfg(feature = "metrics")]
            crate::metrics::record_error("provider");
            Err(ApiError::Upstream(e.to_string()))
        }
    }
}

/// `POST /plan/stream`: agent events over SSE.
pub async fn plan_stream(
    State(state): State<Arc<AppState>>,
    body: Body,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let request = accept(body)?;
    info!(destination = %request.destination, "Streamed plan requested");

    let events = plan_event_stream(state.agent.clone(), request);
    #[cfg(feature = "metrics")]
    let events = crate::metrics::track_run(events);
    Ok(sse(events))
}

/// `POST /plan/preview`: canned progress messages, no model involved.
pub async fn plan_preview(
    State(state): State<Arc<AppState>>,
    body: Body,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let request = accept(body)?;
    let delay = Duration::from_millis(state.config.preview_delay_ms());
    Ok(sse(preview_stream(&request, delay)))
}

#[cfg(feature = "metrics")]
pub async fn render_metrics(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

fn sse(events: OutboundStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let frames = events.map(|event| Ok::<_, Infallible>(to_sse_event(&event)));
    Sse::new(frames).keep_alive(KeepAlive::default())
}

/// One SSE frame: `event:` carries the kind, `data:` the tagged JSON.
pub fn to_sse_event(event: &OutboundEvent) -> Event {
    Event::default()
        .event(event.kind())
        .json_data(event)
        .unwrap_or_else(|e| {
            warn!(%e, kind = event.kind(), "Failed to encode event");
            Event::default().event(event.kind()).data("{}")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_rejects_invalid_request() {
        let body: Body = Ok(Json(PlanRequest {
            destination: " ".into(),
            dates: "May".into(),
            currency: "EUR".into(),
            budget: 100,
            interests: vec![],
        }));
        let err = accept(body).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_health_body() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
        assert!(body["version"].is_string());
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_preview_is_not_counted_as_run() {
        use metrics_exporter_prometheus::PrometheusBuilder;

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let request = PlanRequest {
            destination: "Lisbon".into(),
            dates: "2 days".into(),
            currency: "EUR".into(),
            budget: 600,
            interests: vec![],
        };

        metrics::with_local_recorder(&recorder, || {
            let _frames = sse(preview_stream(&request, Duration::ZERO));
            assert!(!handle.render().contains("plan_runs_active"));
        });
    }
}
