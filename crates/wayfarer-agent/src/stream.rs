//! Client event stream for one planning run.
//!
//! The reasoning loop runs in its own task and reports over an mpsc channel.
//! The stream returned here translates those events as they arrive and, once
//! the loop stops for any reason, lets the translator close the run so the
//! client always sees a final `done`. Dropping the stream cancels the loop.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use wayfarer_core::types::PlanRequest;

use crate::runtime::run_reasoning_loop;
use crate::translator::EventTranslator;
use crate::{OutboundEvent, PlanAgent, ReasoningEvent};

pub type OutboundStream = Pin<Box<dyn Stream<Item = OutboundEvent> + Send>>;

struct RunState {
    rx: mpsc::UnboundedReceiver<ReasoningEvent>,
    task: Option<JoinHandle<anyhow::Result<String>>>,
    translator: EventTranslator,
    pending: VecDeque<OutboundEvent>,
    finished: bool,
    _cancel_on_drop: DropGuard,
}

/// Start a planning run and return its client event stream.
pub fn plan_event_stream(agent: PlanAgent, request: PlanRequest) -> OutboundStream {
    let run_id = Uuid::new_v4().to_string();
    let span = info_span!("plan_run", %run_id, destination = %request.destination);
    let translator = EventTranslator::new(request.destination.clone());

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();

    let task = tokio::spawn(
        async move { run_reasoning_loop(&agent, &request, &run_id, event_tx, loop_cancel).await }
            .instrument(span),
    );

    drive(event_rx, task, cancel, translator)
}

/// Translate events from a running loop, finalizing when the channel closes.
fn drive(
    rx: mpsc::UnboundedReceiver<ReasoningEvent>,
    task: JoinHandle<anyhow::Result<String>>,
    cancel: CancellationToken,
    translator: EventTranslator,
) -> OutboundStream {
    let state = RunState {
        rx,
        task: Some(task),
        translator,
        pending: VecDeque::new(),
        finished: false,
        _cancel_on_drop: cancel.drop_guard(),
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }
            if state.finished {
                return None;
            }

            match state.rx.recv().await {
                Some(event) => {
                    state.pending.extend(state.translator.translate(event));
                    state.finished = state.translator.is_terminated();
                }
                None => {
                    // Sender dropped: the loop task has returned or died.
                    let failure = match state.task.take() {
                        Some(task) => loop_failure(task).await,
                        None => None,
                    };
                    state.pending.extend(state.translator.finish(failure.as_deref()));
                    state.finished = true;
                }
            }
        }
    }))
}

async fn loop_failure(task: JoinHandle<anyhow::Result<String>>) -> Option<String> {
    match task.await {
        Ok(Ok(_)) => None,
        Ok(Err(e)) => {
            warn!(%e, "Reasoning loop failed");
            Some(e.to_string())
        }
        Err(e) if e.is_panic() => {
            warn!("Reasoning loop panicked");
            Some("internal error".to_string())
        }
        Err(_) => Some("planning cancelled".to_string()),
    }
}
