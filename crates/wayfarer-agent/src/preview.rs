//! Canned progress stream for front-end development. Never calls a model.

use std::time::Duration;

use futures::StreamExt;

use wayfarer_core::types::PlanRequest;

use crate::stream::OutboundStream;
use crate::OutboundEvent;

/// Progress messages for `request`, in order.
pub fn preview_messages(request: &PlanRequest) -> Vec<String> {
    vec![
        format!("✈️ Planning a trip to {}...", request.destination),
        format!("🔍 Analyzing interests: {}", request.interests_label()),
        "📅 Building itinerary across dates...".to_string(),
        format!("💰 Checking budget: {} {}", request.budget, request.currency),
        "🧠 Finalising and optimising...".to_string(),
        "✅ Done planning!".to_string(),
    ]
}

/// Emit the progress messages as `status` events, `delay` apart, then `done`.
pub fn preview_stream(request: &PlanRequest, delay: Duration) -> OutboundStream {
    let messages = preview_messages(request);
    let count = messages.len();
    let events = messages
        .into_iter()
        .map(|message| OutboundEvent::Status { message })
        .chain(std::iter::once(OutboundEvent::Done))
        .enumerate();

    Box::pin(futures::stream::iter(events).then(move |(index, event)| async move {
        if index > 0 && index < count && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        event
    }))
}
