//! Maps reasoning-loop events onto client events.

use tracing::trace;

use wayfarer_core::itinerary::parse_itinerary;

use crate::{OutboundEvent, ReasoningEvent};

/// Status sent right after the final itinerary.
pub const COMPLETION_MESSAGE: &str = "Itinerary ready.";

/// Per-run translator. Emits `done` exactly once, as the last event.
#[derive(Debug)]
pub struct EventTranslator {
    destination: String,
    terminated: bool,
}

impl EventTranslator {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            terminated: false,
        }
    }

    /// Whether `done` has been emitted.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Translate one event. Returns nothing once the run has terminated.
    pub fn translate(&mut self, event: ReasoningEvent) -> Vec<OutboundEvent> {
        if self.terminated {
            trace!(?event, "Dropping event after done");
            return Vec::new();
        }

        match event {
            ReasoningEvent::StepStart { input } => vec![thought(format!("Agent thinking: {input}"))],
            ReasoningEvent::ToolStart { name, input } => {
                vec![thought(format!("Starting tool {name} with inputs: {input}"))]
            }
            ReasoningEvent::ToolEnd { name, output } => {
                vec![thought(format!("Done with tool {name}. Output: {output}"))]
            }
            ReasoningEvent::TextFragment { chunk } if chunk.is_empty() => Vec::new(),
            ReasoningEvent::TextFragment { chunk } => vec![thought(chunk)],
            ReasoningEvent::StepEnd { output } => {
                self.terminated = true;
                vec![
                    OutboundEvent::Final {
                        itinerary: parse_itinerary(&output, &self.destination),
                    },
                    OutboundEvent::Status {
                        message: COMPLETION_MESSAGE.to_string(),
                    },
                    OutboundEvent::Done,
                ]
            }
            ReasoningEvent::Unrecognized => {
                trace!("Ignoring unrecognized reasoning event");
                Vec::new()
            }
        }
    }

    /// Close the run. Emits `done` (preceded by a failure status when
    /// `failure` is set) unless the run already terminated.
    pub fn finish(&mut self, failure: Option<&str>) -> Vec<OutboundEvent> {
        if self.terminated {
            return Vec::new();
        }
        self.terminated = true;

        let mut events = Vec::with_capacity(2);
        if let Some(reason) = failure {
            events.push(OutboundEvent::Status {
                message: format!("Planning failed: {reason}"),
            });
        }
        events.push(OutboundEvent::Done);
        events
    }
}

fn thought(content: String) -> OutboundEvent {
    OutboundEvent::Thought { content }
}

/// Translate a complete recorded trace, finalizing it.
pub fn translate_trace<I>(events: I, destination: &str) -> Vec<OutboundEvent>
where
    I: IntoIterator<Item = ReasoningEvent>,
{
    let mut translator = EventTranslator::new(destination);
    let mut out: Vec<OutboundEvent> = events
        .into_iter()
        .flat_map(|event| translator.translate(event))
        .collect();
    out.extend(translator.finish(None));
    out
}
