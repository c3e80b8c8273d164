//! Planning agent: runs the tool-calling reasoning loop and turns its
//! events into the client-facing stream.
//!
//! The reasoning loop ([`runtime`]) emits [`ReasoningEvent`]s on a channel.
//! [`stream::plan_event_stream`] drives the loop in its own task and feeds
//! every event through the [`translator::EventTranslator`], which yields the
//! [`OutboundEvent`]s the gateway sends over SSE.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use wayfarer_core::config::Config;
use wayfarer_core::types::Itinerary;
use wayfarer_providers::{Credentials, LlmProvider};
use wayfarer_tools::ToolRegistry;

pub mod planner;
pub mod preview;
pub mod prompt;
pub mod runtime;
pub mod stream;
pub mod translator;

#[cfg(test)]
pub(crate) mod testing;

pub use planner::PlanOutcome;
pub use preview::preview_stream;
pub use runtime::run_reasoning_loop;
pub use stream::{plan_event_stream, OutboundStream};
pub use translator::{translate_trace, EventTranslator};

/// Events emitted by the reasoning loop while it works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReasoningEvent {
    /// A reasoning step began.
    StepStart { input: String },

    /// A tool invocation began.
    ToolStart {
        name: String,
        input: serde_json::Value,
    },

    /// A tool invocation finished.
    ToolEnd { name: String, output: String },

    /// Incremental model text.
    TextFragment { chunk: String },

    /// The loop completed with its final answer.
    StepEnd { output: String },

    /// Any event kind this build does not know about.
    #[serde(other)]
    Unrecognized,
}

/// Events sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    Thought { content: String },
    Final { itinerary: Itinerary },
    Status { message: String },
    Done,
}

impl OutboundEvent {
    /// Wire name of the event, also used as the SSE `event:` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Thought { .. } => "thought",
            Self::Final { .. } => "final",
            Self::Status { .. } => "status",
            Self::Done => "done",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Everything a planning run needs. Cheap to clone; one per server.
#[derive(Clone)]
pub struct PlanAgent {
    pub config: Arc<Config>,
    pub tools: Arc<ToolRegistry>,
    pub provider: Arc<dyn LlmProvider>,
    pub credentials: Credentials,
}

impl PlanAgent {
    pub fn new(
        config: Arc<Config>,
        tools: Arc<ToolRegistry>,
        provider: Arc<dyn LlmProvider>,
        credentials: Credentials,
    ) -> Self {
        Self {
            config,
            tools,
            provider,
            credentials,
        }
    }
}
