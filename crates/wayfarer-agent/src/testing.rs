//! Scripted provider and fixtures shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use wayfarer_core::config::Config;
use wayfarer_core::transcript::TranscriptEntry;
use wayfarer_core::types::PlanRequest;
use wayfarer_providers::openai::OpenAiProvider;
use wayfarer_providers::{
    ChunkStream, CompletionChunk, CompletionRequest, Credentials, LlmProvider, ToolDefinition,
    ToolUseChunk,
};
use wayfarer_tools::{register_builtin_tools, ToolRegistry};

use crate::PlanAgent;

/// One scripted model turn.
pub enum Script {
    Chunks(Vec<CompletionChunk>),
    /// `stream()` itself fails.
    Fail(String),
    /// The stream yields these chunks, then an error.
    BreakAfter(Vec<CompletionChunk>, String),
    /// The stream never yields.
    Hang,
}

/// Replays scripted turns in order and records every request.
pub struct ScriptedProvider {
    format: OpenAiProvider,
    turns: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            format: OpenAiProvider::openai(None),
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> CompletionRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn format_tools(&self, tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
        self.format.format_tools(tools)
    }

    fn format_messages(&self, transcript: &[TranscriptEntry]) -> Vec<serde_json::Value> {
        self.format.format_messages(transcript)
    }

    fn is_tool_use_stop(&self, stop_reason: &str) -> bool {
        self.format.is_tool_use_stop(stop_reason)
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
        _credentials: &Credentials,
    ) -> anyhow::Result<ChunkStream> {
        self.requests.lock().unwrap().push(request.clone());
        let turn = self.turns.lock().unwrap().pop_front();
        match turn {
            Some(Script::Chunks(chunks)) => {
                Ok(Box::pin(futures::stream::iter(
                    chunks.into_iter().map(Ok::<_, anyhow::Error>),
                )))
            }
            Some(Script::Fail(message)) => Err(anyhow::anyhow!(message)),
            Some(Script::BreakAfter(chunks, message)) => {
                let items = chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(anyhow::anyhow!(message))));
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Some(Script::Hang) => Ok(Box::pin(futures::stream::pending::<anyhow::Result<CompletionChunk>>())),
            None => anyhow::bail!("script exhausted"),
        }
    }
}

/// A turn that streams `deltas` and stops normally.
pub fn text_turn(deltas: &[&str]) -> Script {
    let mut chunks: Vec<CompletionChunk> = deltas
        .iter()
        .map(|d| CompletionChunk {
            delta: Some(d.to_string()),
            ..Default::default()
        })
        .collect();
    chunks.push(CompletionChunk {
        stop_reason: Some("stop".into()),
        ..Default::default()
    });
    Script::Chunks(chunks)
}

/// A turn requesting the given `(id, name, input_json)` tool calls.
pub fn tool_turn(calls: &[(&str, &str, &str)]) -> Script {
    let mut chunks: Vec<CompletionChunk> = calls
        .iter()
        .map(|(id, name, input_json)| CompletionChunk {
            tool_use: Some(ToolUseChunk {
                id: id.to_string(),
                name: name.to_string(),
                input_json: input_json.to_string(),
            }),
            ..Default::default()
        })
        .collect();
    chunks.push(CompletionChunk {
        stop_reason: Some("tool_calls".into()),
        ..Default::default()
    });
    Script::Chunks(chunks)
}

pub fn agent_with(provider: Arc<ScriptedProvider>, config: Config) -> PlanAgent {
    let mut tools = ToolRegistry::new();
    register_builtin_tools(&mut tools);
    PlanAgent::new(
        Arc::new(config),
        Arc::new(tools),
        provider,
        Credentials::None,
    )
}

pub fn plan_request() -> PlanRequest {
    PlanRequest {
        destination: "Lisbon".into(),
        dates: "3 days".into(),
        currency: "EUR".into(),
        budget: 900,
        interests: vec!["food".into()],
    }
}
