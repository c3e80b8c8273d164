//! OpenAI Chat Completions API provider.
//!
//! Implements streaming chat completions via `/v1/chat/completions`.
//! Also serves OpenRouter and Ollama, which expose the same API.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{debug, trace};

use wayfarer_core::transcript::{ContentBlock, TranscriptEntry};

use crate::sse::{parse_sse_stream, SseEvent};
use crate::{
    ChunkStream, ChunkUsage, CompletionChunk, CompletionRequest, Credentials, LlmProvider,
    ToolDefinition, ToolUseChunk,
};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// API style: determines minor behavior differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStyle {
    OpenAi,
    OpenRouter,
    Ollama,
}

pub struct OpenAiProvider {
    pub base_url: String,
    pub api_style: ApiStyle,
    provider_id: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    fn with_style(base_url: Option<&str>, default_url: &str, api_style: ApiStyle, id: &str) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(default_url)
                .trim_end_matches('/')
                .to_string(),
            api_style,
            provider_id: id.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn openai(base_url: Option<&str>) -> Self {
        Self::with_style(base_url, OPENAI_BASE_URL, ApiStyle::OpenAi, "openai")
    }

    pub fn openrouter(base_url: Option<&str>) -> Self {
        Self::with_style(base_url, OPENROUTER_BASE_URL, ApiStyle::OpenRouter, "openrouter")
    }

    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::with_style(base_url, OLLAMA_BASE_URL, ApiStyle::Ollama, "ollama")
    }

    fn api_key<'a>(&self, credentials: &'a Credentials) -> anyhow::Result<Option<&'a str>> {
        match (credentials, self.api_style) {
            (Credentials::ApiKey { api_key }, _) => Ok(Some(api_key.as_str())),
            (Credentials::None, ApiStyle::Ollama) => Ok(None),
            (Credentials::None, _) => {
                anyhow::bail!("Provider '{}' requires an API key", self.provider_id)
            }
        }
    }
}

// --- OpenAI request/response types ---

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Default, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Accumulates tool call data across streaming deltas.
#[derive(Debug, Clone, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn into_chunk(self) -> CompletionChunk {
        CompletionChunk {
            tool_use: Some(ToolUseChunk {
                id: self.id,
                name: self.name,
                input_json: self.arguments,
            }),
            ..CompletionChunk::default()
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn id(&self) -> &str {
        &self.provider_id
    }

    fn format_tools(&self, tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters_schema,
                    }
                })
            })
            .collect()
    }

    fn format_messages(&self, transcript: &[TranscriptEntry]) -> Vec<serde_json::Value> {
        let mut messages: Vec<serde_json::Value> = Vec::new();

        for entry in transcript {
            match entry {
                TranscriptEntry::User { content, .. } => {
                    let text = content
                        .iter()
                        .filter_map(|b| match b {
                            ContentBlock::Text { text } => Some(text.as_str()),
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                        .join("\n");
                    if !text.is_empty() {
                        messages.push(json!({ "role": "user", "content": text }));
                    }
                }
                TranscriptEntry::Assistant { content, .. } => {
                    let mut text_parts = Vec::new();
                    let mut tool_calls = Vec::new();

                    for block in content {
                        match block {
                            ContentBlock::Text { text } => text_parts.push(text.clone()),
                            ContentBlock::ToolUse { id, name, input } => {
                                tool_calls.push(json!({
                                    "id": id,
                                    "type": "function",
                                    "function": {
                                        "name": name,
                                        "arguments": input.to_string(),
                                    }
                                }));
                            }
                            ContentBlock::ToolResult { .. } => {}
                        }
                    }

                    let mut msg = json!({ "role": "assistant" });
                    if !text_parts.is_empty() {
                        msg["content"] = json!(text_parts.join("\n"));
                    }
                    if !tool_calls.is_empty() {
                        msg["tool_calls"] = json!(tool_calls);
                    }
                    if msg.get("content").is_some() || msg.get("tool_calls").is_some() {
                        messages.push(msg);
                    }
                }
                TranscriptEntry::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => {
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": tool_use_id,
                        "content": content,
                    }));
                }
            }
        }

        messages
    }

    fn is_tool_use_stop(&self, stop_reason: &str) -> bool {
        stop_reason == "tool_calls"
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
        credentials: &Credentials,
    ) -> anyhow::Result<ChunkStream> {
        let api_key = self.api_key(credentials)?;

        let mut messages = Vec::new();
        if let Some(ref system) = request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.extend(request.messages.iter().cloned());

        let body = OpenAiRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            stream: true,
            temperature: request.temperature,
            tools: request.tools.clone(),
            stream_options: Some(StreamOptions {
                include_usage: true,
            }),
        };

        debug!(model = %body.model, base_url = %self.base_url, "Streaming OpenAI-compatible API");

        let mut req_builder = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("content-type", "application/json");

        if let Some(key) = api_key {
            req_builder = req_builder.header("authorization", format!("Bearer {key}"));
        }
        if self.api_style == ApiStyle::OpenRouter {
            req_builder = req_builder.header("X-Title", "Wayfarer");
        }

        let response = req_builder.json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error {status}: {body}");
        }

        Ok(decode_chunks(parse_sse_stream(response)))
    }
}

struct OpenAiChunkState {
    sse: Pin<Box<dyn Stream<Item = anyhow::Result<SseEvent>> + Send>>,
    tool_calls: Vec<ToolCallAccumulator>,
    pending: VecDeque<CompletionChunk>,
    finished: bool,
}

impl OpenAiChunkState {
    /// Queue every accumulated tool call; the last one carries `stop_reason`.
    fn flush_tool_calls(&mut self, stop_reason: Option<String>) {
        let calls: Vec<ToolCallAccumulator> = self.tool_calls.drain(..).collect();
        let count = calls.len();
        for (idx, call) in calls.into_iter().enumerate() {
            let mut chunk = call.into_chunk();
            if idx + 1 == count {
                chunk.stop_reason = stop_reason.clone();
            }
            self.pending.push_back(chunk);
        }
        if count == 0 {
            if let Some(reason) = stop_reason {
                self.pending.push_back(CompletionChunk {
                    stop_reason: Some(reason),
                    ..CompletionChunk::default()
                });
            }
        }
    }

    fn absorb(&mut self, chunk: ChatCompletionChunk) {
        if let Some(usage) = chunk.usage {
            self.pending.push_back(CompletionChunk {
                usage: Some(ChunkUsage {
                    input_tokens: Some(usage.prompt_tokens),
                    output_tokens: Some(usage.completion_tokens),
                }),
                ..CompletionChunk::default()
            });
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return;
        };

        if let Some(tc_deltas) = choice.delta.tool_calls {
            for tc in tc_deltas {
                if self.tool_calls.len() <= tc.index {
                    self.tool_calls
                        .resize_with(tc.index + 1, ToolCallAccumulator::default);
                }
                let acc = &mut self.tool_calls[tc.index];
                if let Some(id) = tc.id {
                    acc.id = id;
                }
                if let Some(f) = tc.function {
                    if let Some(name) = f.name {
                        acc.name = name;
                    }
                    if let Some(args) = f.arguments {
                        acc.arguments.push_str(&args);
                    }
                }
            }
        }

        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            self.pending.push_back(CompletionChunk {
                delta: Some(content),
                ..CompletionChunk::default()
            });
        }

        if let Some(reason) = choice.finish_reason {
            self.flush_tool_calls(Some(reason));
        }
    }
}

/// Turn OpenAI-style SSE events into provider-neutral chunks.
///
/// Tool call deltas are accumulated by index and released together when the
/// choice finishes (or the stream ends), so callers see each call whole.
pub(crate) fn decode_chunks<S>(sse: S) -> ChunkStream
where
    S: Stream<Item = anyhow::Result<SseEvent>> + Send + 'static,
{
    let stream = futures::stream::unfold(
        OpenAiChunkState {
            sse: Box::pin(sse),
            tool_calls: Vec::new(),
            pending: VecDeque::new(),
            finished: false,
        },
        |mut state| async move {
            loop {
                if let Some(chunk) = state.pending.pop_front() {
                    return Some((Ok(chunk), state));
                }
                if state.finished {
                    return None;
                }

                match state.sse.next().await {
                    Some(Ok(sse_event)) => {
                        let data = sse_event.data.trim();

                        // OpenAI terminates with "data: [DONE]"
                        if data == "[DONE]" {
                            state.flush_tool_calls(None);
                            state.finished = true;
                            continue;
                        }

                        match serde_json::from_str::<ChatCompletionChunk>(data) {
                            Ok(chunk) => state.absorb(chunk),
                            Err(e) => trace!(%e, data, "Failed to parse OpenAI chunk"),
                        }
                    }
                    Some(Err(e)) => {
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                    None => {
                        state.flush_tool_calls(None);
                        state.finished = true;
                    }
                }
            }
        },
    );

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sse(data: &str) -> anyhow::Result<SseEvent> {
        Ok(SseEvent {
            event: None,
            data: data.to_string(),
            id: None,
        })
    }

    async fn decode(events: Vec<anyhow::Result<SseEvent>>) -> Vec<CompletionChunk> {
        decode_chunks(futures::stream::iter(events))
            .map(|c| c.unwrap())
            .collect()
            .await
    }

    #[test]
    fn test_openai_provider_creation() {
        let provider = OpenAiProvider::openai(None);
        assert_eq!(provider.id(), "openai");
        assert_eq!(provider.api_style, ApiStyle::OpenAi);
        assert_eq!(provider.base_url, OPENAI_BASE_URL);
    }

    #[test]
    fn test_openrouter_and_ollama_creation() {
        assert_eq!(OpenAiProvider::openrouter(None).base_url, OPENROUTER_BASE_URL);
        let ollama = OpenAiProvider::ollama(None);
        assert_eq!(ollama.id(), "ollama");
        assert_eq!(ollama.base_url, OLLAMA_BASE_URL);
    }

    #[test]
    fn test_custom_base_url() {
        let provider = OpenAiProvider::openai(Some("https://my-proxy.example.com/"));
        assert_eq!(provider.base_url, "https://my-proxy.example.com");
    }

    #[test]
    fn test_api_key_requirements() {
        let openai = OpenAiProvider::openai(None);
        assert!(openai.api_key(&Credentials::None).is_err());
        let ollama = OpenAiProvider::ollama(None);
        assert_eq!(ollama.api_key(&Credentials::None).unwrap(), None);
    }

    #[test]
    fn test_format_tools_function_wrapper() {
        let provider = OpenAiProvider::openai(None);
        let tools = vec![ToolDefinition {
            name: "search_attractions".into(),
            description: "Find sights".into(),
            parameters_schema: json!({
                "type": "object",
                "properties": { "city": { "type": "string" } },
            }),
        }];
        let formatted = provider.format_tools(&tools);
        assert_eq!(formatted.len(), 1);
        assert_eq!(formatted[0]["type"], "function");
        assert_eq!(formatted[0]["function"]["name"], "search_attractions");
        assert!(formatted[0]["function"]["parameters"].is_object());
    }

    #[test]
    fn test_is_tool_use_stop_openai() {
        let provider = OpenAiProvider::openai(None);
        assert!(provider.is_tool_use_stop("tool_calls"));
        assert!(!provider.is_tool_use_stop("stop"));
    }

    #[test]
    fn test_format_messages_with_tools() {
        use chrono::Utc;
        let provider = OpenAiProvider::openai(None);
        let transcript = vec![
            TranscriptEntry::user_text("Plan Paris"),
            TranscriptEntry::Assistant {
                content: vec![ContentBlock::ToolUse {
                    id: "call_1".into(),
                    name: "search_attractions".into(),
                    input: json!({"city": "Paris"}),
                }],
                usage: None,
                timestamp: Utc::now(),
            },
            TranscriptEntry::ToolResult {
                tool_use_id: "call_1".into(),
                tool: "search_attractions".into(),
                content: "Louvre".into(),
                is_error: false,
                timestamp: Utc::now(),
            },
        ];

        let messages = provider.format_messages(&transcript);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["tool_calls"][0]["id"], "call_1");
        assert_eq!(
            messages[1]["tool_calls"][0]["function"]["arguments"],
            r#"{"city":"Paris"}"#
        );
        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["tool_call_id"], "call_1");
    }

    #[tokio::test]
    async fn test_decode_text_then_stop() {
        let chunks = decode(vec![
            sse(r#"{"choices":[{"index":0,"delta":{"content":"Day 1:"},"finish_reason":null}]}"#),
            sse(r#"{"choices":[{"index":0,"delta":{"content":""},"finish_reason":null}]}"#),
            sse(r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#),
            sse(r#"{"choices":[],"usage":{"prompt_tokens":12,"completion_tokens":3}}"#),
            sse("[DONE]"),
        ])
        .await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].delta.as_deref(), Some("Day 1:"));
        assert_eq!(chunks[1].stop_reason.as_deref(), Some("stop"));
        assert_eq!(chunks[2].usage.as_ref().unwrap().input_tokens, Some(12));
    }

    #[tokio::test]
    async fn test_decode_emits_every_tool_call() {
        let chunks = decode(vec![
            sse(r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_a","function":{"name":"search_attractions","arguments":"{\"city\":"}}]}}]}"#),
            sse(r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"Paris\"}"}}]}}]}"#),
            sse(r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":1,"id":"call_b","function":{"name":"estimate_budget","arguments":"{}"}}]}}]}"#),
            sse(r#"{"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#),
            sse("[DONE]"),
        ])
        .await;

        assert_eq!(chunks.len(), 2);
        let first = chunks[0].tool_use.as_ref().unwrap();
        assert_eq!(first.id, "call_a");
        assert_eq!(first.input_json, r#"{"city":"Paris"}"#);
        assert!(chunks[0].stop_reason.is_none());
        assert_eq!(chunks[1].tool_use.as_ref().unwrap().name, "estimate_budget");
        assert_eq!(chunks[1].stop_reason.as_deref(), Some("tool_calls"));
    }

    #[tokio::test]
    async fn test_decode_skips_malformed_chunks() {
        let chunks = decode(vec![
            sse("not json"),
            sse(r#"{"choices":[{"index":0,"delta":{"content":"ok"}}]}"#),
        ])
        .await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].delta.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_decode_stops_after_stream_error() {
        let results: Vec<_> = decode_chunks(futures::stream::iter(vec![
            Err(anyhow::anyhow!("connection reset")),
            sse(r#"{"choices":[{"index":0,"delta":{"content":"late"}}]}"#),
        ]))
        .collect()
        .await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[tokio::test]
    async fn test_complete_requires_key_before_network() {
        let provider = OpenAiProvider::openai(Some("http://127.0.0.1:9"));
        let request = CompletionRequest {
            model: "gpt-4".into(),
            messages: vec![],
            max_tokens: 10,
            temperature: None,
            tools: None,
            system: None,
        };
        let err = provider.complete(&request, &Credentials::None).await.unwrap_err();
        assert!(err.to_string().contains("API key"));
    }
}
