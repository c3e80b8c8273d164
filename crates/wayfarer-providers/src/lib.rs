//! LLM provider abstraction.
//!
//! Each provider implements the [`LlmProvider`] trait to support streaming
//! chat completions. All supported backends speak the OpenAI Chat
//! Completions dialect (OpenAI, OpenRouter, Ollama).

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;

use wayfarer_core::config::ProviderConfig;
use wayfarer_core::transcript::TranscriptEntry;

pub mod openai;
pub mod sse;

/// Credentials for authenticating with an LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Credentials {
    #[serde(rename = "api_key")]
    ApiKey { api_key: String },
    /// Local backends (Ollama) that take no key.
    #[serde(rename = "none")]
    None,
}

/// A request to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<serde_json::Value>,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub tools: Option<Vec<serde_json::Value>>,
    pub system: Option<String>,
}

/// A streamed chunk from the LLM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionChunk {
    pub delta: Option<String>,
    pub tool_use: Option<ToolUseChunk>,
    pub usage: Option<ChunkUsage>,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUseChunk {
    pub id: String,
    pub name: String,
    pub input_json: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// Tool description handed to the provider for formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = anyhow::Result<CompletionChunk>> + Send>>;

/// The core LLM provider trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (e.g., "openai", "ollama").
    fn id(&self) -> &str;

    /// Convert tool definitions to the provider's wire format.
    fn format_tools(&self, tools: &[ToolDefinition]) -> Vec<serde_json::Value>;

    /// Convert a transcript to the provider's message format.
    fn format_messages(&self, transcript: &[TranscriptEntry]) -> Vec<serde_json::Value>;

    /// Whether a stop reason means the model wants tool results.
    fn is_tool_use_stop(&self, stop_reason: &str) -> bool;

    /// Stream a chat completion.
    async fn stream(
        &self,
        request: &CompletionRequest,
        credentials: &Credentials,
    ) -> anyhow::Result<ChunkStream>;

    /// Run a completion to the end and return its text.
    async fn complete(
        &self,
        request: &CompletionRequest,
        credentials: &Credentials,
    ) -> anyhow::Result<String> {
        let mut stream = self.stream(request, credentials).await?;
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            if let Some(delta) = chunk?.delta {
                text.push_str(&delta);
            }
        }
        Ok(text)
    }
}

/// Build the provider named by `config`, with its resolved credentials.
pub fn build_provider(config: &ProviderConfig) -> anyhow::Result<(Arc<dyn LlmProvider>, Credentials)> {
    let base_url = config.base_url.as_deref();
    let provider: Arc<dyn LlmProvider> = match config.id.as_str() {
        "openai" => Arc::new(openai::OpenAiProvider::openai(base_url)),
        "openrouter" => Arc::new(openai::OpenAiProvider::openrouter(base_url)),
        "ollama" => Arc::new(openai::OpenAiProvider::ollama(base_url)),
        other => anyhow::bail!("Unsupported provider '{other}'"),
    };

    let credentials = match config.resolve_api_key() {
        Some(api_key) => Credentials::ApiKey { api_key },
        None if config.id == "ollama" => Credentials::None,
        None => {
            tracing::warn!(provider = %config.id, "No API key configured; requests will fail");
            Credentials::None
        }
    };

    Ok((provider, credentials))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_config(id: &str, api_key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            id: id.into(),
            api_key_env: None,
            api_key: api_key.map(str::to_string),
            base_url: None,
            default_model: None,
        }
    }

    #[test]
    fn test_build_openai_with_key() {
        let (provider, credentials) = build_provider(&provider_config("openai", Some("sk-1"))).unwrap();
        assert_eq!(provider.id(), "openai");
        assert!(matches!(credentials, Credentials::ApiKey { api_key } if api_key == "sk-1"));
    }

    #[test]
    fn test_build_ollama_without_key() {
        let (provider, credentials) = build_provider(&provider_config("ollama", None)).unwrap();
        assert_eq!(provider.id(), "ollama");
        assert!(matches!(credentials, Credentials::None));
    }

    #[test]
    fn test_build_unknown_provider_fails() {
        let err = build_provider(&provider_config("anthropic", Some("k")))
            .err()
            .unwrap();
        assert!(err.to_string().contains("anthropic"));
    }
}
