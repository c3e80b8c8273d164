//! Provider integration tests: real API calls.
//!
//! These tests are skipped when the corresponding API key env var is not set.
//! Run with: `cargo test -p wayfarer-providers --test integration`

use tokio_stream::StreamExt;
use wayfarer_core::transcript::TranscriptEntry;
use wayfarer_providers::openai::OpenAiProvider;
use wayfarer_providers::{CompletionRequest, Credentials, LlmProvider};

fn openai_key() -> Option<String> {
    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

fn hello_request(provider: &dyn LlmProvider) -> CompletionRequest {
    CompletionRequest {
        model: "gpt-4o-mini".into(),
        messages: provider.format_messages(&[TranscriptEntry::user_text(
            "Reply with exactly the word 'hello'.",
        )]),
        max_tokens: 50,
        temperature: Some(0.0),
        tools: None,
        system: Some("You are a helpful assistant. Follow instructions exactly.".into()),
    }
}

#[tokio::test]
async fn test_openai_streaming() {
    let Some(api_key) = openai_key() else {
        eprintln!("Skipping: OPENAI_API_KEY not set");
        return;
    };

    let provider = OpenAiProvider::openai(None);
    let credentials = Credentials::ApiKey { api_key };
    let request = hello_request(&provider);

    let stream = provider.stream(&request, &credentials).await;
    assert!(stream.is_ok(), "Stream creation failed: {:?}", stream.err());

    let mut stream = stream.unwrap();
    let mut text = String::new();
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.expect("Stream chunk error");
        if let Some(delta) = &chunk.delta {
            text.push_str(delta);
        }
    }

    assert!(
        text.to_lowercase().contains("hello"),
        "Expected 'hello' in response, got: {text}"
    );
}

#[tokio::test]
async fn test_openai_complete() {
    let Some(api_key) = openai_key() else {
        eprintln!("Skipping: OPENAI_API_KEY not set");
        return;
    };

    let provider = OpenAiProvider::openai(None);
    let credentials = Credentials::ApiKey { api_key };
    let text = provider
        .complete(&hello_request(&provider), &credentials)
        .await
        .expect("completion failed");
    assert!(text.to_lowercase().contains("hello"), "got: {text}");
}
