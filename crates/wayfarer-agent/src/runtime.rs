//! Reasoning loop: streams the model, runs requested tools, repeats until
//! the model answers without tool calls.

use std::time::Instant;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wayfarer_core::transcript::{ContentBlock, TranscriptEntry, Usage};
use wayfarer_core::types::PlanRequest;
use wayfarer_providers::{CompletionRequest, ToolDefinition};
use wayfarer_tools::{ToolContext, ToolOutput};

use crate::prompt::{build_agent_system_prompt, build_agent_task};
use crate::{PlanAgent, ReasoningEvent};

fn emit(event_tx: &mpsc::UnboundedSender<ReasoningEvent>, event: ReasoningEvent) {
    // A closed receiver means the consumer went away; cancellation handles that.
    let _ = event_tx.send(event);
}

/// Run the reasoning loop for one request.
///
/// Every observable step is sent on `event_tx`; the final answer is sent as
/// [`ReasoningEvent::StepEnd`] and also returned. Returns an error when the
/// provider fails, `cancel` fires, or the iteration limit is hit.
pub async fn run_reasoning_loop(
    agent: &PlanAgent,
    request: &PlanRequest,
    run_id: &str,
    event_tx: mpsc::UnboundedSender<ReasoningEvent>,
    cancel: CancellationToken,
) -> anyhow::Result<String> {
    let start = Instant::now();
    let config = &agent.config;
    let provider = agent.provider.as_ref();
    let max_iterations = config.max_tool_iterations();

    let system_prompt = build_agent_system_prompt(&agent.tools);
    let task = build_agent_task(request);
    let mut transcript = vec![TranscriptEntry::user_text(task.clone())];

    let tool_defs = if agent.tools.list().is_empty() {
        None
    } else {
        let definitions: Vec<ToolDefinition> = agent
            .tools
            .tools()
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters_schema: t.parameters_schema(),
            })
            .collect();
        Some(provider.format_tools(&definitions))
    };

    let tool_context = ToolContext {
        run_id: run_id.to_string(),
        config: config.clone(),
    };

    let mut step_input = task;
    let mut tool_call_count: u32 = 0;

    for iteration in 0..max_iterations {
        debug!(iteration, "Reasoning loop iteration");
        emit(
            &event_tx,
            ReasoningEvent::StepStart {
                input: step_input.clone(),
            },
        );

        let completion = CompletionRequest {
            model: config.default_model(),
            messages: provider.format_messages(&transcript),
            max_tokens: config.max_tokens(),
            temperature: Some(config.temperature()),
            tools: tool_defs.clone(),
            system: Some(system_prompt.clone()),
        };

        let mut stream = tokio::select! {
            _ = cancel.cancelled() => anyhow::bail!("planning cancelled"),
            stream = provider.stream(&completion, &agent.credentials) => stream?,
        };

        let mut response_text = String::new();
        let mut tool_uses: Vec<(String, String, serde_json::Value)> = Vec::new(); // (id, name, input)
        let mut stop_reason = None;
        let mut usage = Usage::default();

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => anyhow::bail!("planning cancelled"),
                next = stream.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk?;

            if let Some(delta) = chunk.delta {
                response_text.push_str(&delta);
                emit(&event_tx, ReasoningEvent::TextFragment { chunk: delta });
            }

            if let Some(tool_use) = chunk.tool_use {
                let input = match serde_json::from_str(&tool_use.input_json) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(%e, tool = %tool_use.name, "Tool arguments are not valid JSON");
                        serde_json::Value::String(tool_use.input_json.clone())
                    }
                };
                tool_uses.push((tool_use.id, tool_use.name, input));
            }

            if let Some(chunk_usage) = chunk.usage {
                if let Some(inp) = chunk_usage.input_tokens {
                    usage.input_tokens = inp;
                }
                if let Some(out) = chunk_usage.output_tokens {
                    usage.output_tokens = out;
                }
            }

            if let Some(reason) = chunk.stop_reason {
                stop_reason = Some(reason);
            }
        }

        let mut assistant_content: Vec<ContentBlock> = Vec::new();
        if !response_text.is_empty() {
            assistant_content.push(ContentBlock::Text {
                text: response_text.clone(),
            });
        }
        for (id, name, input) in &tool_uses {
            assistant_content.push(ContentBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            });
        }
        transcript.push(TranscriptEntry::Assistant {
            content: assistant_content,
            usage: Some(usage.clone()),
            timestamp: Utc::now(),
        });

        let is_tool_use = stop_reason
            .as_deref()
            .is_some_and(|r| provider.is_tool_use_stop(r));

        if !is_tool_use || tool_uses.is_empty() {
            info!(
                iterations = iteration + 1,
                tool_calls = tool_call_count,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                duration_ms = start.elapsed().as_millis() as u64,
                "Reasoning loop finished"
            );
            emit(
                &event_tx,
                ReasoningEvent::StepEnd {
                    output: response_text.clone(),
                },
            );
            return Ok(response_text);
        }

        let mut used = Vec::with_capacity(tool_uses.len());
        for (id, name, input) in tool_uses {
            tool_call_count += 1;
            info!(tool = %name, "Executing tool");
            emit(
                &event_tx,
                ReasoningEvent::ToolStart {
                    name: name.clone(),
                    input: input.clone(),
                },
            );

            let tool_output = match agent.tools.get(&name) {
                Some(tool) => {
                    let result = tokio::select! {
                        _ = cancel.cancelled() => anyhow::bail!("planning cancelled"),
                        result = tool.execute(input, &tool_context) => result,
                    };
                    result.unwrap_or_else(|e| {
                        warn!(%e, tool = %name, "Tool execution error");
                        ToolOutput::error(format!("Tool error: {e}"))
                    })
                }
                None => ToolOutput::error(format!("Unknown tool: {name}")),
            };

            emit(
                &event_tx,
                ReasoningEvent::ToolEnd {
                    name: name.clone(),
                    output: tool_output.content.clone(),
                },
            );

            transcript.push(TranscriptEntry::ToolResult {
                tool_use_id: id,
                tool: name.clone(),
                content: tool_output.content,
                is_error: tool_output.is_error,
                timestamp: Utc::now(),
            });
            used.push(name);
        }

        step_input = format!("Reviewing results from {}", used.join(", "));
    }

    anyhow::bail!("no final answer after {max_iterations} tool iterations")
}
