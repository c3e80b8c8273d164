//! Single-shot planner: one completion, answer parsed as JSON.

use tracing::{debug, info};

use wayfarer_core::transcript::TranscriptEntry;
use wayfarer_core::types::{PlanRequest, PlanResponse};
use wayfarer_providers::CompletionRequest;

use crate::prompt::{build_single_shot_prompt, SINGLE_SHOT_SYSTEM};
use crate::PlanAgent;

/// Result of a single-shot planning call.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Planned(PlanResponse),
    /// The model's answer was not the expected JSON.
    Malformed { raw: String },
}

impl PlanAgent {
    /// Ask the model for the whole plan in one completion.
    ///
    /// Provider and network failures are errors; a malformed answer is a
    /// [`PlanOutcome::Malformed`] carrying the raw text.
    pub async fn plan_once(&self, request: &PlanRequest) -> anyhow::Result<PlanOutcome> {
        let trace = [
            "Received trip planning request.".to_string(),
            format!(
                "Destination: {}, Dates: {}, Budget: {} {}, Interests: {}",
                request.destination,
                request.dates,
                request.budget,
                request.currency,
                request.interests.join(", ")
            ),
        ];

        let completion = CompletionRequest {
            model: self.config.default_model(),
            messages: self
                .provider
                .format_messages(&[TranscriptEntry::user_text(build_single_shot_prompt(request))]),
            max_tokens: self.config.max_tokens(),
            temperature: Some(self.config.temperature()),
            tools: None,
            system: Some(SINGLE_SHOT_SYSTEM.to_string()),
        };

        let raw = self.provider.complete(&completion, &self.credentials).await?;

        let Some(mut response) = parse_plan_response(&raw) else {
            info!(destination = %request.destination, "Model returned invalid JSON");
            return Ok(PlanOutcome::Malformed { raw });
        };

        response
            .agent_thoughts
            .insert(0, "Started with user preferences.".to_string());
        response.agent_thoughts.extend(trace);
        Ok(PlanOutcome::Planned(response))
    }
}

/// Parse the model's answer, tolerating a surrounding Markdown code fence.
pub fn parse_plan_response(raw: &str) -> Option<PlanResponse> {
    let body = strip_code_fence(raw.trim());
    serde_json::from_str(body)
        .map_err(|e| debug!(%e, "Plan response is not valid JSON"))
        .ok()
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the info string ("json") on the opening fence line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

#[cfg(test)]
mod tests {
    use wayfarer_core::config::Config;

    use super::*;
    use crate::testing::{agent_with, plan_request, text_turn, Script, ScriptedProvider};

    const PLAN_JSON: &str = r#"{
        "itinerary": [{"day": "Day 1", "plan": "Alfama walk"}, {"day": 2, "plan": "Sintra"}],
        "totalCost": "850 EUR",
        "agentThoughts": ["Food first"]
    }"#;

    #[test]
    fn test_parse_plain_json() {
        let response = parse_plan_response(PLAN_JSON).unwrap();
        assert_eq!(response.itinerary.len(), 2);
        assert_eq!(response.itinerary[1].day, "Day 2");
        assert_eq!(response.total_cost, "850 EUR");
    }

    #[test]
    fn test_parse_fenced_json() {
        let fenced = format!("```json\n{PLAN_JSON}\n```");
        assert!(parse_plan_response(&fenced).is_some());
        let bare_fence = format!("```\n{PLAN_JSON}\n```\n");
        assert!(parse_plan_response(&bare_fence).is_some());
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_plan_response("Sure! Here is your plan: Day 1 ...").is_none());
        assert!(parse_plan_response("```").is_none());
        assert!(parse_plan_response(r#"{"itinerary": []}"#).is_none());
    }

    #[tokio::test]
    async fn test_plan_once_adds_thought_trace() {
        let provider = ScriptedProvider::new(vec![text_turn(&[PLAN_JSON])]);
        let agent = agent_with(provider.clone(), Config::default());

        let PlanOutcome::Planned(response) = agent.plan_once(&plan_request()).await.unwrap() else {
            panic!("expected a plan");
        };
        assert_eq!(
            response.agent_thoughts,
            vec![
                "Started with user preferences.",
                "Food first",
                "Received trip planning request.",
                "Destination: Lisbon, Dates: 3 days, Budget: 900 EUR, Interests: food",
            ]
        );

        let request = provider.request(0);
        assert!(request.tools.is_none());
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.system.as_deref(), Some(SINGLE_SHOT_SYSTEM));
    }

    #[tokio::test]
    async fn test_plan_once_malformed_keeps_raw() {
        let provider = ScriptedProvider::new(vec![text_turn(&["I cannot ", "do JSON today"])]);
        let agent = agent_with(provider, Config::default());

        let outcome = agent.plan_once(&plan_request()).await.unwrap();
        assert_eq!(
            outcome,
            PlanOutcome::Malformed {
                raw: "I cannot do JSON today".into()
            }
        );
    }

    #[tokio::test]
    async fn test_plan_once_provider_error() {
        let provider = ScriptedProvider::new(vec![Script::Fail("401 Unauthorized".into())]);
        let agent = agent_with(provider, Config::default());
        assert!(agent.plan_once(&plan_request()).await.is_err());
    }
}
