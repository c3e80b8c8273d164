//! Prompt builders for the reasoning loop and the single-shot planner.

use wayfarer_core::types::PlanRequest;
use wayfarer_tools::ToolRegistry;

/// System prompt for single-shot planning.
pub const SINGLE_SHOT_SYSTEM: &str = "You are a helpful travel planner.";

/// Build the system prompt for the reasoning loop.
pub fn build_agent_system_prompt(tools: &ToolRegistry) -> String {
    let mut parts = Vec::new();

    parts.push(
        "You are a travel planning agent. Research the destination with the tools you have, \
         then write a day-by-day itinerary."
            .to_string(),
    );

    let now = chrono::Utc::now();
    parts.push(format!("Current date: {}", now.format("%Y-%m-%d")));

    let tool_names = tools.list();
    if !tool_names.is_empty() {
        parts.push(format!("Available tools: {}", tool_names.join(", ")));
    }

    parts.push(
        "Format the final answer as plain text. Start each day with a heading of the form \
         'Day N:' on its own line, followed by one activity per line. Do not label lines \
         with 'Morning', 'Afternoon' or 'Evening'."
            .to_string(),
    );

    parts.join("\n\n")
}

/// The task handed to the reasoning loop as its first user turn.
pub fn build_agent_task(request: &PlanRequest) -> String {
    format!(
        "Plan a trip to {} for {} with a budget of {} {}. Interests: {}.",
        request.destination,
        request.dates,
        request.budget,
        request.currency,
        request.interests_label()
    )
}

/// Prompt for single-shot planning. The model must answer with JSON only.
pub fn build_single_shot_prompt(request: &PlanRequest) -> String {
    format!(
        "Plan a {dates}-length trip to {destination} with a budget of {budget} {currency}.\n\
         The traveler is interested in: {interests}.\n\
         Return a JSON object with exactly these keys:\n\
         - \"itinerary\": a list of objects with \"day\" (e.g. \"Day 1\") and \"plan\" (a short description of the day)\n\
         - \"totalCost\": the estimated total cost as a string, including the currency\n\
         - \"agentThoughts\": a list of short strings describing how you reasoned about the plan\n\
         Respond with the JSON object only, no commentary.",
        dates = request.dates,
        destination = request.destination,
        budget = request.budget,
        currency = request.currency,
        interests = request.interests.join(", "),
    )
}
