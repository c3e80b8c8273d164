use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, WayfarerError};

/// Trip parameters submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub destination: String,
    pub dates: String,
    pub currency: String,
    pub budget: i64,
    #[serde(default)]
    pub interests: Vec<String>,
}

impl PlanRequest {
    /// Reject requests the planners cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.destination.trim().is_empty() {
            return Err(WayfarerError::Validation("destination must not be empty".into()));
        }
        if self.dates.trim().is_empty() {
            return Err(WayfarerError::Validation("dates must not be empty".into()));
        }
        if self.currency.trim().is_empty() {
            return Err(WayfarerError::Validation("currency must not be empty".into()));
        }
        if self.budget < 0 {
            return Err(WayfarerError::Validation(format!(
                "budget must not be negative (got {})",
                self.budget
            )));
        }
        Ok(())
    }

    /// Interests joined for prompts, or "General" when none were given.
    pub fn interests_label(&self) -> String {
        if self.interests.is_empty() {
            "General".to_string()
        } else {
            self.interests.join(", ")
        }
    }
}

/// Structured day-by-day itinerary derived from the agent's final answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Itinerary {
    pub title: String,
    pub days: Vec<DayActivity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayActivity {
    /// 1-based, assigned by position.
    pub day: u32,
    pub activities: Vec<String>,
}

/// Single-shot planner response, in the shape the model is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub itinerary: Vec<DayPlan>,
    pub total_cost: String,
    #[serde(default)]
    pub agent_thoughts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPlan {
    #[serde(deserialize_with = "string_or_number")]
    pub day: String,
    pub plan: String,
}

/// Error body returned to HTTP callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

/// Models occasionally emit `"day": 1` instead of `"day": "Day 1"`.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(format!("Day {n}")),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number for day, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PlanRequest {
        PlanRequest {
            destination: "Lisbon".into(),
            dates: "3 days".into(),
            currency: "EUR".into(),
            budget: 900,
            interests: vec!["food".into(), "history".into()],
        }
    }

    #[test]
    fn test_interests_default_to_empty() {
        let req: PlanRequest = serde_json::from_str(
            r#"{"destination":"Rome","dates":"5 days","currency":"EUR","budget":1200}"#,
        )
        .unwrap();
        assert!(req.interests.is_empty());
        assert_eq!(req.interests_label(), "General");
    }

    #[test]
    fn test_interests_label_joins() {
        assert_eq!(request().interests_label(), "food, history");
    }

    #[test]
    fn test_validate_accepts_well_formed_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_destination() {
        let req = PlanRequest {
            destination: "  ".into(),
            ..request()
        };
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("destination"));
    }

    #[test]
    fn test_validate_rejects_negative_budget() {
        let req = PlanRequest {
            budget: -1,
            ..request()
        };
        assert!(matches!(req.validate(), Err(WayfarerError::Validation(_))));
    }

    #[test]
    fn test_plan_response_camel_case() {
        let json = r#"{
            "itinerary": [{"day": "Day 1", "plan": "Alfama walk"}, {"day": 2, "plan": "Sintra"}],
            "totalCost": "€850 EUR",
            "agentThoughts": ["kept it walkable"]
        }"#;
        let resp: PlanResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.itinerary[1].day, "Day 2");
        assert_eq!(resp.total_cost, "€850 EUR");

        let back = serde_json::to_value(&resp).unwrap();
        assert!(back.get("totalCost").is_some());
        assert!(back.get("agentThoughts").is_some());
    }

    #[test]
    fn test_error_payload_omits_missing_raw() {
        let payload = ErrorPayload {
            error: "boom".into(),
            raw: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("raw").is_none());
    }
}
