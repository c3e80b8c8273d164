//! estimate_budget tool: splits a trip budget into per-day spending guides.

use async_trait::async_trait;
use serde::Deserialize;

use crate::{Tool, ToolContext, ToolOutput};

pub struct EstimateBudgetTool;

/// Share of the budget assigned to each category, in percent.
const SPLIT: [(&str, u32); 4] = [
    ("Lodging", 40),
    ("Food", 25),
    ("Activities", 20),
    ("Local transport", 15),
];

#[derive(Deserialize)]
struct Params {
    budget: f64,
    currency: String,
    days: u32,
    #[serde(default = "default_travelers")]
    travelers: u32,
}

fn default_travelers() -> u32 {
    1
}

fn estimate(p: &Params) -> Result<String, String> {
    if p.days == 0 {
        return Err("days must be at least 1".into());
    }
    if p.travelers == 0 {
        return Err("travelers must be at least 1".into());
    }
    if !p.budget.is_finite() || p.budget < 0.0 {
        return Err(format!("budget must be a non-negative number, got {}", p.budget));
    }

    let per_day = p.budget / f64::from(p.days);
    let per_person_day = per_day / f64::from(p.travelers);

    let mut out = format!(
        "Budget {:.2} {cur} over {} day(s) for {} traveler(s): {:.2} {cur} per day, {:.2} {cur} per person per day.\n",
        p.budget,
        p.days,
        p.travelers,
        per_day,
        per_person_day,
        cur = p.currency,
    );
    for (category, pct) in SPLIT {
        out.push_str(&format!(
            "- {category} ({pct}%): {:.2} {} per day\n",
            per_day * f64::from(pct) / 100.0,
            p.currency
        ));
    }
    Ok(out)
}

#[async_trait]
impl Tool for EstimateBudgetTool {
    fn name(&self) -> &str {
        "estimate_budget"
    }

    fn description(&self) -> &str {
        "Split a total trip budget into daily amounts for lodging, food, activities and local transport."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "budget": { "type": "number", "description": "Total trip budget" },
                "currency": { "type": "string", "description": "Currency code, e.g. GBP" },
                "days": { "type": "integer", "description": "Trip length in days" },
                "travelers": { "type": "integer", "description": "Number of travelers (default: 1)" }
            },
            "required": ["budget", "currency", "days"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        let p: Params = serde_json::from_value(params)?;
        Ok(match estimate(&p) {
            Ok(text) => ToolOutput::ok(text),
            Err(reason) => ToolOutput::error(reason),
        })
    }
}
