//! search_attractions tool: finds sights for a city through a search API.
//!
//! Supports SearXNG and the Brave Search API, picked from the configured URL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Tool, ToolContext, ToolOutput};

pub struct SearchAttractionsTool;

#[derive(Deserialize)]
struct Params {
    city: String,
    #[serde(default)]
    theme: Option<String>,
    #[serde(default = "default_num_results")]
    num_results: usize,
}

fn default_num_results() -> usize {
    5
}

#[derive(Debug, Serialize, Deserialize)]
struct Attraction {
    title: String,
    url: String,
    snippet: String,
}

fn build_query(city: &str, theme: Option<&str>) -> String {
    match theme.map(str::trim).filter(|t| !t.is_empty()) {
        Some(theme) => format!("top {theme} attractions in {city}"),
        None => format!("top attractions in {city}"),
    }
}

/// Parse SearXNG JSON results.
fn parse_searxng_results(body: &serde_json::Value, max: usize) -> Vec<Attraction> {
    let empty = vec![];
    let results = body["results"].as_array().unwrap_or(&empty);
    results
        .iter()
        .take(max)
        .filter_map(|r| {
            Some(Attraction {
                title: r["title"].as_str()?.to_string(),
                url: r["url"].as_str()?.to_string(),
                snippet: r["content"].as_str().unwrap_or("").to_string(),
            })
        })
        .collect()
}

/// Parse Brave Search API results.
fn parse_brave_results(body: &serde_json::Value, max: usize) -> Vec<Attraction> {
    let empty = vec![];
    let results = body["web"]["results"].as_array().unwrap_or(&empty);
    results
        .iter()
        .take(max)
        .filter_map(|r| {
            Some(Attraction {
                title: r["title"].as_str()?.to_string(),
                url: r["url"].as_str()?.to_string(),
                snippet: r["description"].as_str().unwrap_or("").to_string(),
            })
        })
        .collect()
}

fn render(city: &str, attractions: &[Attraction]) -> String {
    let mut output = format!("Attractions in {city}:\n");
    for (i, a) in attractions.iter().enumerate() {
        output.push_str(&format!("{}. {} ({})", i + 1, a.title, a.url));
        if !a.snippet.is_empty() {
            output.push_str(&format!(" - {}", a.snippet));
        }
        output.push('\n');
    }
    output
}

#[async_trait]
impl Tool for SearchAttractionsTool {
    fn name(&self) -> &str {
        "search_attractions"
    }

    fn description(&self) -> &str {
        "Search for attractions, sights and activities in a city, optionally filtered by a theme such as 'art' or 'food'. Returns a numbered list with title, URL and snippet."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "City or destination to search"
                },
                "theme": {
                    "type": "string",
                    "description": "Optional interest to focus on (e.g. art, food, hiking)"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 5)"
                }
            },
            "required": ["city"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        let p: Params = serde_json::from_value(params)?;
        let query = build_query(&p.city, p.theme.as_deref());
        debug!(run_id = %context.run_id, %query, "search_attractions");

        let search_url = context
            .config
            .search_api_url()
            .or_else(|| std::env::var("SEARCH_API_URL").ok())
            .filter(|s| !s.is_empty());

        let search_api_key = context
            .config
            .search_api_key()
            .or_else(|| std::env::var("SEARCH_API_KEY").ok())
            .filter(|s| !s.is_empty());

        let Some(base_url) = search_url else {
            return Ok(ToolOutput::error(
                "No search API configured. Set tools.search_api_url in config or the SEARCH_API_URL environment variable. Supported: SearXNG (e.g. http://localhost:8888), Brave Search API (https://api.search.brave.com).",
            ));
        };
        let base_url = base_url.trim_end_matches('/');

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        let is_brave = base_url.contains("brave.com");

        let resp = if is_brave {
            let count = p.num_results.to_string();
            client
                .get(format!("{base_url}/res/v1/web/search"))
                .header("X-Subscription-Token", search_api_key.unwrap_or_default())
                .query(&[("q", query.as_str()), ("count", count.as_str())])
                .send()
                .await
        } else {
            client
                .get(format!("{base_url}/search"))
                .query(&[("q", query.as_str()), ("format", "json")])
                .send()
                .await
        };

        let resp = match resp {
            Ok(r) => r,
            Err(e) => return Ok(ToolOutput::error(format!("Search API error: {e}"))),
        };

        if !resp.status().is_success() {
            return Ok(ToolOutput::error(format!(
                "Search API returned HTTP {}",
                resp.status()
            )));
        }

        let body: serde_json::Value = resp.json().await?;
        let attractions = if is_brave {
            parse_brave_results(&body, p.num_results)
        } else {
            parse_searxng_results(&body, p.num_results)
        };

        if attractions.is_empty() {
            return Ok(ToolOutput::ok(format!("No attractions found for {}.", p.city)));
        }

        Ok(ToolOutput::ok(render(&p.city, &attractions)))
    }
}
