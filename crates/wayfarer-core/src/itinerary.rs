//! Itinerary text parser.
//!
//! Turns the agent's free-form final answer into a day-by-day [`Itinerary`],
//! using `Day N:` headings as the only structural anchor. Total over all
//! inputs: text without headings becomes a single-day itinerary.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{DayActivity, Itinerary};

static DAY_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:Day|DAY) \d+:").expect("day heading pattern is valid"));

/// Line prefixes treated as section labels rather than activities.
const NOISE_PREFIXES: [&str; 4] = ["day", "morning", "afternoon", "evening"];

/// Parse `text` into an itinerary titled after `destination`.
///
/// Days are numbered by position, not by the digits in the heading, so
/// `Day 3:` followed by `Day 7:` yields days 1 and 2.
pub fn parse_itinerary(text: &str, destination: &str) -> Itinerary {
    let title = format!("Trip to {destination}");
    let segments: Vec<&str> = DAY_HEADING.split(text).collect();

    if segments.len() <= 1 {
        return Itinerary {
            title,
            days: vec![DayActivity {
                day: 1,
                activities: vec![text.trim().to_string()],
            }],
        };
    }

    let days = segments
        .iter()
        .skip(1)
        .zip(1u32..)
        .map(|(segment, day)| DayActivity {
            day,
            activities: segment_activities(segment),
        })
        .collect();

    Itinerary { title, days }
}

fn segment_activities(segment: &str) -> Vec<String> {
    segment
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_noise(line))
        .map(str::to_string)
        .collect()
}

fn is_noise(line: &str) -> bool {
    let lower = line.to_lowercase();
    NOISE_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}
