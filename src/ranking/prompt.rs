//! Prompt construction for event ranking.

use crate::suggestions::types::{CandidateEvent, NormalizedPreferences, fmt_timestamp};
use serde::Serialize;

const RANK_INSTRUCTIONS: &str = r#"
You recommend local events to a person based on their interests.

Input:
1. A JSON object with the person's normalized interests.
2. A JSON array of upcoming events, each with an "id".

Pick the events this person is most likely to enjoy. Only use ids from the
event list. Confidence is a number between 0 and 1.

Output valid JSON ONLY:
{
  "recommendations": [
    {
      "event_id": string,
      "title": string,
      "reason": string,
      "confidence": number
    }
  ]
}
"#;

/// Event fields exposed to the model.
#[derive(Serialize)]
struct PromptEvent<'a> {
    id: &'a str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<&'a str>,
    tags: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    source_url: Option<&'a str>,
}

impl<'a> From<&'a CandidateEvent> for PromptEvent<'a> {
    fn from(event: &'a CandidateEvent) -> Self {
        Self {
            id: &event.source_id,
            title: &event.title,
            summary: event.summary.as_deref(),
            description: event.description.as_deref(),
            start_time: fmt_timestamp(event.start_time),
            end_time: event.end_time.map(fmt_timestamp),
            location: event.location.as_deref(),
            price: event.price.as_deref(),
            tags: &event.tags,
            source_url: event.source_url.as_deref(),
        }
    }
}

/// Build the completion prompt for ranking `candidates` against `preferences`.
pub fn build_rank_prompt(
    preferences: &NormalizedPreferences,
    candidates: &[CandidateEvent],
) -> Result<String, serde_json::Error> {
    let events: Vec<PromptEvent<'_>> = candidates.iter().map(PromptEvent::from).collect();
    let preferences = serde_json::to_string_pretty(preferences)?;
    let events = serde_json::to_string_pretty(&events)?;

    Ok(format!(
        "{}\n\nInterests:\n{preferences}\n\nEvents:\n{events}\n\nReturn JSON only.",
        RANK_INSTRUCTIONS.trim()
    ))
}
