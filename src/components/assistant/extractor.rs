use super::llm::LanguageModel;
use super::models::{EventSnapshot, Intent, IntentAction, ModelIntent};
use crate::components::calendar_store::CalendarEvent;
use crate::error::{extraction_failure, BotResult, Error};
use crate::utils::time::to_local_iso;
use chrono_tz::Tz;
use serde_json::from_str;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = "You are an AI calendar assistant. Turn the user's message into exactly one calendar action: create a new event, update an existing event, or delete an existing event.

Rules:
- All times are in the user's local timezone. Write them in strict ISO 8601 without any timezone, e.g. 2026-02-28T14:00:00.
- If no end time is given, the event lasts one hour.
- Resolve relative dates such as \"tomorrow\" or \"next Friday\" from the current local time.
- To update or delete, copy the uid of the matching event from the existing events. Never invent a uid.
- For an update, only fill in the fields that change.
- Pick the calendar from: {calendars}.
- Set is_valid to false when the message is not a calendar request or the event cannot be identified.
- Put a short, friendly confirmation in bot_response.

Return only a JSON object, using double quotes, matching this JSON schema:
{schema}";

const USER_PROMPT_TEMPLATE: &str = "The current local time is: {now}.
Existing events: {events}
User request: {text}";

/// Turns chat messages into checked intents with a language model
pub struct IntentExtractor {
    model: Arc<dyn LanguageModel>,
    calendar_names: Vec<String>,
    timeout: Duration,
}

impl IntentExtractor {
    /// Create an extractor around a model
    pub fn new(model: Arc<dyn LanguageModel>, calendar_names: Vec<String>, timeout: Duration) -> Self {
        Self {
            model,
            calendar_names,
            timeout,
        }
    }

    /// Ask the model what `user_text` means.
    ///
    /// `events` is the current calendar contents; update and delete intents
    /// must point at one of them.
    pub async fn extract(
        &self,
        user_text: &str,
        current_time_iso: &str,
        events: &[CalendarEvent],
        tz: Tz,
    ) -> BotResult<Intent> {
        let preamble = self.system_prompt()?;
        let prompt = USER_PROMPT_TEMPLATE
            .replace("{now}", current_time_iso)
            .replace("{events}", &snapshot_json(events, tz)?)
            .replace("{text}", user_text);

        let response = tokio::time::timeout(self.timeout, self.model.complete(&preamble, &prompt))
            .await
            .map_err(|_| {
                Error::ModelUnavailable(format!(
                    "no response within {} seconds",
                    self.timeout.as_secs()
                ))
            })??;

        debug!("Model response: {}", response);
        let raw = parse_model_response(&response)?;
        validate(raw, events)
    }

    fn system_prompt(&self) -> BotResult<String> {
        let schema = serde_json::to_string_pretty(&schemars::schema_for!(ModelIntent))?;
        Ok(SYSTEM_PROMPT
            .replace("{calendars}", &self.calendar_names.join(", "))
            .replace("{schema}", &schema))
    }
}

fn snapshot_json(events: &[CalendarEvent], tz: Tz) -> BotResult<String> {
    let snapshot: Vec<EventSnapshot> = events
        .iter()
        .map(|e| EventSnapshot {
            uid: &e.uid,
            summary: &e.summary,
            start: to_local_iso(&e.start, tz),
            calendar: &e.calendar_name,
        })
        .collect();
    Ok(serde_json::to_string(&snapshot)?)
}

/// Remove a surrounding markdown code fence, if any
pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the language tag line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Attempt to parse the intent object from the model response
pub fn parse_model_response(response: &str) -> BotResult<ModelIntent> {
    let cleaned = strip_code_fences(response);

    // Try the outermost object first, models like to add prose around it
    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            match from_str::<ModelIntent>(&cleaned[start..=end]) {
                Ok(intent) => return Ok(intent),
                Err(e) => warn!("Failed to parse JSON from model response: {}", e),
            }
        }
    }

    from_str::<ModelIntent>(cleaned).map_err(|e| {
        warn!("Could not extract valid JSON from response: {}", response);
        extraction_failure(&format!("model response is not a valid intent: {}", e))
    })
}

/// Check a model payload and turn it into a typed intent
pub fn validate(raw: ModelIntent, events: &[CalendarEvent]) -> BotResult<Intent> {
    let is_valid = raw.is_valid;

    match build_action(&raw, events) {
        Ok(action) => Ok(Intent {
            action,
            is_valid,
            confirmation_text: raw.bot_response.trim().to_string(),
        }),
        // A model that gave up does not owe us a well-formed action
        Err(e) if !is_valid => {
            info!("Model marked the request as invalid: {}", e);
            Err(extraction_failure("model found no calendar request"))
        }
        Err(e) => Err(e),
    }
}

fn build_action(raw: &ModelIntent, events: &[CalendarEvent]) -> BotResult<IntentAction> {
    match raw.action.trim().to_lowercase().as_str() {
        "create" => Ok(IntentAction::Create {
            summary: required(&raw.summary, "summary")?,
            start_iso: required(&raw.start_time_iso, "start_time_iso")?,
            end_iso: required(&raw.end_time_iso, "end_time_iso")?,
            calendar_name: non_empty(&raw.calendar),
        }),
        "update" => Ok(IntentAction::Update {
            uid: known_uid(&raw.uid, events)?,
            summary: non_empty(&raw.summary),
            start_iso: non_empty(&raw.start_time_iso),
            end_iso: non_empty(&raw.end_time_iso),
            calendar_name: non_empty(&raw.calendar),
        }),
        "delete" => Ok(IntentAction::Delete {
            uid: known_uid(&raw.uid, events)?,
        }),
        other => Err(extraction_failure(&format!("unknown action '{}'", other))),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(value: &Option<String>, field: &str) -> BotResult<String> {
    non_empty(value).ok_or_else(|| extraction_failure(&format!("missing {}", field)))
}

fn known_uid(uid: &Option<String>, events: &[CalendarEvent]) -> BotResult<String> {
    let uid = non_empty(uid)
        .ok_or_else(|| Error::EventNotFound("model did not name an event".to_string()))?;

    if events.iter().any(|e| e.uid == uid) {
        Ok(uid)
    } else {
        Err(Error::EventNotFound(format!(
            "uid '{}' is not one of the known events",
            uid
        )))
    }
}
