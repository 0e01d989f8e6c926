use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What the user asked to do with their calendar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentAction {
    Create {
        summary: String,
        start_iso: String,
        end_iso: String,
        calendar_name: Option<String>,
    },
    /// `None` fields keep their stored value
    Update {
        uid: String,
        summary: Option<String>,
        start_iso: Option<String>,
        end_iso: Option<String>,
        calendar_name: Option<String>,
    },
    Delete {
        uid: String,
    },
}

/// A checked request extracted from a chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub action: IntentAction,
    pub is_valid: bool,
    /// Model-written text for the user
    pub confirmation_text: String,
}

impl Intent {
    /// Short name of the action for logs
    pub fn kind(&self) -> &'static str {
        match self.action {
            IntentAction::Create { .. } => "create",
            IntentAction::Update { .. } => "update",
            IntentAction::Delete { .. } => "delete",
        }
    }
}

/// JSON object the language model is asked to produce.
///
/// Nothing here is trusted until the extractor has checked it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ModelIntent {
    /// One of "create", "update" or "delete".
    pub action: String,
    /// The title of the event, e.g. "Lunch With Alice".
    #[serde(default)]
    pub summary: Option<String>,
    /// Start time in strict ISO 8601 without timezone, e.g. "2026-02-28T14:00:00".
    #[serde(default)]
    pub start_time_iso: Option<String>,
    /// End time in strict ISO 8601 without timezone. Assume one hour when not given.
    #[serde(default)]
    pub end_time_iso: Option<String>,
    /// uid of the existing event to update or delete, copied from the event list.
    #[serde(default)]
    pub uid: Option<String>,
    /// Short friendly confirmation for the user.
    #[serde(default)]
    pub bot_response: String,
    /// Calendar to put the event in.
    #[serde(default)]
    pub calendar: Option<String>,
    /// True if a calendar action could be extracted, false if not.
    #[serde(default)]
    pub is_valid: bool,
}

/// Existing event as shown to the model
#[derive(Debug, Clone, Serialize)]
pub struct EventSnapshot<'a> {
    pub uid: &'a str,
    pub summary: &'a str,
    /// Local time without offset
    pub start: String,
    pub calendar: &'a str,
}
