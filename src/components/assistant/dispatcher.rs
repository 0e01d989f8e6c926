use super::extractor::IntentExtractor;
use super::models::{Intent, IntentAction};
use crate::components::calendar_store::{CalendarEvent, EventPatch, EventStoreHandle};
use crate::config::Config;
use crate::error::{malformed_timestamp, BotResult, Error};
use crate::utils::time::{format_local_date, format_local_time, normalize, LOCAL_ISO_FORMAT};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_i18n::t;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of handling one chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Created {
        event: CalendarEvent,
        confirmation: String,
    },
    Updated {
        event: CalendarEvent,
        confirmation: String,
    },
    Deleted {
        uid: String,
        summary: Option<String>,
        confirmation: String,
    },
    /// No calendar request could be read from the message
    NotUnderstood,
    /// The request named an event we could not identify
    UnknownEvent,
    InvalidTime(String),
    QuotaExceeded,
    Failed(String),
}

impl DispatchOutcome {
    fn from_error(err: Error) -> Self {
        match err {
            Error::QuotaExceeded(_) => DispatchOutcome::QuotaExceeded,
            Error::ExtractionFailure(_) => DispatchOutcome::NotUnderstood,
            Error::EventNotFound(_) => DispatchOutcome::UnknownEvent,
            Error::MalformedTimestamp(details) => DispatchOutcome::InvalidTime(details),
            other => DispatchOutcome::Failed(other.to_string()),
        }
    }

    /// Whether the calendar was changed
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            DispatchOutcome::Created { .. }
                | DispatchOutcome::Updated { .. }
                | DispatchOutcome::Deleted { .. }
        )
    }

    /// Text for the user, with times shown in `tz`
    pub fn render(&self, tz: Tz) -> String {
        match self {
            DispatchOutcome::Created {
                event,
                confirmation,
            }
            | DispatchOutcome::Updated {
                event,
                confirmation,
            } => {
                let details = t!(
                    "reply_event_details",
                    summary = &event.summary,
                    date = format_local_date(&event.start, tz),
                    start = format_local_time(&event.start, tz),
                    end = format_local_time(&event.end, tz),
                    calendar = &event.calendar_name
                );
                if confirmation.is_empty() {
                    details.to_string()
                } else {
                    format!("{}\n{}", confirmation, details)
                }
            }
            DispatchOutcome::Deleted {
                summary,
                confirmation,
                ..
            } => {
                if !confirmation.is_empty() {
                    confirmation.clone()
                } else if let Some(summary) = summary {
                    t!("reply_deleted", summary = summary).to_string()
                } else {
                    t!("reply_deleted_unnamed").to_string()
                }
            }
            DispatchOutcome::NotUnderstood => t!("reply_not_understood").to_string(),
            DispatchOutcome::UnknownEvent => t!("reply_unknown_event").to_string(),
            DispatchOutcome::InvalidTime(details) => {
                t!("reply_invalid_time", details = details).to_string()
            }
            DispatchOutcome::QuotaExceeded => t!("reply_quota_exceeded").to_string(),
            DispatchOutcome::Failed(message) => t!("reply_failed", error = message).to_string(),
        }
    }
}

/// Runs the message pipeline: snapshot, extract, execute
pub struct Dispatcher {
    config: Arc<Config>,
    extractor: IntentExtractor,
    store: EventStoreHandle,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>, extractor: IntentExtractor, store: EventStoreHandle) -> Self {
        Self {
            config,
            extractor,
            store,
        }
    }

    /// Handle a message and render the reply in the sender's timezone
    pub async fn reply(&self, text: &str, received_at: DateTime<Tz>) -> String {
        let outcome = self.handle_message(text, received_at).await;
        if outcome.is_success() {
            info!("Calendar changed: {:?}", outcome);
        }
        outcome.render(received_at.timezone())
    }

    /// Handle one chat message received at `received_at`.
    ///
    /// The timezone of `received_at` is used to read every time the model
    /// returns.
    pub async fn handle_message(&self, text: &str, received_at: DateTime<Tz>) -> DispatchOutcome {
        let tz = received_at.timezone();

        let snapshot = match self.store.list_events().await {
            Ok(events) => events,
            Err(e) => {
                error!("Failed to list events: {}", e);
                return DispatchOutcome::from_error(e);
            }
        };

        let now = received_at.format(LOCAL_ISO_FORMAT).to_string();
        let intent = match self.extractor.extract(text, &now, &snapshot, tz).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!("Intent extraction failed: {}", e);
                return DispatchOutcome::from_error(e);
            }
        };

        self.execute(intent, tz, &snapshot).await
    }

    /// Apply an extracted intent to the calendar
    pub async fn execute(
        &self,
        intent: Intent,
        tz: Tz,
        snapshot: &[CalendarEvent],
    ) -> DispatchOutcome {
        if !intent.is_valid {
            info!("Model found no calendar request");
            return DispatchOutcome::NotUnderstood;
        }

        let kind = intent.kind();
        match self.apply(intent, tz, snapshot).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Failed to {} event: {}", kind, e);
                DispatchOutcome::from_error(e)
            }
        }
    }

    async fn apply(
        &self,
        intent: Intent,
        tz: Tz,
        snapshot: &[CalendarEvent],
    ) -> BotResult<DispatchOutcome> {
        let confirmation = intent.confirmation_text;

        match intent.action {
            IntentAction::Create {
                summary,
                start_iso,
                end_iso,
                calendar_name,
            } => {
                let start = normalize(&start_iso, tz)?;
                let end = normalize(&end_iso, tz)?;
                check_order(&start, &end)?;

                let calendar = self.config.calendar_for_new_event(calendar_name.as_deref());
                let event = self.store.create_event(&calendar, &summary, start, end).await?;
                Ok(DispatchOutcome::Created {
                    event,
                    confirmation,
                })
            }
            IntentAction::Update {
                uid,
                summary,
                start_iso,
                end_iso,
                calendar_name,
            } => {
                require_uid(&uid)?;
                let patch = EventPatch {
                    summary,
                    start: start_iso.as_deref().map(|s| normalize(s, tz)).transpose()?,
                    end: end_iso.as_deref().map(|s| normalize(s, tz)).transpose()?,
                    calendar_name: calendar_name.and_then(|name| {
                        let allowed = self.config.allowed_calendar(&name);
                        if allowed.is_none() {
                            warn!("Ignoring unknown calendar '{}' in update", name);
                        }
                        allowed
                    }),
                };

                let event = self.store.update_event(&uid, patch).await?;
                Ok(DispatchOutcome::Updated {
                    event,
                    confirmation,
                })
            }
            IntentAction::Delete { uid } => {
                require_uid(&uid)?;
                let summary = snapshot
                    .iter()
                    .find(|e| e.uid == uid)
                    .map(|e| e.summary.clone());

                self.store.delete_event(&uid).await?;
                Ok(DispatchOutcome::Deleted {
                    uid,
                    summary,
                    confirmation,
                })
            }
        }
    }
}

fn require_uid(uid: &str) -> BotResult<()> {
    if uid.trim().is_empty() {
        return Err(Error::EventNotFound("no uid given".to_string()));
    }
    Ok(())
}

fn check_order(start: &DateTime<Utc>, end: &DateTime<Utc>) -> BotResult<()> {
    if end <= start {
        return Err(malformed_timestamp("the event must end after it starts"));
    }
    Ok(())
}
