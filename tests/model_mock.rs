use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Europe::Helsinki;
use chrono_tz::Tz;
use kalenteribotti::components::assistant::{
    DispatchOutcome, Dispatcher, Intent, IntentAction, IntentExtractor, LanguageModel,
};
use kalenteribotti::components::calendar_store::{EventStoreHandle, InMemoryBackend};
use kalenteribotti::config::Config;
use kalenteribotti::error::{BotResult, Error};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Language model that replays queued responses
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<BotResult<String>>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A model that takes `delay` to answer
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Queue the next response
    pub async fn respond(&self, response: BotResult<String>) {
        self.responses.lock().await.push_back(response);
    }

    /// User prompts received so far
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _preamble: &str, prompt: &str) -> BotResult<String> {
        self.prompts.lock().await.push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(Error::Other("no scripted response left".to_string())))
    }
}

struct Harness {
    model: Arc<ScriptedModel>,
    backend: Arc<InMemoryBackend>,
    store: EventStoreHandle,
    dispatcher: Dispatcher,
}

fn test_config() -> Arc<Config> {
    let config = Config::from_lookup(|key| match key {
        "DISCORD_TOKEN" => Some("test_token".to_string()),
        "GEMINI_API_KEY" => Some("test_key".to_string()),
        "CALENDAR_BACKEND" => Some("memory".to_string()),
        "TIMEZONE" => Some("Europe/Helsinki".to_string()),
        _ => None,
    })
    .unwrap();
    Arc::new(config)
}

fn harness_with(model: ScriptedModel, timeout: Duration) -> Harness {
    let config = test_config();
    let model = Arc::new(model);
    let backend = Arc::new(InMemoryBackend::with_calendars(&["Personal", "Work"]));
    let store = EventStoreHandle::new(backend.clone());
    let extractor = IntentExtractor::new(model.clone(), config.calendar_names.clone(), timeout);
    let dispatcher = Dispatcher::new(config, extractor, store.clone());

    Harness {
        model,
        backend,
        store,
        dispatcher,
    }
}

fn harness() -> Harness {
    harness_with(ScriptedModel::new(), Duration::from_secs(5))
}

fn received_at() -> DateTime<Tz> {
    Helsinki.with_ymd_and_hms(2026, 2, 28, 9, 0, 0).unwrap()
}

fn lunch_response() -> String {
    r#"```json
{
  "action": "create",
  "summary": "Lunch With Alice",
  "start_time_iso": "2026-03-01T13:00:00",
  "end_time_iso": "2026-03-01T14:00:00",
  "bot_response": "Lunch with Alice is in your calendar!",
  "calendar": null,
  "is_valid": true
}
```"#
        .to_string()
}

#[tokio::test]
async fn test_create_from_message() {
    let h = harness();
    h.model.respond(Ok(lunch_response())).await;

    let outcome = h
        .dispatcher
        .handle_message("Lunch with Alice tomorrow 1pm", received_at())
        .await;

    let DispatchOutcome::Created { event, .. } = &outcome else {
        panic!("expected a created event, got {:?}", outcome);
    };
    assert_eq!(event.summary, "Lunch With Alice");
    assert_eq!(event.calendar_name, "Personal");
    assert_eq!(event.start, Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap());
    assert_eq!(event.end, Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());

    let text = outcome.render(Helsinki);
    assert!(text.contains("01-03-2026"));
    assert!(text.contains("13:00"));
    assert!(text.contains("14:00"));

    let prompts = h.model.prompts().await;
    assert!(prompts[0].contains("2026-02-28T09:00:00"));
    assert!(prompts[0].contains("Lunch with Alice tomorrow 1pm"));

    let stored = h.store.find_by_uid(&event.uid).await.unwrap();
    assert_eq!(&stored, event);
}

#[tokio::test]
async fn test_invalid_intent_does_not_touch_store() {
    let h = harness();
    h.model
        .respond(Ok(r#"{"action": "delete", "bot_response": "Cancel what?", "is_valid": false}"#.to_string()))
        .await;

    let outcome = h.dispatcher.handle_message("cancel that", received_at()).await;

    assert_eq!(outcome, DispatchOutcome::NotUnderstood);
    assert_eq!(h.backend.mutation_count(), 0);
    assert_eq!(h.backend.event_count().await, 0);
}

#[tokio::test]
async fn test_garbage_response_is_not_understood() {
    let h = harness();
    h.model
        .respond(Ok("I'm sorry, I can't do that.".to_string()))
        .await;

    let outcome = h.dispatcher.handle_message("hello there", received_at()).await;

    assert_eq!(outcome, DispatchOutcome::NotUnderstood);
    assert_eq!(h.backend.mutation_count(), 0);
}

#[tokio::test]
async fn test_quota_error_has_its_own_reply() {
    let h = harness();
    h.model
        .respond(Err(Error::QuotaExceeded("429 RESOURCE_EXHAUSTED".to_string())))
        .await;

    let outcome = h
        .dispatcher
        .handle_message("Lunch with Alice tomorrow 1pm", received_at())
        .await;

    assert_eq!(outcome, DispatchOutcome::QuotaExceeded);
    assert_eq!(h.backend.mutation_count(), 0);
    assert_ne!(
        outcome.render(Helsinki),
        DispatchOutcome::Failed("quota".to_string()).render(Helsinki)
    );
}

#[tokio::test]
async fn test_end_before_start_is_rejected() {
    let h = harness();
    h.model
        .respond(Ok(r#"{
            "action": "create",
            "summary": "Backwards",
            "start_time_iso": "2026-03-01T14:00:00",
            "end_time_iso": "2026-03-01T13:00:00",
            "bot_response": "Done",
            "is_valid": true
        }"#
        .to_string()))
        .await;

    let outcome = h.dispatcher.handle_message("backwards meeting", received_at()).await;

    assert!(matches!(outcome, DispatchOutcome::InvalidTime(_)));
    assert_eq!(h.backend.mutation_count(), 0);
}

#[tokio::test]
async fn test_malformed_time_is_rejected() {
    let h = harness();
    h.model
        .respond(Ok(r#"{
            "action": "create",
            "summary": "Sometime",
            "start_time_iso": "next tuesday",
            "end_time_iso": "2026-03-01T13:00:00",
            "bot_response": "Done",
            "is_valid": true
        }"#
        .to_string()))
        .await;

    let outcome = h.dispatcher.handle_message("sometime", received_at()).await;

    assert!(matches!(outcome, DispatchOutcome::InvalidTime(_)));
    assert_eq!(h.backend.mutation_count(), 0);
}

#[tokio::test]
async fn test_empty_uid_aborts_without_store_calls() {
    let h = harness();

    for action in [
        IntentAction::Update {
            uid: String::new(),
            summary: Some("Renamed".to_string()),
            start_iso: None,
            end_iso: None,
            calendar_name: None,
        },
        IntentAction::Delete {
            uid: "  ".to_string(),
        },
    ] {
        let intent = Intent {
            action,
            is_valid: true,
            confirmation_text: String::new(),
        };
        let outcome = h.dispatcher.execute(intent, Helsinki, &[]).await;
        assert_eq!(outcome, DispatchOutcome::UnknownEvent);
    }

    assert_eq!(h.backend.mutation_count(), 0);
}

#[tokio::test]
async fn test_unknown_uid_is_not_used() {
    let h = harness();
    h.model
        .respond(Ok(r#"{"action": "delete", "uid": "invented", "bot_response": "Gone", "is_valid": true}"#.to_string()))
        .await;

    let outcome = h.dispatcher.handle_message("delete the meeting", received_at()).await;

    assert_eq!(outcome, DispatchOutcome::UnknownEvent);
    assert_eq!(h.backend.delete_count(), 0);
}

#[tokio::test]
async fn test_update_moves_start_only() {
    let h = harness();
    let lunch = h
        .store
        .create_event(
            "Personal",
            "Lunch",
            Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        )
        .await
        .unwrap();

    h.model
        .respond(Ok(format!(
            r#"{{"action": "update", "uid": "{}", "start_time_iso": "2026-03-01T13:00:00", "calendar": "Nowhere", "bot_response": "Moved!", "is_valid": true}}"#,
            lunch.uid
        )))
        .await;

    let outcome = h.dispatcher.handle_message("move lunch to 13", received_at()).await;

    let DispatchOutcome::Updated { event, confirmation } = outcome else {
        panic!("expected an update");
    };
    assert_eq!(confirmation, "Moved!");
    assert_eq!(event.uid, lunch.uid);
    assert_eq!(event.summary, "Lunch");
    assert_eq!(event.calendar_name, "Personal");
    assert_eq!(event.start, Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap());
    assert_eq!(event.end, lunch.end);
}

#[tokio::test]
async fn test_delete_from_message() {
    let h = harness();
    let gym = h
        .store
        .create_event(
            "Personal",
            "Gym",
            Utc.with_ymd_and_hms(2026, 3, 6, 15, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 6, 16, 0, 0).unwrap(),
        )
        .await
        .unwrap();

    h.model
        .respond(Ok(format!(
            r#"{{"action": "DELETE", "uid": "{}", "bot_response": "", "is_valid": true}}"#,
            gym.uid
        )))
        .await;

    let outcome = h.dispatcher.handle_message("cancel the gym on friday", received_at()).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Deleted {
            uid: gym.uid.clone(),
            summary: Some("Gym".to_string()),
            confirmation: String::new(),
        }
    );
    assert!(outcome.render(Helsinki).contains("Gym"));
    assert_eq!(h.backend.event_count().await, 0);
    assert!(matches!(
        h.store.find_by_uid(&gym.uid).await,
        Err(Error::EventNotFound(_))
    ));
}

#[tokio::test]
async fn test_unknown_calendar_falls_back_to_default() {
    let h = harness();
    h.model
        .respond(Ok(r#"{
            "action": "create",
            "summary": "Board games",
            "start_time_iso": "2026-03-01T18:00:00Z",
            "end_time_iso": "2026-03-01T21:00:00+02:00",
            "calendar": "Hobbies",
            "bot_response": "Have fun!",
            "is_valid": true
        }"#
        .to_string()))
        .await;

    let outcome = h.dispatcher.handle_message("board games sunday 6pm", received_at()).await;

    let DispatchOutcome::Created { event, .. } = outcome else {
        panic!("expected a created event");
    };
    assert_eq!(event.calendar_name, "Personal");
    assert_eq!(event.start, Utc.with_ymd_and_hms(2026, 3, 1, 16, 0, 0).unwrap());
    assert!(!h.backend.calendar_names().await.contains(&"Hobbies".to_string()));
}

#[tokio::test]
async fn test_store_outage_is_reported() {
    let h = harness();
    h.backend.set_unavailable(true);

    let outcome = h
        .dispatcher
        .handle_message("Lunch with Alice tomorrow 1pm", received_at())
        .await;

    assert!(matches!(outcome, DispatchOutcome::Failed(message) if message.contains("unavailable")));
    assert!(h.model.prompts().await.is_empty());
}

#[tokio::test]
async fn test_slow_model_times_out() {
    let h = harness_with(
        ScriptedModel::slow(Duration::from_secs(5)),
        Duration::from_millis(50),
    );
    h.model.respond(Ok(lunch_response())).await;

    let outcome = h
        .dispatcher
        .handle_message("Lunch with Alice tomorrow 1pm", received_at())
        .await;

    assert!(matches!(outcome, DispatchOutcome::Failed(_)));
    assert_eq!(h.backend.mutation_count(), 0);
}
