use super::actor::{EventStoreActor, EventStoreActorHandle, NewEvent};
use super::backend::CalendarBackend;
use super::models::{Calendar, CalendarEvent, EventPatch};
use crate::error::BotResult;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Handle for interacting with the event store actor
#[derive(Clone)]
pub struct EventStoreHandle {
    actor_handle: EventStoreActorHandle,
    _actor_task: Arc<JoinHandle<()>>,
}

impl EventStoreHandle {
    /// Create a new EventStoreHandle and spawn the actor
    pub fn new(backend: Arc<dyn CalendarBackend>) -> Self {
        // Create the actor and get its handle
        let (mut actor, handle) = EventStoreActor::new(backend);

        // Spawn a task to run the actor
        let actor_task = tokio::spawn(async move {
            actor.run().await;
        });

        Self {
            actor_handle: handle,
            _actor_task: Arc::new(actor_task),
        }
    }

    /// Every readable event across all calendars, oldest first
    pub async fn list_events(&self) -> BotResult<Vec<CalendarEvent>> {
        self.actor_handle.list_events().await
    }

    /// Get or create a calendar by name
    pub async fn ensure_calendar(&self, name: &str) -> BotResult<Calendar> {
        self.actor_handle.ensure_calendar(name).await
    }

    /// Insert a new event, creating the calendar if it is missing
    pub async fn create_event(
        &self,
        calendar_name: &str,
        summary: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BotResult<CalendarEvent> {
        self.actor_handle
            .create_event(NewEvent {
                calendar_name: calendar_name.to_string(),
                summary: summary.to_string(),
                start,
                end,
            })
            .await
    }

    /// Look up an event by uid
    pub async fn find_by_uid(&self, uid: &str) -> BotResult<CalendarEvent> {
        self.actor_handle.find_by_uid(uid).await
    }

    /// Delete-then-recreate update; see the actor for the failure window
    pub async fn update_event(&self, uid: &str, patch: EventPatch) -> BotResult<CalendarEvent> {
        self.actor_handle.update_event(uid, patch).await
    }

    /// Remove an event
    pub async fn delete_event(&self, uid: &str) -> BotResult<()> {
        self.actor_handle.delete_event(uid).await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> BotResult<()> {
        self.actor_handle.shutdown().await
    }
}
