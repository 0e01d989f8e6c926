use super::backend::CalendarBackend;
use super::ics::{generate_ics, parse_event};
use super::models::{Calendar, CalendarEvent, EventPatch};
use crate::error::{event_not_found, malformed_timestamp, store_error, BotResult, Error};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// The event store actor that owns the backend connection
pub struct EventStoreActor {
    backend: Arc<dyn CalendarBackend>,
    command_rx: mpsc::Receiver<EventStoreCommand>,
}

/// Data for a new event
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub calendar_name: String,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Commands that can be sent to the event store actor
pub enum EventStoreCommand {
    ListEvents(oneshot::Sender<BotResult<Vec<CalendarEvent>>>),
    EnsureCalendar(String, oneshot::Sender<BotResult<Calendar>>),
    CreateEvent(NewEvent, oneshot::Sender<BotResult<CalendarEvent>>),
    FindByUid(String, oneshot::Sender<BotResult<CalendarEvent>>),
    UpdateEvent(String, EventPatch, oneshot::Sender<BotResult<CalendarEvent>>),
    DeleteEvent(String, oneshot::Sender<BotResult<()>>),
    Shutdown,
}

/// Handle for communicating with the event store actor
#[derive(Clone)]
pub struct EventStoreActorHandle {
    command_tx: mpsc::Sender<EventStoreCommand>,
}

/// An event together with where it lives on the server
struct StoredEvent {
    event: CalendarEvent,
    href: String,
}

impl EventStoreActorHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<BotResult<T>>) -> EventStoreCommand,
    ) -> BotResult<T> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(build(response_tx))
            .await
            .map_err(|e| store_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .await
            .map_err(|_| store_error("Response channel closed"))?
    }

    /// Every readable event across all calendars
    pub async fn list_events(&self) -> BotResult<Vec<CalendarEvent>> {
        self.request(EventStoreCommand::ListEvents).await
    }

    /// Get or create a calendar by name
    pub async fn ensure_calendar(&self, name: &str) -> BotResult<Calendar> {
        let name = name.to_string();
        self.request(|tx| EventStoreCommand::EnsureCalendar(name, tx))
            .await
    }

    /// Insert a new event, creating its calendar if needed
    pub async fn create_event(&self, event: NewEvent) -> BotResult<CalendarEvent> {
        self.request(|tx| EventStoreCommand::CreateEvent(event, tx))
            .await
    }

    /// Look up an event by uid
    pub async fn find_by_uid(&self, uid: &str) -> BotResult<CalendarEvent> {
        let uid = uid.to_string();
        self.request(|tx| EventStoreCommand::FindByUid(uid, tx)).await
    }

    /// Replace an event with a patched copy
    pub async fn update_event(&self, uid: &str, patch: EventPatch) -> BotResult<CalendarEvent> {
        let uid = uid.to_string();
        self.request(|tx| EventStoreCommand::UpdateEvent(uid, patch, tx))
            .await
    }

    /// Remove an event
    pub async fn delete_event(&self, uid: &str) -> BotResult<()> {
        let uid = uid.to_string();
        self.request(|tx| EventStoreCommand::DeleteEvent(uid, tx))
            .await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> BotResult<()> {
        let _ = self.command_tx.send(EventStoreCommand::Shutdown).await;
        Ok(())
    }
}

impl EventStoreActor {
    /// Create a new actor and return its handle
    pub fn new(backend: Arc<dyn CalendarBackend>) -> (Self, EventStoreActorHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);

        let actor = Self {
            backend,
            command_rx,
        };

        let handle = EventStoreActorHandle { command_tx };

        (actor, handle)
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Event store actor started");

        // Process commands
        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                EventStoreCommand::ListEvents(response_tx) => {
                    let _ = response_tx.send(self.list_events().await);
                }
                EventStoreCommand::EnsureCalendar(name, response_tx) => {
                    let _ = response_tx.send(self.ensure_calendar(&name).await);
                }
                EventStoreCommand::CreateEvent(event, response_tx) => {
                    let _ = response_tx.send(self.create_event(event).await);
                }
                EventStoreCommand::FindByUid(uid, response_tx) => {
                    let result = self.find_stored(&uid).await.map(|stored| stored.event);
                    let _ = response_tx.send(result);
                }
                EventStoreCommand::UpdateEvent(uid, patch, response_tx) => {
                    let _ = response_tx.send(self.update_event(&uid, patch).await);
                }
                EventStoreCommand::DeleteEvent(uid, response_tx) => {
                    let _ = response_tx.send(self.delete_event(&uid).await);
                }
                EventStoreCommand::Shutdown => {
                    info!("Event store actor shutting down");
                    break;
                }
            }
        }

        info!("Event store actor shut down");
    }

    async fn list_events(&self) -> BotResult<Vec<CalendarEvent>> {
        let mut events = Vec::new();

        for calendar in self.backend.list_calendars().await? {
            for raw in self.backend.list_events(&calendar).await? {
                match parse_event(&raw.data, &calendar.name) {
                    Some(event) => events.push(event),
                    None => warn!(
                        "Skipping unreadable event {} in calendar '{}'",
                        raw.href, calendar.name
                    ),
                }
            }
        }

        events.sort_by_key(|e| e.start);
        Ok(events)
    }

    async fn ensure_calendar(&self, name: &str) -> BotResult<Calendar> {
        let calendars = self.backend.list_calendars().await?;
        if let Some(calendar) = calendars
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
        {
            return Ok(calendar);
        }

        match self.backend.create_calendar(name).await {
            Ok(calendar) => {
                info!("Created calendar '{}'", name);
                Ok(calendar)
            }
            Err(e) => {
                // Someone else may have created it in the meantime
                warn!("Error creating calendar '{}', may already exist: {}", name, e);
                self.backend
                    .list_calendars()
                    .await?
                    .into_iter()
                    .find(|c| c.name.eq_ignore_ascii_case(name))
                    .ok_or(e)
            }
        }
    }

    async fn create_event(&self, new: NewEvent) -> BotResult<CalendarEvent> {
        if new.summary.trim().is_empty() {
            return Err(Error::Store("Event summary must not be empty".to_string()));
        }
        check_time_order(&new.start, &new.end)?;

        let calendar = self.ensure_calendar(&new.calendar_name).await?;
        let event = CalendarEvent {
            uid: Uuid::new_v4().to_string(),
            summary: new.summary,
            start: new.start,
            end: new.end,
            calendar_name: calendar.name.clone(),
        };

        let href = self.backend.event_href(&calendar, &event.uid)?;
        self.backend
            .put_event(&calendar, &href, &generate_ics(&event))
            .await?;
        info!("Created event {} in '{}'", event.uid, event.calendar_name);
        Ok(event)
    }

    async fn find_stored(&self, uid: &str) -> BotResult<StoredEvent> {
        for calendar in self.backend.list_calendars().await? {
            for raw in self.backend.list_events(&calendar).await? {
                if let Some(event) = parse_event(&raw.data, &calendar.name) {
                    if event.uid == uid {
                        return Ok(StoredEvent {
                            event,
                            href: raw.href,
                        });
                    }
                }
            }
        }

        Err(event_not_found(uid))
    }

    /// Delete the stored event, then recreate it with merged fields.
    ///
    /// Not atomic: a failure between the two writes leaves the event
    /// deleted. The uid is reused so the event keeps its identity.
    async fn update_event(&self, uid: &str, patch: EventPatch) -> BotResult<CalendarEvent> {
        let stored = self.find_stored(uid).await?;
        let mut updated = patch.merge_into(&stored.event);
        check_time_order(&updated.start, &updated.end)?;

        // Resolve the target and its object href before touching anything
        let target = self.ensure_calendar(&updated.calendar_name).await?;
        updated.calendar_name = target.name.clone();
        let target_href = self.backend.event_href(&target, &updated.uid)?;
        let ics = generate_ics(&updated);

        debug!("Deleting {} before recreating it in '{}'", stored.href, target.name);
        self.backend.delete_event(&stored.href).await?;

        if let Err(e) = self.backend.put_event(&target, &target_href, &ics).await {
            error!(
                "Event {} ('{}') was deleted but could not be recreated: {}",
                uid, stored.event.summary, e
            );
            return Err(e);
        }

        info!("Updated event {} in '{}'", uid, updated.calendar_name);
        Ok(updated)
    }

    async fn delete_event(&self, uid: &str) -> BotResult<()> {
        let stored = self.find_stored(uid).await?;
        self.backend.delete_event(&stored.href).await?;
        info!("Deleted event {} from '{}'", uid, stored.event.calendar_name);
        Ok(())
    }
}

fn check_time_order(start: &DateTime<Utc>, end: &DateTime<Utc>) -> BotResult<()> {
    if end <= start {
        return Err(malformed_timestamp(&format!(
            "end {} is not after start {}",
            end.to_rfc3339(),
            start.to_rfc3339()
        )));
    }
    Ok(())
}
