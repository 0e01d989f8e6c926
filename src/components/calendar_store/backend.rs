use super::models::{Calendar, RawEvent};
use crate::error::BotResult;
use async_trait::async_trait;

/// Remote calendar server as seen by the event store.
///
/// Implementations only move objects around. Parsing, merging and
/// identity rules live in the store actor.
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    /// Every calendar collection the account can see
    async fn list_calendars(&self) -> BotResult<Vec<Calendar>>;

    /// Create a calendar with the given display name
    async fn create_calendar(&self, name: &str) -> BotResult<Calendar>;

    /// Every event object in a calendar, unparsed
    async fn list_events(&self, calendar: &Calendar) -> BotResult<Vec<RawEvent>>;

    /// Where the object for `uid` lives in `calendar`
    fn event_href(&self, calendar: &Calendar, uid: &str) -> BotResult<String>;

    /// Store a new event object at `href`, a value from [`event_href`]
    ///
    /// [`event_href`]: CalendarBackend::event_href
    async fn put_event(&self, calendar: &Calendar, href: &str, ics: &str) -> BotResult<()>;

    /// Remove the event object at `href`
    async fn delete_event(&self, href: &str) -> BotResult<()>;
}
