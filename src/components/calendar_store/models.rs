use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event as stored in a calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Identifier assigned at creation, kept across updates
    pub uid: String,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Display name of the calendar holding the event
    pub calendar_name: String,
}

/// Named event collection on the remote server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calendar {
    pub name: String,
    /// Collection location, relative to the store root
    pub href: String,
}

/// Event object exactly as the backend returned it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub href: String,
    /// iCalendar text
    pub data: String,
}

/// Fields to change on an existing event; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub summary: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub calendar_name: Option<String>,
}

impl EventPatch {
    /// Apply the patch on top of an existing event
    pub fn merge_into(&self, event: &CalendarEvent) -> CalendarEvent {
        CalendarEvent {
            uid: event.uid.clone(),
            summary: self.summary.clone().unwrap_or_else(|| event.summary.clone()),
            start: self.start.unwrap_or(event.start),
            end: self.end.unwrap_or(event.end),
            calendar_name: self
                .calendar_name
                .clone()
                .unwrap_or_else(|| event.calendar_name.clone()),
        }
    }
}
