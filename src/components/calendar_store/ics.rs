//! iCalendar encoding of stored events.

use super::models::CalendarEvent;
use crate::utils::time::attach_timezone;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use icalendar::{
    parser::{read_calendar, unfold},
    CalendarDateTime, Component, DatePerhapsTime,
};

/// Length assumed for events stored without DTEND
pub const DEFAULT_EVENT_LENGTH_MINUTES: i64 = 60;

const ICS_DATETIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Generate .ics content for an event
pub fn generate_ics(event: &CalendarEvent) -> String {
    let mut cal = icalendar::Calendar::new();

    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&event.uid);
    ics_event.summary(&event.summary);

    let dtstamp = Utc::now().format(ICS_DATETIME_FORMAT).to_string();
    ics_event.add_property("DTSTAMP", &dtstamp);

    // Always written in UTC, the reader converts for display
    ics_event.add_property("DTSTART", event.start.format(ICS_DATETIME_FORMAT).to_string());
    ics_event.add_property("DTEND", event.end.format(ICS_DATETIME_FORMAT).to_string());

    cal.push(ics_event.done());
    cal.done().to_string()
}

/// Parse the first VEVENT of an iCalendar object.
///
/// Returns `None` unless UID, SUMMARY and DTSTART are all present and
/// readable. A missing or unreadable DTEND falls back to a one hour event.
pub fn parse_event(content: &str, calendar_name: &str) -> Option<CalendarEvent> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).ok()?;
    let vevent = calendar.components.iter().find(|c| c.name == "VEVENT")?;

    let uid = vevent.find_prop("UID")?.val.to_string();
    let summary = vevent.find_prop("SUMMARY")?.val.to_string();
    if uid.trim().is_empty() {
        return None;
    }

    let start = to_utc(DatePerhapsTime::try_from(vevent.find_prop("DTSTART")?).ok()?)?;
    let end = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .and_then(to_utc)
        .filter(|end| *end > start)
        .unwrap_or(start + Duration::minutes(DEFAULT_EVENT_LENGTH_MINUTES));

    Some(CalendarEvent {
        uid,
        summary,
        start,
        end,
        calendar_name: calendar_name.to_string(),
    })
}

/// Collapse icalendar's time variants into a UTC instant.
///
/// Floating times carry no zone and are read as UTC. Dates become midnight.
fn to_utc(dpt: DatePerhapsTime) -> Option<DateTime<Utc>> {
    match dpt {
        DatePerhapsTime::Date(d) => d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => Some(dt),
            CalendarDateTime::Floating(naive) => Some(naive.and_utc()),
            CalendarDateTime::WithTimezone { date_time, tzid } => {
                let tz: Tz = tzid.parse().ok()?;
                attach_timezone(date_time, tz)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            }
        },
    }
}
