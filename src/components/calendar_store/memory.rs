use super::backend::CalendarBackend;
use super::models::{Calendar, RawEvent};
use crate::error::{store_error, BotResult};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Process-local calendar backend.
///
/// Used for dry runs (`CALENDAR_BACKEND=memory`) and tests. Mutating calls
/// are counted so callers can check that nothing was written.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
    calendars_created: AtomicUsize,
    events_put: AtomicUsize,
    events_deleted: AtomicUsize,
    unavailable: AtomicBool,
}

#[derive(Debug, Default)]
struct State {
    calendars: Vec<(Calendar, Vec<RawEvent>)>,
    // Names whose next creation loses a race against another client
    races: HashSet<String>,
}

impl InMemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that already holds the named calendars
    pub fn with_calendars(names: &[&str]) -> Self {
        let state = State {
            calendars: names
                .iter()
                .map(|name| (Self::calendar(name), Vec::new()))
                .collect(),
            races: HashSet::new(),
        };
        Self {
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    fn calendar(name: &str) -> Calendar {
        Calendar {
            name: name.to_string(),
            href: format!("/calendars/{}/", name.to_lowercase().replace(' ', "-")),
        }
    }

    /// Store an arbitrary object, bypassing any validation
    pub async fn insert_raw(&self, calendar_name: &str, href: &str, data: &str) {
        let mut state = self.state.lock().await;
        if let Some((_, events)) = state.calendars.iter_mut().find(|(c, _)| c.name == calendar_name) {
            events.push(RawEvent {
                href: href.to_string(),
                data: data.to_string(),
            });
        }
    }

    /// Make the next creation of `name` fail after another client created it
    pub async fn simulate_create_race(&self, name: &str) {
        self.state.lock().await.races.insert(name.to_string());
    }

    /// Make every call fail, as if the server were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Names of all calendars, in creation order
    pub async fn calendar_names(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.calendars.iter().map(|(c, _)| c.name.clone()).collect()
    }

    /// Number of event objects across all calendars
    pub async fn event_count(&self) -> usize {
        let state = self.state.lock().await;
        state.calendars.iter().map(|(_, events)| events.len()).sum()
    }

    /// Number of writes of any kind performed so far
    pub fn mutation_count(&self) -> usize {
        self.calendars_created.load(Ordering::SeqCst)
            + self.events_put.load(Ordering::SeqCst)
            + self.events_deleted.load(Ordering::SeqCst)
    }

    /// Number of event deletions performed so far
    pub fn delete_count(&self) -> usize {
        self.events_deleted.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> BotResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(store_error("Calendar server unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CalendarBackend for InMemoryBackend {
    async fn list_calendars(&self) -> BotResult<Vec<Calendar>> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state.calendars.iter().map(|(c, _)| c.clone()).collect())
    }

    async fn create_calendar(&self, name: &str) -> BotResult<Calendar> {
        self.check_available()?;
        let mut state = self.state.lock().await;

        if state.races.remove(name) {
            state.calendars.push((Self::calendar(name), Vec::new()));
            return Err(store_error(&format!("Calendar '{}' already exists", name)));
        }

        if state.calendars.iter().any(|(c, _)| c.name == name) {
            return Err(store_error(&format!("Calendar '{}' already exists", name)));
        }

        let calendar = Self::calendar(name);
        state.calendars.push((calendar.clone(), Vec::new()));
        self.calendars_created.fetch_add(1, Ordering::SeqCst);
        Ok(calendar)
    }

    async fn list_events(&self, calendar: &Calendar) -> BotResult<Vec<RawEvent>> {
        self.check_available()?;
        let state = self.state.lock().await;
        state
            .calendars
            .iter()
            .find(|(c, _)| c.href == calendar.href)
            .map(|(_, events)| events.clone())
            .ok_or_else(|| store_error(&format!("No calendar at {}", calendar.href)))
    }

    fn event_href(&self, calendar: &Calendar, uid: &str) -> BotResult<String> {
        if uid.is_empty() {
            return Err(store_error("Event uid must not be empty"));
        }
        Ok(format!("{}{}.ics", calendar.href, uid))
    }

    async fn put_event(&self, calendar: &Calendar, href: &str, ics: &str) -> BotResult<()> {
        self.check_available()?;
        let mut state = self.state.lock().await;

        let (_, events) = state
            .calendars
            .iter_mut()
            .find(|(c, _)| c.href == calendar.href)
            .ok_or_else(|| store_error(&format!("No calendar at {}", calendar.href)))?;

        if events.iter().any(|e| e.href == href) {
            return Err(store_error(&format!("Event already exists at {}", href)));
        }

        events.push(RawEvent {
            href: href.to_string(),
            data: ics.to_string(),
        });
        self.events_put.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_event(&self, href: &str) -> BotResult<()> {
        self.check_available()?;
        let mut state = self.state.lock().await;

        for (_, events) in state.calendars.iter_mut() {
            if let Some(pos) = events.iter().position(|e| e.href == href) {
                events.remove(pos);
                self.events_deleted.fetch_add(1, Ordering::SeqCst);
                return Ok(());
            }
        }

        Err(store_error(&format!("No event at {}", href)))
    }
}
