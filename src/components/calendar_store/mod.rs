mod actor;
pub mod backend;
pub mod caldav;
mod handle;
pub mod ics;
pub mod memory;
pub mod models;

pub use backend::CalendarBackend;
pub use caldav::CalDavBackend;
pub use handle::EventStoreHandle;
pub use memory::InMemoryBackend;
pub use models::{Calendar, CalendarEvent, EventPatch};

use crate::config::{Config, StoreBackend};
use crate::error::BotResult;
use std::sync::Arc;
use tracing::{info, warn};

/// Build the backend selected in the configuration
pub fn backend_from_config(config: &Config) -> BotResult<Arc<dyn CalendarBackend>> {
    match &config.store_backend {
        StoreBackend::CalDav {
            url,
            username,
            password,
        } => {
            info!("Using CalDAV calendar store at {}", url);
            Ok(Arc::new(CalDavBackend::new(url, username, password)?))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory calendar store, events are lost on restart");
            Ok(Arc::new(InMemoryBackend::new()))
        }
    }
}

/// Ensure all configured calendars exist on the server.
///
/// Failures are logged and skipped; the calendar is created again on first use.
pub async fn initialize_calendars(handle: &EventStoreHandle, names: &[String]) {
    for name in names {
        match handle.ensure_calendar(name).await {
            Ok(calendar) => info!("Calendar '{}' ready at {}", calendar.name, calendar.href),
            Err(e) => warn!("Failed to ensure calendar '{}' exists: {}", name, e),
        }
    }
}
