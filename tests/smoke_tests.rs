use kalenteribotti::components::calendar_store::{backend_from_config, initialize_calendars, EventStoreHandle};
use kalenteribotti::config::{Config, StoreBackend};
use std::collections::HashMap;

fn config_from(pairs: &[(&str, &str)]) -> kalenteribotti::error::BotResult<Config> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(|key| map.get(key).cloned())
}

/// Smoke test to verify that a minimal config can be loaded
#[tokio::test]
async fn test_config_loads() {
    let config = config_from(&[
        ("DISCORD_TOKEN", "token"),
        ("GEMINI_API_KEY", "key"),
        ("CALDAV_URL", "https://dav.example.com/calendars/user/"),
        ("CALDAV_USERNAME", "user"),
        ("CALDAV_PASSWORD", "secret"),
    ])
    .unwrap();

    assert!(matches!(config.store_backend, StoreBackend::CalDav { .. }));
    assert_eq!(config.default_calendar, "Personal");
    assert_eq!(config.calendar_names.len(), 5);
    assert!(backend_from_config(&config).is_ok());
}

/// Missing credentials are reported, not defaulted
#[tokio::test]
async fn test_config_requires_caldav_credentials() {
    let result = config_from(&[("DISCORD_TOKEN", "token"), ("GEMINI_API_KEY", "key")]);
    assert!(result.is_err());
}

/// Startup creates every configured calendar once
#[tokio::test]
async fn test_initialize_calendars() {
    let config = config_from(&[
        ("DISCORD_TOKEN", "token"),
        ("GEMINI_API_KEY", "key"),
        ("CALENDAR_BACKEND", "memory"),
        ("CALENDARS", "Personal, Work"),
    ])
    .unwrap();

    let store = EventStoreHandle::new(backend_from_config(&config).unwrap());
    initialize_calendars(&store, &config.calendar_names).await;
    initialize_calendars(&store, &config.calendar_names).await;

    assert!(store.ensure_calendar("Personal").await.is_ok());
    assert!(store.list_events().await.unwrap().is_empty());
    assert!(store.shutdown().await.is_ok());
}
