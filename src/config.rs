use crate::error::{config_error, env_error, BotResult};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;
use std::time::Duration;

/// Default activity text for the bot
pub const DEFAULT_ACTIVITY: &str = "Kirjoittaa kalenteriin";

/// Calendars created at startup unless configured otherwise
pub const DEFAULT_CALENDARS: [&str; 5] = ["Personal", "Work", "Fitness", "Social", "Other"];

/// Calendar used when the model does not pick one
pub const DEFAULT_CALENDAR: &str = "Personal";

/// Gemini model used for intent extraction
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Seconds to wait for the model before giving up
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;

const CALENDARS_FILE: &str = "config/calendars.toml";

/// Which calendar store the bot talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Remote CalDAV server
    CalDav {
        url: String,
        username: String,
        password: String,
    },
    /// Process-local store, lost on restart
    Memory,
}

/// Main configuration structure for the bot
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord bot token
    pub discord_token: String,
    /// Gemini API key
    pub gemini_api_key: String,
    /// Gemini model name
    pub gemini_model: String,
    /// Upper bound for a single model call
    pub llm_timeout: Duration,
    /// Calendar store connection
    pub store_backend: StoreBackend,
    /// Allowed calendar names
    pub calendar_names: Vec<String>,
    /// Calendar used when none is given
    pub default_calendar: String,
    /// Reject calendar names outside `calendar_names`
    pub enforce_calendar_names: bool,
    /// Reference timezone for incoming messages
    pub timezone: String,
    /// Bot activity status text
    pub activity: String,
    /// Locale for replies
    pub bot_locale: String,
    /// Channel whose plain messages are treated as requests
    pub listen_channel_id: Option<u64>,
}

/// Optional overrides read from `config/calendars.toml`
#[derive(Debug, Default, Deserialize)]
struct CalendarsFile {
    names: Option<Vec<String>>,
    default: Option<String>,
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> BotResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let mut config = Self::from_lookup(|key| env::var(key).ok())?;

        if let Ok(content) = fs::read_to_string(CALENDARS_FILE) {
            let file: CalendarsFile = toml::from_str(&content)?;
            config.apply_calendars_file(file)?;
        }

        Ok(config)
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> BotResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| env_error(key));

        let discord_token = required("DISCORD_TOKEN")?;
        let gemini_api_key = required("GEMINI_API_KEY")?;
        let gemini_model =
            lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        let llm_timeout = match lookup("LLM_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| config_error("Invalid LLM_TIMEOUT_SECS format"))?,
            None => DEFAULT_LLM_TIMEOUT_SECS,
        };

        let store_backend = match lookup("CALENDAR_BACKEND").as_deref() {
            None | Some("caldav") => StoreBackend::CalDav {
                url: required("CALDAV_URL")?,
                username: required("CALDAV_USERNAME")?,
                password: required("CALDAV_PASSWORD")?,
            },
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(config_error(&format!("Unknown CALENDAR_BACKEND: {}", other)));
            }
        };

        let calendar_names = match lookup("CALENDARS") {
            Some(raw) => split_names(&raw),
            None => DEFAULT_CALENDARS.iter().map(|s| s.to_string()).collect(),
        };
        let default_calendar =
            lookup("DEFAULT_CALENDAR").unwrap_or_else(|| DEFAULT_CALENDAR.to_string());

        let enforce_calendar_names = match lookup("ENFORCE_CALENDAR_NAMES") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| config_error("Invalid ENFORCE_CALENDAR_NAMES format"))?,
            None => true,
        };

        let listen_channel_id = lookup("LISTEN_CHANNEL_ID")
            .map(|raw| {
                raw.parse::<u64>()
                    .map_err(|_| config_error("Invalid LISTEN_CHANNEL_ID format"))
            })
            .transpose()?;

        let config = Config {
            discord_token,
            gemini_api_key,
            gemini_model,
            llm_timeout: Duration::from_secs(llm_timeout),
            store_backend,
            calendar_names,
            default_calendar,
            enforce_calendar_names,
            timezone: lookup("TIMEZONE").unwrap_or_else(|| String::from("UTC")),
            activity: lookup("BOT_ACTIVITY").unwrap_or_else(|| String::from(DEFAULT_ACTIVITY)),
            bot_locale: lookup("BOT_LOCALE").unwrap_or_else(|| String::from("en")),
            listen_channel_id,
        };

        config.validate()?;
        Ok(config)
    }

    fn apply_calendars_file(&mut self, file: CalendarsFile) -> BotResult<()> {
        if let Some(names) = file.names {
            self.calendar_names = names
                .into_iter()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
        }
        if let Some(default) = file.default {
            self.default_calendar = default;
        }
        self.validate()
    }

    fn validate(&self) -> BotResult<()> {
        self.reference_timezone()?;

        if self.calendar_names.is_empty() {
            return Err(config_error("At least one calendar name must be configured"));
        }

        if self.enforce_calendar_names
            && !self
                .calendar_names
                .iter()
                .any(|n| n.eq_ignore_ascii_case(&self.default_calendar))
        {
            return Err(config_error(&format!(
                "Default calendar '{}' is not one of the configured calendars",
                self.default_calendar
            )));
        }

        Ok(())
    }

    /// Parsed reference timezone
    pub fn reference_timezone(&self) -> BotResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| config_error(&format!("Invalid TIMEZONE: {}", self.timezone)))
    }

    /// Match a requested calendar name against the configured set.
    ///
    /// Returns the canonical spelling, the trimmed name itself when
    /// enforcement is off, or `None` when the name is not allowed.
    pub fn allowed_calendar(&self, requested: &str) -> Option<String> {
        let requested = requested.trim();
        if requested.is_empty() {
            return None;
        }

        if let Some(name) = self
            .calendar_names
            .iter()
            .find(|n| n.eq_ignore_ascii_case(requested))
        {
            return Some(name.clone());
        }

        if self.enforce_calendar_names {
            None
        } else {
            Some(requested.to_string())
        }
    }

    /// Calendar for a new event, falling back to the default
    pub fn calendar_for_new_event(&self, requested: Option<&str>) -> String {
        requested
            .and_then(|name| self.allowed_calendar(name))
            .unwrap_or_else(|| self.default_calendar.clone())
    }
}

fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
