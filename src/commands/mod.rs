use kalenteribotti::components::{Dispatcher, EventStoreHandle};
use kalenteribotti::config::Config;
use kalenteribotti::error::BotResult;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use poise::serenity_prelude::{Colour, CreateEmbed, Timestamp};
use std::sync::Arc;

// Export submodules
pub mod calendar;
pub mod util;

/// Shared context for all commands
pub struct CommandContext {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
    pub store: EventStoreHandle,
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext").finish_non_exhaustive()
    }
}

impl CommandContext {
    /// Create a new command context
    pub fn new(config: Arc<Config>, dispatcher: Arc<Dispatcher>, store: EventStoreHandle) -> Self {
        Self {
            config,
            dispatcher,
            store,
        }
    }
}

/// Type alias for command result
pub type CommandResult = BotResult<()>;

/// Type alias for poise context
pub type Context<'a> = poise::Context<'a, CommandContext, kalenteribotti::error::Error>;

/// All application commands
pub fn get_all_application_commands(
) -> Vec<poise::Command<CommandContext, kalenteribotti::error::Error>> {
    vec![
        // Utility commands
        util::ping(),
        util::start(),
        // Calendar commands
        calendar::schedule(),
        calendar::agenda(),
    ]
}

/// Red embed for failures
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title(title)
        .description(description)
        .colour(Colour::RED)
}

/// Green embed for confirmations
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title(title)
        .description(description)
        .colour(Colour::DARK_GREEN)
}

/// Local time a Discord message was sent, read in `tz`
pub fn received_at(timestamp: Timestamp, tz: Tz) -> DateTime<Tz> {
    DateTime::from_timestamp(timestamp.unix_timestamp(), 0)
        .unwrap_or_else(Utc::now)
        .with_timezone(&tz)
}
