use crate::commands::{received_at, CommandResult, Context};
use chrono::{Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use kalenteribotti::components::calendar_store::CalendarEvent;
use kalenteribotti::error::config_error;
use kalenteribotti::utils::time::format_local_time;
use rust_i18n::t;
use tracing::{error, info};

/// Create, move or cancel an event by describing it
#[poise::command(slash_command, prefix_command)]
pub async fn schedule(
    ctx: Context<'_>,
    #[description = "What to do, e.g. 'Lunch with Alice tomorrow at 1pm'"]
    #[rest]
    text: String,
) -> CommandResult {
    let response = ctx.say(t!("thinking")).await?;

    let tz = ctx.data().config.reference_timezone()?;
    let received_at = received_at(ctx.created_at(), tz);
    info!("Schedule request from {}", ctx.author().name);

    let reply = ctx.data().dispatcher.reply(&text, received_at).await;
    response
        .edit(ctx, poise::CreateReply::default().content(reply))
        .await?;

    Ok(())
}

/// Show events for the next seven days
#[poise::command(slash_command, prefix_command)]
pub async fn agenda(
    ctx: Context<'_>,
    #[description = "Optional timezone (e.g. 'Europe/Helsinki')"] timezone: Option<String>,
) -> CommandResult {
    let response = ctx.say(t!("agenda_processing")).await?;

    let timezone_str = timezone.unwrap_or_else(|| ctx.data().config.timezone.clone());
    let tz: Tz = match timezone_str.parse() {
        Ok(tz) => tz,
        Err(_) => {
            response
                .edit(
                    ctx,
                    poise::CreateReply::default()
                        .content(t!("calendar_invalid_timezone", timezone = &timezone_str)),
                )
                .await?;
            return Err(config_error(&format!("Invalid timezone: {}", timezone_str)));
        }
    };

    let events = match ctx.data().store.list_events().await {
        Ok(events) => events,
        Err(e) => {
            error!("Failed to fetch events for agenda: {}", e);
            response
                .edit(
                    ctx,
                    poise::CreateReply::default()
                        .content(t!("calendar_error_fetching", error = e.to_string())),
                )
                .await?;
            return Err(e);
        }
    };

    let today = Utc::now().with_timezone(&tz).date_naive();
    let message = format_agenda(&events, tz, today, &timezone_str);
    response
        .edit(ctx, poise::CreateReply::default().content(message))
        .await?;

    Ok(())
}

/// Seven days starting at `today`, grouped by local date
fn format_agenda(events: &[CalendarEvent], tz: Tz, today: NaiveDate, timezone_str: &str) -> String {
    let week_end = today + Duration::days(7);

    let mut upcoming: Vec<&CalendarEvent> = events
        .iter()
        .filter(|e| {
            let date = e.start.with_timezone(&tz).date_naive();
            date >= today && date < week_end
        })
        .collect();
    upcoming.sort_by_key(|e| e.start);

    let mut message = t!("calendar_agenda_title", timezone = timezone_str).to_string();
    message.push_str("\n\n");

    if upcoming.is_empty() {
        message.push_str(&t!("calendar_no_events"));
        return message;
    }

    let mut current_date = None;
    for event in upcoming {
        let event_date = event.start.with_timezone(&tz).date_naive();
        if current_date != Some(event_date) {
            current_date = Some(event_date);
            message.push_str(&format!("\n**{}**\n", event_date.format("%A %d-%m-%Y")));
        }

        message.push_str(&format!(
            "• **{}–{}** {} _({})_\n",
            format_local_time(&event.start, tz),
            format_local_time(&event.end, tz),
            event.summary,
            event.calendar_name
        ));
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(summary: &str, day: u32, hour: u32) -> CalendarEvent {
        CalendarEvent {
            uid: summary.to_lowercase(),
            summary: summary.to_string(),
            start: Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 3, day, hour + 1, 0, 0).unwrap(),
            calendar_name: "Personal".to_string(),
        }
    }

    #[test]
    fn test_agenda_groups_by_day() {
        let events = vec![
            event("Gym", 3, 15),
            event("Dentist", 2, 8),
            event("Standup", 2, 7),
            event("Old", 1, 9),
            event("Far away", 20, 9),
        ];
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let text = format_agenda(&events, chrono_tz::Europe::Helsinki, today, "Europe/Helsinki");

        assert!(!text.contains("Old"));
        assert!(!text.contains("Far away"));
        assert!(text.contains("Monday 02-03-2026"));
        assert!(text.contains("Tuesday 03-03-2026"));
        let standup = text.find("Standup").unwrap();
        let dentist = text.find("Dentist").unwrap();
        let gym = text.find("Gym").unwrap();
        assert!(standup < dentist && dentist < gym);
        assert!(text.contains("**09:00–10:00**"));
    }

    #[test]
    fn test_agenda_without_events() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let text = format_agenda(&[], chrono_tz::UTC, today, "UTC");
        assert!(text.ends_with(&t!("calendar_no_events").to_string()));
    }
}
