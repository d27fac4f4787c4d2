use std::io::Write;

use chrono::NaiveDate;

use super::AppContext;
use crate::services::reminders::ReminderRegistry;

/// Lists the merged agenda for `date`, defaulting to today.
pub fn print_agenda(ctx: &AppContext, date: Option<NaiveDate>, out: &mut dyn Write) -> anyhow::Result<()> {
    let date = date.unwrap_or_else(|| ctx.today());
    let store = ctx.store();
    let events = ctx.calendar(&store).agenda(date)?;

    writeln!(out, "{}", date.format("%A, %B %-d %Y"))?;
    if events.is_empty() {
        writeln!(out, "  Nothing scheduled.")?;
        return Ok(());
    }
    for event in events {
        let mark = if event.completed { "✓" } else { " " };
        writeln!(
            out,
            "  [{}] {}  {} ({} min, {})  {}",
            mark,
            event.time,
            event.activity,
            event.duration,
            event.event_type.as_str(),
            event.id
        )?;
    }
    Ok(())
}

/// Marks an event done and drops its pending reminder.
pub fn complete_event(ctx: &AppContext, event_id: &str, out: &mut dyn Write) -> anyhow::Result<()> {
    let store = ctx.store();
    if !ctx.calendar(&store).mark_completed(event_id)? {
        anyhow::bail!("no event with id {}", event_id);
    }

    let storage = ctx.storage();
    let mut reminders = ReminderRegistry::load(&storage)?;
    if reminders.cancel(event_id) {
        reminders.save(&storage)?;
    }

    log::info!("Marked event {} as completed", event_id);
    writeln!(out, "Nice work! Marked {} as done.", event_id)?;
    Ok(())
}

/// Deletes an event and its pending reminder.
pub fn remove_event(ctx: &AppContext, event_id: &str, out: &mut dyn Write) -> anyhow::Result<()> {
    let store = ctx.store();
    if !ctx.calendar(&store).remove_event(event_id)? {
        anyhow::bail!("no event with id {}", event_id);
    }

    let storage = ctx.storage();
    let mut reminders = ReminderRegistry::load(&storage)?;
    if reminders.cancel(event_id) {
        reminders.save(&storage)?;
    }

    log::info!("Removed event {}", event_id);
    writeln!(out, "Removed {}.", event_id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventType, ScheduleEvent, Settings};
    use crate::database::documents::paths;
    use crate::database::DocumentStore;
    use crate::services::action_executor::ActionExecutor;
    use crate::services::action_protocol::parse_actions;
    use crate::services::reminders::PENDING_KEY;
    use chrono::{TimeZone, Utc};

    fn signed_in(sync: bool) -> AppContext {
        let mut settings = Settings::default();
        settings.general.user_id = "student-1".to_string();
        settings.sync.enabled = sync;
        AppContext::in_memory(settings).unwrap()
    }

    /// Runs a confirmed `add_schedule` the way the chat loop does and returns the new id.
    fn confirm_add_schedule(ctx: &AppContext) -> String {
        let store = ctx.store();
        let calendar = ctx.calendar(&store);
        let executor = ActionExecutor::new(&store, ctx.uid()).with_calendar(&calendar);
        let actions = parse_actions(
            "Sure [ACTION:add_schedule|subject:Math|startTime:14:00|duration:60|date:2025-11-13]",
        );
        let result = executor.execute(&actions[0]);
        assert!(result.success, "{:?}", result.error);
        result.data.unwrap()["id"].as_str().unwrap().to_string()
    }

    #[test]
    fn confirmed_add_schedule_shows_up_and_completes() {
        for sync in [false, true] {
            let ctx = signed_in(sync);
            let id = confirm_add_schedule(&ctx);
            let date = NaiveDate::from_ymd_opt(2025, 11, 13).unwrap();

            let mut out = Vec::new();
            print_agenda(&ctx, Some(date), &mut out).unwrap();
            let text = String::from_utf8(out).unwrap();
            assert!(text.contains("[ ] 14:00  Math (60 min, study)"), "sync={sync}: {text}");
            assert_eq!(text.matches(&id).count(), 1, "sync={sync}: {text}");

            let mut out = Vec::new();
            complete_event(&ctx, &id, &mut out).unwrap();
            let mut out = Vec::new();
            print_agenda(&ctx, Some(date), &mut out).unwrap();
            assert!(String::from_utf8(out).unwrap().contains("[✓] 14:00  Math"));
        }
    }

    #[test]
    fn remove_drops_the_event_everywhere() {
        let ctx = signed_in(true);
        let date = NaiveDate::from_ymd_opt(2025, 11, 13).unwrap();
        let event = ScheduleEvent::new(date, "09:00", "Signals", 60, EventType::Study, "user");
        let id = event.id.clone();
        let store = ctx.store();
        ctx.calendar(&store).add_event(event.clone()).unwrap();

        let storage = ctx.storage();
        let mut reminders = ReminderRegistry::load(&storage).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 11, 12, 6, 0, 0).unwrap();
        reminders.schedule(&event, 10, ctx.tz(), now);
        reminders.save(&storage).unwrap();

        let mut out = Vec::new();
        remove_event(&ctx, &id, &mut out).unwrap();

        assert!(ctx.calendar(&store).agenda(date).unwrap().is_empty());
        assert!(store.get(&paths::schedule("student-1", &id)).unwrap().is_none());
        assert!(!storage.get(PENDING_KEY).unwrap().unwrap_or_default().contains(&id));
        assert!(remove_event(&ctx, &id, &mut out).is_err());
    }

    #[test]
    fn agenda_lists_and_completes_events() {
        let ctx = AppContext::in_memory(Settings::default()).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 11, 13).unwrap();
        let event = ScheduleEvent::new(date, "16:00", "Digital logic", 90, EventType::Study, "user");
        let id = event.id.clone();
        let store = ctx.store();
        ctx.calendar(&store).add_event(event).unwrap();

        let mut out = Vec::new();
        complete_event(&ctx, &id, &mut out).unwrap();
        print_agenda(&ctx, Some(date), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Thursday, November 13 2025"));
        assert!(text.contains("[✓] 16:00  Digital logic (90 min, study)"));
    }

    #[test]
    fn completing_an_unknown_event_fails() {
        let ctx = AppContext::in_memory(Settings::default()).unwrap();
        let mut out = Vec::new();
        assert!(complete_event(&ctx, "nope", &mut out).is_err());
    }

    #[test]
    fn empty_day() {
        let ctx = AppContext::in_memory(Settings::default()).unwrap();
        let mut out = Vec::new();
        print_agenda(&ctx, NaiveDate::from_ymd_opt(2025, 11, 15), &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().ends_with("  Nothing scheduled.\n"));
    }
}
