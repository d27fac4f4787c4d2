use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::database::LocalStorage;
use crate::error::Result;
use crate::models::ScheduleEvent;

pub const PENDING_KEY: &str = "pendingNotifications";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub event_id: String,
    pub activity: String,
    pub starts_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

impl Reminder {
    pub fn message(&self, tz: Tz) -> String {
        format!(
            "{} starts at {}",
            self.activity,
            self.starts_at.with_timezone(&tz).format("%H:%M")
        )
    }
}

/// Reminders waiting to fire, keyed by event id.
#[derive(Debug, Default)]
pub struct ReminderRegistry {
    pending: BTreeMap<String, Reminder>,
}

impl ReminderRegistry {
    pub fn load(storage: &LocalStorage) -> Result<Self> {
        let pending = match storage.get(PENDING_KEY)? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("Dropping unreadable pending reminders: {}", e);
                BTreeMap::new()
            }),
            None => BTreeMap::new(),
        };
        Ok(Self { pending })
    }

    pub fn save(&self, storage: &LocalStorage) -> Result<()> {
        storage.set(PENDING_KEY, &serde_json::to_string(&self.pending)?)
    }

    /// Registers a reminder `lead_minutes` before the event starts.
    ///
    /// Returns `None` for events that already started or carry an unreadable
    /// date or time. A lead that reaches into the past makes the reminder due now.
    pub fn schedule(
        &mut self,
        event: &ScheduleEvent,
        lead_minutes: i64,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Option<&Reminder> {
        let starts_at = event_start(event, tz)?;
        if starts_at <= now {
            log::debug!("not reminding for {} which started at {}", event.id, starts_at);
            return None;
        }
        let due_at = Duration::try_minutes(lead_minutes.max(0))
            .and_then(|lead| starts_at.checked_sub_signed(lead))
            .unwrap_or(now)
            .max(now);

        self.pending.insert(
            event.id.clone(),
            Reminder {
                event_id: event.id.clone(),
                activity: event.activity.clone(),
                starts_at,
                due_at,
            },
        );
        self.pending.get(&event.id)
    }

    pub fn cancel(&mut self, event_id: &str) -> bool {
        self.pending.remove(event_id).is_some()
    }

    /// Removes and returns every reminder due at `now`, soonest first.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<Reminder> {
        let due_ids: Vec<String> = self
            .pending
            .values()
            .filter(|reminder| reminder.due_at <= now)
            .map(|reminder| reminder.event_id.clone())
            .collect();

        let mut due: Vec<Reminder> = due_ids
            .iter()
            .filter_map(|id| self.pending.remove(id))
            .collect();
        due.sort_by_key(|reminder| reminder.due_at);
        due
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn event_start(event: &ScheduleEvent, tz: Tz) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(&event.date, "%Y-%m-%d").ok()?;
    let time = NaiveTime::parse_from_str(&event.time, "%H:%M").ok()?;
    let local = tz.from_local_datetime(&date.and_time(time)).earliest()?;
    Some(local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::open_in_memory;
    use crate::models::EventType;
    use pretty_assertions::assert_eq;

    fn event(date: &str, time: &str) -> ScheduleEvent {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        ScheduleEvent::new(date, time, "VLSI", 60, EventType::Study, "luna")
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn due_time_respects_timezone_and_lead() {
        let mut registry = ReminderRegistry::default();
        let ev = event("2025-11-13", "10:00");
        let reminder = registry
            .schedule(&ev, 10, chrono_tz::Asia::Kolkata, at("2025-11-12T00:00:00Z"))
            .unwrap();
        assert_eq!(reminder.starts_at, at("2025-11-13T04:30:00Z"));
        assert_eq!(reminder.due_at, at("2025-11-13T04:20:00Z"));
        assert_eq!(reminder.message(chrono_tz::Asia::Kolkata), "VLSI starts at 10:00");
    }

    #[test]
    fn past_events_are_not_scheduled() {
        let mut registry = ReminderRegistry::default();
        let ev = event("2025-11-13", "10:00");
        assert!(registry.schedule(&ev, 10, Tz::UTC, at("2025-11-13T11:00:00Z")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn short_notice_is_due_immediately() {
        let mut registry = ReminderRegistry::default();
        let ev = event("2025-11-13", "10:00");
        let now = at("2025-11-13T09:55:00Z");
        let reminder = registry.schedule(&ev, 10, Tz::UTC, now).unwrap();
        assert_eq!(reminder.due_at, now);
    }

    #[test]
    fn out_of_range_lead_is_due_immediately() {
        let mut registry = ReminderRegistry::default();
        let ev = event("2025-11-13", "10:00");
        let now = at("2025-11-12T00:00:00Z");
        for lead in [i64::MAX, i64::MAX / 60] {
            let reminder = registry.schedule(&ev, lead, Tz::UTC, now).unwrap();
            assert_eq!(reminder.due_at, now);
        }
    }

    #[test]
    fn take_due_removes_only_due_reminders() {
        let mut registry = ReminderRegistry::default();
        let early = event("2025-11-13", "09:00");
        let late = event("2025-11-13", "18:00");
        let now = at("2025-11-13T00:00:00Z");
        registry.schedule(&late, 10, Tz::UTC, now);
        registry.schedule(&early, 10, Tz::UTC, now);

        let due = registry.take_due(at("2025-11-13T12:00:00Z"));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].event_id, early.id);
        assert_eq!(registry.len(), 1);

        assert!(registry.cancel(&late.id));
        assert!(!registry.cancel(&late.id));
    }

    #[test]
    fn persists_through_local_storage() {
        let storage = LocalStorage::new(open_in_memory().unwrap());
        let mut registry = ReminderRegistry::load(&storage).unwrap();
        let ev = event("2025-11-13", "10:00");
        registry.schedule(&ev, 10, Tz::UTC, at("2025-11-12T00:00:00Z"));
        registry.save(&storage).unwrap();

        let reloaded = ReminderRegistry::load(&storage).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(storage.get(PENDING_KEY).unwrap().unwrap().contains(&ev.id));
    }
}
