use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use crate::database::documents::paths;
use crate::database::{DocumentStore, LocalStorage, SetOptions};
use crate::error::{AppError, Result};
use crate::models::{ScheduleEvent, ScheduleRequest, ASSISTANT_AUTHOR};

pub const SCHEDULE_KEY: &str = "schedule";

pub type ScheduleBlob = BTreeMap<String, Vec<ScheduleEvent>>;

struct SyncTarget<'a> {
    store: &'a dyn DocumentStore,
    uid: &'a str,
}

pub struct Calendar<'a> {
    storage: LocalStorage,
    sync: Option<SyncTarget<'a>>,
}

impl<'a> Calendar<'a> {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage, sync: None }
    }

    /// Mirror writes into `store` under `uid`.
    pub fn with_sync(mut self, store: &'a dyn DocumentStore, uid: &'a str) -> Self {
        self.sync = Some(SyncTarget { store, uid });
        self
    }

    pub fn load(&self) -> Result<ScheduleBlob> {
        let Some(raw) = self.storage.get(SCHEDULE_KEY)? else {
            return Ok(ScheduleBlob::new());
        };
        match serde_json::from_str(&raw) {
            Ok(blob) => Ok(blob),
            Err(e) => {
                log::warn!("Ignoring unreadable schedule blob: {}", e);
                Ok(ScheduleBlob::new())
            }
        }
    }

    fn save(&self, blob: &ScheduleBlob) -> Result<()> {
        self.storage.set(SCHEDULE_KEY, &serde_json::to_string(blob)?)
    }

    fn mirror(&self, event: &ScheduleEvent) -> Result<()> {
        if let Some(target) = &self.sync {
            target.store.set(
                &paths::schedule(target.uid, &event.id),
                serde_json::to_value(event)?,
                SetOptions::default(),
            )?;
        }
        Ok(())
    }

    /// Local events on `date`, earliest first.
    pub fn events_on(&self, date: NaiveDate) -> Result<Vec<ScheduleEvent>> {
        let mut events = self.load()?.remove(&date_key(date)).unwrap_or_default();
        events.sort_by(|a, b| a.time.cmp(&b.time));
        Ok(events)
    }

    pub fn add_event(&self, event: ScheduleEvent) -> Result<()> {
        self.mirror(&event)?;
        self.add_local(event)
    }

    /// Local write only, for events already stored under `users/{uid}/schedule`.
    pub fn add_local(&self, event: ScheduleEvent) -> Result<()> {
        let mut blob = self.load()?;
        blob.entry(event.date.clone()).or_default().push(event);
        self.save(&blob)
    }

    /// One event per requested date, authored by the assistant.
    pub fn materialize(&self, request: &ScheduleRequest) -> Result<Vec<ScheduleEvent>> {
        let date = match (&request.date, request.success) {
            (Some(date), true) => date,
            _ => {
                return Err(AppError::InvalidState(
                    "cannot schedule a request without a date".to_string(),
                ))
            }
        };

        let events: Vec<ScheduleEvent> = date
            .dates()
            .into_iter()
            .map(|day| {
                ScheduleEvent::new(
                    day,
                    &request.start_time,
                    &request.activity,
                    request.duration,
                    request.event_type,
                    ASSISTANT_AUTHOR,
                )
            })
            .collect();

        let mut blob = self.load()?;
        for event in &events {
            self.mirror(event)?;
            blob.entry(event.date.clone()).or_default().push(event.clone());
        }
        self.save(&blob)?;

        log::info!(
            "Scheduled \"{}\" on {} day(s) at {}",
            request.activity,
            events.len(),
            request.start_time
        );
        Ok(events)
    }

    /// Returns false when no local event has that id.
    pub fn mark_completed(&self, event_id: &str) -> Result<bool> {
        let mut blob = self.load()?;
        let Some(event) = blob
            .values_mut()
            .flat_map(|events| events.iter_mut())
            .find(|event| event.id == event_id)
        else {
            return Ok(false);
        };
        event.completed = true;
        let updated = event.clone();

        self.mirror(&updated)?;
        self.save(&blob)?;
        Ok(true)
    }

    /// Deletes an event locally and from the synced store. Only called on an explicit user request.
    pub fn remove_event(&self, event_id: &str) -> Result<bool> {
        let mut removed = match &self.sync {
            Some(target) => target.store.delete(&paths::schedule(target.uid, event_id))?,
            None => false,
        };

        let mut blob = self.load()?;
        let mut removed_locally = false;
        for events in blob.values_mut() {
            let before = events.len();
            events.retain(|event| event.id != event_id);
            removed_locally |= events.len() != before;
        }
        if removed_locally {
            blob.retain(|_, events| !events.is_empty());
            self.save(&blob)?;
            removed = true;
        }
        Ok(removed)
    }

    /// Local events plus synced schedule documents for `date`, without duplicates.
    pub fn agenda(&self, date: NaiveDate) -> Result<Vec<ScheduleEvent>> {
        let mut events = self.events_on(date)?;
        let Some(target) = &self.sync else {
            return Ok(events);
        };

        let key = date_key(date);
        let mut seen: HashSet<String> = events.iter().map(|e| e.id.clone()).collect();
        for doc in target.store.list(&paths::schedule_collection(target.uid))? {
            let event: ScheduleEvent = match serde_json::from_value(doc) {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("Skipping malformed schedule document: {}", e);
                    continue;
                }
            };
            if event.date == key && seen.insert(event.id.clone()) {
                events.push(event);
            }
        }
        events.sort_by(|a, b| a.time.cmp(&b.time));
        Ok(events)
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{open_in_memory, SqliteDocumentStore};
    use crate::models::{DateSpec, EventType};
    use crate::services::scheduling::parse_schedule_request;
    use pretty_assertions::assert_eq;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn request(date: Option<DateSpec>) -> ScheduleRequest {
        ScheduleRequest {
            activity: "VLSI".to_string(),
            date,
            start_time: "10:00".to_string(),
            duration: 60,
            event_type: EventType::Study,
            success: true,
            time_specified: true,
            duration_specified: true,
        }
    }

    #[test]
    fn materializes_a_single_day() {
        let calendar = Calendar::new(LocalStorage::new(open_in_memory().unwrap()));
        let created = calendar
            .materialize(&request(Some(DateSpec::Single { date: day("2025-11-13") })))
            .unwrap();

        assert_eq!(created.len(), 1);
        assert_eq!(created[0].created_by, "luna");
        assert!(!created[0].completed);
        assert_eq!(calendar.events_on(day("2025-11-13")).unwrap(), created);
    }

    #[test]
    fn this_week_creates_five_events() {
        let calendar = Calendar::new(LocalStorage::new(open_in_memory().unwrap()));
        let parsed = parse_schedule_request("Schedule gym this week", day("2025-11-12"));
        let created = calendar.materialize(&parsed).unwrap();

        let dates: Vec<&str> = created.iter().map(|e| e.date.as_str()).collect();
        assert_eq!(
            dates,
            vec!["2025-11-10", "2025-11-11", "2025-11-12", "2025-11-13", "2025-11-14"]
        );
        assert_eq!(calendar.load().unwrap().len(), 5);
    }

    #[test]
    fn requests_without_a_date_are_refused() {
        let calendar = Calendar::new(LocalStorage::new(open_in_memory().unwrap()));
        assert!(calendar.materialize(&request(None)).is_err());
        assert!(calendar.load().unwrap().is_empty());
    }

    #[test]
    fn events_are_sorted_by_time() {
        let calendar = Calendar::new(LocalStorage::new(open_in_memory().unwrap()));
        let date = day("2025-11-13");
        calendar
            .add_event(ScheduleEvent::new(date, "15:00", "Gym", 60, EventType::Personal, "user"))
            .unwrap();
        calendar
            .add_event(ScheduleEvent::new(date, "08:30", "Math", 45, EventType::Study, "user"))
            .unwrap();

        let times: Vec<String> = calendar.events_on(date).unwrap().into_iter().map(|e| e.time).collect();
        assert_eq!(times, vec!["08:30", "15:00"]);
    }

    #[test]
    fn complete_and_remove() {
        let calendar = Calendar::new(LocalStorage::new(open_in_memory().unwrap()));
        let event = ScheduleEvent::new(day("2025-11-13"), "09:00", "Math", 60, EventType::Study, "user");
        let id = event.id.clone();
        calendar.add_event(event).unwrap();

        assert!(calendar.mark_completed(&id).unwrap());
        assert!(calendar.events_on(day("2025-11-13")).unwrap()[0].completed);
        assert!(!calendar.mark_completed("missing").unwrap());

        assert!(calendar.remove_event(&id).unwrap());
        assert!(calendar.load().unwrap().is_empty());
        assert!(!calendar.remove_event(&id).unwrap());
    }

    #[test]
    fn corrupt_blob_reads_as_empty() {
        let storage = LocalStorage::new(open_in_memory().unwrap());
        storage.set(SCHEDULE_KEY, "not json").unwrap();
        let calendar = Calendar::new(storage);
        assert!(calendar.load().unwrap().is_empty());
    }

    #[test]
    fn sync_mirrors_events_and_agenda_merges() {
        let conn = open_in_memory().unwrap();
        let store = SqliteDocumentStore::new(conn.clone());
        let calendar = Calendar::new(LocalStorage::new(conn)).with_sync(&store, "u1");
        let date = day("2025-11-13");

        let created = calendar
            .materialize(&request(Some(DateSpec::Single { date })))
            .unwrap();
        let remote = ScheduleEvent::new(date, "07:00", "Run", 30, EventType::Personal, "user");
        store
            .set(
                &paths::schedule("u1", &remote.id),
                serde_json::to_value(&remote).unwrap(),
                SetOptions::default(),
            )
            .unwrap();

        assert_eq!(store.list(&paths::schedule_collection("u1")).unwrap().len(), 2);
        let agenda = calendar.agenda(date).unwrap();
        let ids: Vec<&str> = agenda.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![remote.id.as_str(), created[0].id.as_str()]);

        calendar.mark_completed(&created[0].id).unwrap();
        let doc = store.get(&paths::schedule("u1", &created[0].id)).unwrap().unwrap();
        assert_eq!(doc["completed"], serde_json::json!(true));

        assert!(calendar.remove_event(&remote.id).unwrap());
        assert!(calendar.remove_event(&created[0].id).unwrap());
        assert!(calendar.agenda(date).unwrap().is_empty());
        assert!(store.list(&paths::schedule_collection("u1")).unwrap().is_empty());
    }
}
