use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::{json, Map, Value};

use crate::database::documents::paths;
use crate::database::{DocumentStore, SetOptions};
use crate::error::{AppError, Result};
use crate::models::{
    subject_id, ActionRequest, ActionResult, ActionType, BatchOutcome, BatchSummary, EventType,
    Priority, ScheduleEvent, StudyTask, Subject, ASSISTANT_AUTHOR,
};
use crate::services::action_protocol::{missing_params, split_list, validate_action};
use crate::services::calendar::Calendar;

pub struct ActionExecutor<'a> {
    store: &'a dyn DocumentStore,
    uid: Option<&'a str>,
    calendar: Option<&'a Calendar<'a>>,
}

impl<'a> ActionExecutor<'a> {
    /// `uid` is the signed-in user; `None` or blank refuses every action.
    pub fn new(store: &'a dyn DocumentStore, uid: Option<&'a str>) -> Self {
        Self {
            store,
            uid: uid.filter(|uid| !uid.trim().is_empty()),
            calendar: None,
        }
    }

    /// Also record scheduled blocks in the local calendar.
    pub fn with_calendar(mut self, calendar: &'a Calendar<'a>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn execute(&self, action: &ActionRequest) -> ActionResult {
        let Some(uid) = self.uid else {
            return ActionResult::failed(AppError::NotAuthenticated.to_string());
        };

        if !validate_action(action) {
            let reason = match &action.action_type {
                ActionType::Unknown(raw) => format!("unsupported action type \"{}\"", raw),
                other => format!("{} is missing {}", other, missing_params(action).join(", ")),
            };
            log::warn!("Skipping invalid action: {}", reason);
            return ActionResult::skipped(format!("Skipped: {}", reason));
        }

        match self.dispatch(uid, action) {
            Ok(result) => {
                log::info!("Executed {}: {}", action.action_type, result.message.as_deref().unwrap_or(""));
                result
            }
            Err(e) => {
                log::warn!("Action {} failed: {}", action.action_type, e);
                ActionResult::failed(e.to_string())
            }
        }
    }

    /// Runs every action in order, one at a time, regardless of earlier failures.
    pub fn execute_batch(&self, actions: &[ActionRequest]) -> BatchOutcome {
        let mut summary = BatchSummary {
            total: actions.len(),
            ..Default::default()
        };
        let mut results = Vec::with_capacity(actions.len());

        for action in actions {
            let result = self.execute(action);
            if result.success {
                summary.success += 1;
            } else if result.skipped {
                summary.skipped += 1;
            } else {
                summary.failed += 1;
            }
            results.push(result);
        }

        BatchOutcome { results, summary }
    }

    fn dispatch(&self, uid: &str, action: &ActionRequest) -> Result<ActionResult> {
        match &action.action_type {
            ActionType::AddSchedule => self.add_schedule(uid, action),
            ActionType::CreateTask => self.create_task(uid, action),
            ActionType::ExtractTopics => self.extract_topics(uid, action),
            ActionType::UpdateSubject => self.update_subject(uid, action),
            ActionType::AdjustSchedule => self.adjust_schedule(uid, action),
            ActionType::Unknown(raw) => Err(AppError::InvalidAction(format!("unsupported action type \"{}\"", raw))),
        }
    }

    fn add_schedule(&self, uid: &str, action: &ActionRequest) -> Result<ActionResult> {
        let subject = required(action, "subject")?;
        let date = parse_date(action, "date")?;
        let start_time = parse_clock(action, "startTime")?;
        let duration = parse_minutes(action, "duration")?;
        let event_type = action
            .param("type")
            .map(EventType::from_label)
            .unwrap_or(EventType::Study);

        let event = ScheduleEvent::new(date, &start_time, subject, duration, event_type, ASSISTANT_AUTHOR);
        let data = serde_json::to_value(&event)?;
        self.store
            .set(&paths::schedule(uid, &event.id), data.clone(), SetOptions::default())?;
        if let Some(calendar) = self.calendar {
            calendar.add_local(event.clone())?;
        }

        Ok(ActionResult::ok(
            format!(
                "Added {} to your schedule on {} at {} for {} min",
                subject, event.date, event.time, duration
            ),
            data,
        ))
    }

    fn create_task(&self, uid: &str, action: &ActionRequest) -> Result<ActionResult> {
        let title = required(action, "title")?;
        let due_date = match action.param("dueDate") {
            Some(_) => Some(parse_date(action, "dueDate")?.format("%Y-%m-%d").to_string()),
            None => None,
        };
        let priority = match action.param("priority") {
            Some(raw) => Priority::parse(raw).ok_or_else(|| AppError::invalid_param("priority", raw))?,
            None => Priority::Medium,
        };

        let task = StudyTask {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            subject: action.param("subject").map(str::to_string),
            due_date,
            priority,
            completed: false,
            created_by: ASSISTANT_AUTHOR.to_string(),
            created_at: Utc::now().timestamp(),
        };
        let data = serde_json::to_value(&task)?;
        self.store
            .set(&paths::task(uid, &task.id), data.clone(), SetOptions::default())?;

        let message = match &task.due_date {
            Some(due) => format!("Created task \"{}\" due {}", task.title, due),
            None => format!("Created task \"{}\"", task.title),
        };
        Ok(ActionResult::ok(message, data))
    }

    /// Creates the subject if needed, otherwise appends. Duplicates are kept.
    fn extract_topics(&self, uid: &str, action: &ActionRequest) -> Result<ActionResult> {
        let name = required(action, "subject")?;
        let raw_topics = required(action, "topics")?;
        let topics = split_list(raw_topics);
        if topics.is_empty() {
            return Err(AppError::invalid_param("topics", raw_topics));
        }

        let id = subject_id(name);
        let path = paths::subject(uid, &id);
        let now = Utc::now().timestamp();

        match self.store.get(&path)? {
            None => {
                let subject = Subject {
                    id,
                    name: name.to_string(),
                    topics: topics.clone(),
                    progress: 0,
                    created_at: now,
                    updated_at: now,
                };
                let data = serde_json::to_value(&subject)?;
                self.store.set(&path, data.clone(), SetOptions::default())?;
                Ok(ActionResult::ok(
                    format!("Created {} with {} topic(s)", name, topics.len()),
                    data,
                ))
            }
            Some(existing) => {
                let mut merged: Vec<Value> = existing
                    .get("topics")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                merged.extend(topics.iter().cloned().map(Value::String));
                let patch = json!({ "topics": merged, "updatedAt": now });
                self.store.update(&path, patch.clone())?;
                Ok(ActionResult::ok(
                    format!("Added {} topic(s) to {}", topics.len(), name),
                    patch,
                ))
            }
        }
    }

    fn update_subject(&self, uid: &str, action: &ActionRequest) -> Result<ActionResult> {
        let name = required(action, "subject")?;

        let mut patch = Map::new();
        for (key, raw) in &action.params {
            let value = match key.as_str() {
                "subject" => continue,
                "progress" => {
                    let progress: u8 = raw
                        .trim_end_matches('%')
                        .trim()
                        .parse()
                        .ok()
                        .filter(|p| *p <= 100)
                        .ok_or_else(|| AppError::invalid_param("progress", raw))?;
                    json!(progress)
                }
                "examDate" => json!(parse_date(action, "examDate")?.format("%Y-%m-%d").to_string()),
                _ => json!(raw),
            };
            patch.insert(key.clone(), value);
        }
        if patch.is_empty() {
            return Err(AppError::InvalidAction(format!("nothing to update on {}", name)));
        }
        patch.insert("updatedAt".to_string(), json!(Utc::now().timestamp()));

        let path = paths::subject(uid, &subject_id(name));
        let patch = Value::Object(patch);
        match self.store.update(&path, patch.clone()) {
            Err(AppError::DocumentNotFound(_)) => {
                return Err(AppError::InvalidAction(format!("subject \"{}\" does not exist", name)))
            }
            other => other?,
        }

        Ok(ActionResult::ok(format!("Updated {}", name), patch))
    }

    fn adjust_schedule(&self, uid: &str, action: &ActionRequest) -> Result<ActionResult> {
        let date = parse_date(action, "date")?.format("%Y-%m-%d").to_string();
        let change = required(action, "change")?;

        let mut adjustment = json!({
            "change": change,
            "requestedAt": Utc::now().timestamp(),
        });
        if let Some(reason) = action.param("reason") {
            adjustment["reason"] = json!(reason);
        }
        let data = json!({ "scheduleAdjustments": { date.clone(): adjustment } });
        self.store.set(&paths::user(uid), data.clone(), SetOptions::merge())?;

        Ok(ActionResult::ok(format!("Noted schedule change for {}: {}", date, change), data))
    }
}

fn required<'r>(action: &'r ActionRequest, key: &str) -> Result<&'r str> {
    action
        .param(key)
        .ok_or_else(|| AppError::InvalidAction(format!("missing {}", key)))
}

fn parse_date(action: &ActionRequest, key: &str) -> Result<NaiveDate> {
    let raw = required(action, key)?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| AppError::invalid_param(key, raw))
}

/// `HH:MM`, normalised to two-digit hours.
fn parse_clock(action: &ActionRequest, key: &str) -> Result<String> {
    let raw = required(action, key)?;
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map(|t| t.format("%H:%M").to_string())
        .map_err(|_| AppError::invalid_param(key, raw))
}

fn parse_minutes(action: &ActionRequest, key: &str) -> Result<u32> {
    let raw = required(action, key)?;
    raw.parse::<u32>()
        .ok()
        .filter(|minutes| *minutes > 0)
        .ok_or_else(|| AppError::invalid_param(key, raw))
}
