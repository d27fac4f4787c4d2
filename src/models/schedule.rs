use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Author tag for events the assistant creates on the user's behalf.
pub const ASSISTANT_AUTHOR: &str = "luna";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Study,
    Break,
    Personal,
    Other,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Study => "study",
            EventType::Break => "break",
            EventType::Personal => "personal",
            EventType::Other => "other",
        }
    }

    /// Lenient parse for values coming from action tags.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "study" => EventType::Study,
            "break" => EventType::Break,
            "personal" => EventType::Personal,
            _ => EventType::Other,
        }
    }
}

/// Date slot of a scheduling request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DateSpec {
    Single { date: NaiveDate },
    /// Monday to Friday of the reference week.
    Week { dates: [NaiveDate; 5] },
}

impl DateSpec {
    pub fn dates(&self) -> Vec<NaiveDate> {
        match self {
            DateSpec::Single { date } => vec![*date],
            DateSpec::Week { dates } => dates.to_vec(),
        }
    }
}

/// Structured result of parsing a free-form scheduling message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub activity: String,
    pub date: Option<DateSpec>,
    /// 24-hour `HH:MM`.
    pub start_time: String,
    /// Minutes.
    pub duration: u32,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub success: bool,
    /// False when `start_time` is the fallback value.
    pub time_specified: bool,
    /// False when `duration` is the fallback value.
    pub duration_specified: bool,
}

/// A calendar block, keyed by its `YYYY-MM-DD` date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEvent {
    pub id: String,
    pub date: String,
    pub time: String,
    pub activity: String,
    pub duration: u32,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub created_by: String,
    #[serde(default)]
    pub completed: bool,
}

impl ScheduleEvent {
    pub fn new(date: NaiveDate, time: &str, activity: &str, duration: u32, event_type: EventType, created_by: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            date: date.format("%Y-%m-%d").to_string(),
            time: time.to_string(),
            activity: activity.to_string(),
            duration,
            event_type,
            created_by: created_by.to_string(),
            completed: false,
        }
    }
}
