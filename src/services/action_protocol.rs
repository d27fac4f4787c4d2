use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::{ActionRequest, ActionType};

// Tags have no escaping, so values cannot contain `|` or `]`.

fn action_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[ACTION:(\w+)\|(.*?)\]").expect("action tag regex must compile"))
}

/// All tags in `response_text`, left to right.
pub fn parse_actions(response_text: &str) -> Vec<ActionRequest> {
    action_tag_re()
        .captures_iter(response_text)
        .map(|caps| ActionRequest {
            action_type: ActionType::from(caps[1].to_string()),
            params: parse_params(&caps[2]),
            raw_text: caps[0].to_string(),
        })
        .collect()
}

fn parse_params(block: &str) -> HashMap<String, String> {
    block
        .split('|')
        .filter_map(|pair| {
            let (key, value) = pair.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// The response with every tag removed, as shown to the user.
pub fn strip_actions(response_text: &str) -> String {
    action_tag_re().replace_all(response_text, "").trim().to_string()
}

const ADD_SCHEDULE_PARAMS: &[&str] = &["subject", "startTime", "duration", "date"];
const CREATE_TASK_PARAMS: &[&str] = &["title"];
const EXTRACT_TOPICS_PARAMS: &[&str] = &["subject", "topics"];
const UPDATE_SUBJECT_PARAMS: &[&str] = &["subject"];
const ADJUST_SCHEDULE_PARAMS: &[&str] = &["date", "change"];

pub fn required_params(action_type: &ActionType) -> Option<&'static [&'static str]> {
    match action_type {
        ActionType::AddSchedule => Some(ADD_SCHEDULE_PARAMS),
        ActionType::CreateTask => Some(CREATE_TASK_PARAMS),
        ActionType::ExtractTopics => Some(EXTRACT_TOPICS_PARAMS),
        ActionType::UpdateSubject => Some(UPDATE_SUBJECT_PARAMS),
        ActionType::AdjustSchedule => Some(ADJUST_SCHEDULE_PARAMS),
        ActionType::Unknown(_) => None,
    }
}

/// Required parameters that are absent or empty.
pub fn missing_params(action: &ActionRequest) -> Vec<&'static str> {
    match required_params(&action.action_type) {
        Some(required) => required
            .iter()
            .copied()
            .filter(|key| action.param(key).is_none())
            .collect(),
        None => Vec::new(),
    }
}

pub fn validate_action(action: &ActionRequest) -> bool {
    required_params(&action.action_type).is_some() && missing_params(action).is_empty()
}

pub fn describe_action(action: &ActionRequest) -> String {
    let p = |key: &str| action.param(key).unwrap_or("?");
    match &action.action_type {
        ActionType::AddSchedule => format!(
            "Add {} to your schedule on {} at {} ({} min)",
            p("subject"),
            p("date"),
            p("startTime"),
            p("duration")
        ),
        ActionType::CreateTask => match action.param("dueDate") {
            Some(due) => format!("Create task \"{}\" due {}", p("title"), due),
            None => format!("Create task \"{}\"", p("title")),
        },
        ActionType::ExtractTopics => {
            let count = action
                .param("topics")
                .map(|topics| split_list(topics).len())
                .unwrap_or(0);
            format!("Add {} topic(s) to {}", count, p("subject"))
        }
        ActionType::UpdateSubject => {
            let mut fields: Vec<&str> = action
                .params
                .keys()
                .map(String::as_str)
                .filter(|key| *key != "subject")
                .collect();
            fields.sort_unstable();
            if fields.is_empty() {
                format!("Update {}", p("subject"))
            } else {
                format!("Update {}: {}", p("subject"), fields.join(", "))
            }
        }
        ActionType::AdjustSchedule => format!("Adjust schedule for {}: {}", p("date"), p("change")),
        ActionType::Unknown(raw) => format!("Unknown action \"{}\"", raw),
    }
}

pub fn action_icon(action_type: &ActionType) -> &'static str {
    match action_type {
        ActionType::AddSchedule => "📅",
        ActionType::CreateTask => "✅",
        ActionType::ExtractTopics => "📚",
        ActionType::UpdateSubject => "✏️",
        ActionType::AdjustSchedule => "🔄",
        ActionType::Unknown(_) => "❓",
    }
}

/// Comma separated list with blanks dropped.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
