use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Operation requested by an `[ACTION:...]` tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    AddSchedule,
    CreateTask,
    ExtractTopics,
    UpdateSubject,
    AdjustSchedule,
    /// Anything the model emitted that we do not know how to run.
    Unknown(String),
}

impl ActionType {
    pub fn as_str(&self) -> &str {
        match self {
            ActionType::AddSchedule => "add_schedule",
            ActionType::CreateTask => "create_task",
            ActionType::ExtractTopics => "extract_topics",
            ActionType::UpdateSubject => "update_subject",
            ActionType::AdjustSchedule => "adjust_schedule",
            ActionType::Unknown(raw) => raw,
        }
    }
}

impl From<String> for ActionType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "add_schedule" => ActionType::AddSchedule,
            "create_task" => ActionType::CreateTask,
            "extract_topics" => ActionType::ExtractTopics,
            "update_subject" => ActionType::UpdateSubject,
            "adjust_schedule" => ActionType::AdjustSchedule,
            _ => ActionType::Unknown(raw),
        }
    }
}

impl From<ActionType> for String {
    fn from(action_type: ActionType) -> Self {
        action_type.as_str().to_string()
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub params: HashMap<String, String>,
    /// The tag exactly as it appeared in the response.
    pub raw_text: String,
}

impl ActionRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Set when the action never reached the store because it failed validation.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn skipped(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            skipped: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub results: Vec<ActionResult>,
    pub summary: BatchSummary,
}
