use serde::{Deserialize, Serialize};

use super::ActionRequest;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// What the chat layer hands back for one user turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    /// Response text with every action tag removed.
    pub display_text: String,
    pub actions: Vec<ActionRequest>,
    pub cached: bool,
}
