use serde::{Deserialize, Serialize};

/// Stored at `users/{uid}/subjects/{id}` where `id` is [`subject_id`] of the name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub progress: u8,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Stable document id for a subject name: "Signals & Systems" -> "signals-systems".
pub fn subject_id(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            id.extend(ch.to_lowercase());
        } else if !id.ends_with('-') && !id.is_empty() {
            id.push('-');
        }
    }
    id.trim_end_matches('-').to_string()
}
