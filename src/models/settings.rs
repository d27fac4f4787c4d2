use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub version: String,
    #[serde(default)]
    pub general: GeneralSettings,
    #[serde(default)]
    pub ai: AISettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub confirmation: ConfirmationSettings,
    #[serde(default)]
    pub reminders: ReminderSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            general: GeneralSettings::default(),
            ai: AISettings::default(),
            sync: SyncSettings::default(),
            confirmation: ConfirmationSettings::default(),
            reminders: ReminderSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Identity the executor writes under; empty means signed out.
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            user_id: String::new(),
            display_name: String::new(),
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AISettings {
    pub enabled: bool,
    pub provider: String,
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: i64,
}

impl Default for AISettings {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "nvidia".to_string(),
            api_key: String::new(),
            model: "moonshotai/kimi-k2-instruct-0905".to_string(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            cache_ttl_secs: default_cache_ttl(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_base_url() -> String {
    "https://integrate.api.nvidia.com/v1".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_cache_ttl() -> u64 {
    5 * 60
}

fn default_history_limit() -> i64 {
    12
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Mirror calendar events into the document store.
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationSettings {
    pub dwell_ms: u64,
}

impl Default for ConfirmationSettings {
    fn default() -> Self {
        Self { dwell_ms: 2000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderSettings {
    pub enabled: bool,
    pub lead_minutes: i64,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            lead_minutes: 10,
        }
    }
}
