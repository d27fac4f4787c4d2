use std::path::{Path, PathBuf};

use chrono_tz::Tz;

use crate::error::Result;
use crate::models::Settings;

const ENV_API_KEY: &str = "NVIDIA_API_KEY";
const ENV_DATA_DIR: &str = "DREAMOS_DATA_DIR";

pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

pub fn api_key_from_env() -> Option<String> {
    std::env::var(ENV_API_KEY).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn resolve_api_key(explicit_key: &str) -> String {
    let trimmed = explicit_key.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    api_key_from_env().unwrap_or_default()
}

pub fn apply_env_defaults(settings: &mut Settings) {
    if settings.ai.api_key.trim().is_empty() {
        settings.ai.api_key = api_key_from_env().unwrap_or_default();
    }
}

/// `--data-dir` wins, then `DREAMOS_DATA_DIR`, then the platform data dir.
pub fn resolve_data_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    if let Some(dir) = std::env::var_os(ENV_DATA_DIR).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|d| d.join("dreamos"))
        .unwrap_or_else(|| PathBuf::from(".dreamos"))
}

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config").join("settings.json")
}

pub fn load_settings(data_dir: &Path) -> Result<Settings> {
    let path = settings_path(data_dir);
    let mut settings = if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str::<Settings>(&content)?
    } else {
        Settings::default()
    };
    apply_env_defaults(&mut settings);
    Ok(settings)
}

pub fn save_settings(data_dir: &Path, settings: &Settings) -> Result<()> {
    let path = settings_path(data_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn timezone(settings: &Settings) -> Tz {
    settings.general.timezone.parse::<Tz>().unwrap_or_else(|_| {
        log::warn!("Unknown timezone {:?}, using UTC", settings.general.timezone);
        Tz::UTC
    })
}
