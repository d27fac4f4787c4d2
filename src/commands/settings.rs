use std::io::Write;
use std::path::Path;

use crate::models::Settings;
use crate::utils::config;

/// Prints the effective settings with the API key masked.
pub fn print_settings(settings: &Settings, out: &mut dyn Write) -> anyhow::Result<()> {
    let mut shown = settings.clone();
    shown.ai.api_key = mask_key(&shown.ai.api_key);
    writeln!(out, "{}", serde_json::to_string_pretty(&shown)?)?;
    Ok(())
}

/// Writes a default settings file unless one already exists.
pub fn init_settings(data_dir: &Path, out: &mut dyn Write) -> anyhow::Result<()> {
    let path = config::settings_path(data_dir);
    if path.exists() {
        writeln!(out, "Settings already exist at {}", path.display())?;
        return Ok(());
    }
    config::save_settings(data_dir, &Settings::default())?;
    writeln!(out, "Wrote default settings to {}", path.display())?;
    Ok(())
}

fn mask_key(key: &str) -> String {
    let key = key.trim();
    if key.is_empty() {
        return String::new();
    }
    let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("****{}", tail)
}
