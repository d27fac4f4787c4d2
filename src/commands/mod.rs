pub mod chat;
pub mod intent;
pub mod schedule;
pub mod sessions;
pub mod settings;

use std::path::Path;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;

use crate::database::{self, DocumentStore, LocalStorage, SharedConnection, SqliteDocumentStore};
use crate::models::Settings;
use crate::services::calendar::Calendar;
use crate::services::llm_client::NvidiaClient;
use crate::utils::config;

/// Everything a command needs: settings and the open database.
pub struct AppContext {
    pub settings: Settings,
    pub conn: SharedConnection,
}

impl AppContext {
    /// Loads settings and opens `dreamos.db` under `data_dir`; `user` overrides the configured identity.
    pub fn open(data_dir: &Path, user: Option<String>) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("creating data directory {}", data_dir.display()))?;

        let mut settings = config::load_settings(data_dir).context("loading settings")?;
        if let Some(user) = user {
            settings.general.user_id = user;
        }

        let conn = database::init_database(&data_dir.join(database::DB_FILE_NAME))?;
        Ok(Self { settings, conn })
    }

    pub fn in_memory(settings: Settings) -> anyhow::Result<Self> {
        Ok(Self {
            settings,
            conn: database::open_in_memory()?,
        })
    }

    /// The signed-in user, if any.
    pub fn uid(&self) -> Option<&str> {
        Some(self.settings.general.user_id.trim()).filter(|uid| !uid.is_empty())
    }

    pub fn tz(&self) -> Tz {
        config::timezone(&self.settings)
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz()).date_naive()
    }

    pub fn store(&self) -> SqliteDocumentStore {
        SqliteDocumentStore::new(self.conn.clone())
    }

    pub fn storage(&self) -> LocalStorage {
        LocalStorage::new(self.conn.clone())
    }

    /// The local calendar, mirrored to `store` when sync is on and someone is signed in.
    pub fn calendar<'a>(&'a self, store: &'a dyn DocumentStore) -> Calendar<'a> {
        let calendar = Calendar::new(self.storage());
        match self.uid() {
            Some(uid) if self.settings.sync.enabled => calendar.with_sync(store, uid),
            _ => calendar,
        }
    }

    /// `None` when AI is disabled or no API key is available.
    pub fn language_model(&self) -> Option<NvidiaClient> {
        if !self.settings.ai.enabled {
            return None;
        }
        let api_key = config::resolve_api_key(&self.settings.ai.api_key);
        if api_key.is_empty() {
            return None;
        }
        Some(NvidiaClient::from_settings(&self.settings.ai, &api_key))
    }
}
