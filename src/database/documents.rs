use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use rusqlite::OptionalExtension;
use serde_json::{Map, Value};

use super::{lock, SharedConnection};
use crate::error::{AppError, Result};

/// Called with the document path and its new value after every write, `Null` after a delete.
pub type Listener = Box<dyn Fn(&str, &Value) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub merge: bool,
}

impl SetOptions {
    pub fn merge() -> Self {
        Self { merge: true }
    }
}

pub trait DocumentStore: Send + Sync {
    fn get(&self, path: &str) -> Result<Option<Value>>;

    fn set(&self, path: &str, data: Value, options: SetOptions) -> Result<()>;

    /// Patch top-level fields of an existing document.
    fn update(&self, path: &str, patch: Value) -> Result<()>;

    /// Documents directly under `collection`, ordered by path.
    fn list(&self, collection: &str) -> Result<Vec<Value>>;

    /// Returns false when nothing was stored at `path`.
    fn delete(&self, path: &str) -> Result<bool>;

    fn listen(&self, path: &str, listener: Listener) -> Result<Subscription>;
}

pub mod paths {
    pub fn user(uid: &str) -> String {
        format!("users/{}", uid)
    }

    pub fn schedule_collection(uid: &str) -> String {
        format!("users/{}/schedule", uid)
    }

    pub fn schedule(uid: &str, id: &str) -> String {
        format!("users/{}/schedule/{}", uid, id)
    }

    pub fn tasks_collection(uid: &str) -> String {
        format!("users/{}/tasks", uid)
    }

    pub fn task(uid: &str, id: &str) -> String {
        format!("users/{}/tasks/{}", uid, id)
    }

    pub fn subject(uid: &str, id: &str) -> String {
        format!("users/{}/subjects/{}", uid, id)
    }

    pub fn collection_of(path: &str) -> &str {
        path.rsplit_once('/').map(|(collection, _)| collection).unwrap_or("")
    }
}

#[derive(Default)]
struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, (String, Arc<Listener>)>>,
}

impl ListenerRegistry {
    fn add(&self, path: &str, listener: Listener) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.insert(id, (path.to_string(), Arc::new(listener)));
        }
        id
    }

    fn remove(&self, id: u64) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.remove(&id);
        }
    }

    fn notify(&self, path: &str, value: &Value) {
        // Callbacks run outside the lock so they may subscribe or unsubscribe.
        let matching: Vec<Arc<Listener>> = match self.listeners.lock() {
            Ok(listeners) => listeners
                .values()
                .filter(|(p, _)| p == path)
                .map(|(_, l)| Arc::clone(l))
                .collect(),
            Err(_) => return,
        };
        for listener in matching {
            listener(path, value);
        }
    }
}

/// Handle returned by [`DocumentStore::listen`].
pub struct Subscription {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    /// A subscription that is not attached to any store.
    pub fn detached() -> Self {
        Self {
            id: 0,
            registry: Weak::new(),
        }
    }

    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

pub struct SqliteDocumentStore {
    conn: SharedConnection,
    listeners: Arc<ListenerRegistry>,
}

impl SqliteDocumentStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self {
            conn,
            listeners: Arc::new(ListenerRegistry::default()),
        }
    }

    fn write(&self, path: &str, value: &Value) -> Result<()> {
        let data = serde_json::to_string(value)?;
        let now = chrono::Utc::now().timestamp();
        {
            let conn = lock(&self.conn)?;
            conn.execute(
                "INSERT INTO documents (path, collection, data, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(path) DO UPDATE SET
                    data = excluded.data,
                    updated_at = excluded.updated_at",
                rusqlite::params![path, paths::collection_of(path), data, now],
            )?;
        }
        self.listeners.notify(path, value);
        Ok(())
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn get(&self, path: &str) -> Result<Option<Value>> {
        let conn = lock(&self.conn)?;
        let data: Option<String> = conn
            .query_row("SELECT data FROM documents WHERE path = ?1", [path], |row| row.get(0))
            .optional()?;
        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    fn set(&self, path: &str, data: Value, options: SetOptions) -> Result<()> {
        if !data.is_object() {
            return Err(AppError::InvalidDocument(path.to_string()));
        }
        let value = if options.merge {
            match self.get(path)? {
                Some(mut existing) => {
                    merge_values(&mut existing, data);
                    existing
                }
                None => data,
            }
        } else {
            data
        };
        self.write(path, &value)
    }

    fn update(&self, path: &str, patch: Value) -> Result<()> {
        let Value::Object(fields) = patch else {
            return Err(AppError::InvalidDocument(path.to_string()));
        };
        let mut existing = self
            .get(path)?
            .ok_or_else(|| AppError::DocumentNotFound(path.to_string()))?;
        let Some(object) = existing.as_object_mut() else {
            return Err(AppError::InvalidDocument(path.to_string()));
        };
        for (key, value) in fields {
            object.insert(key, value);
        }
        self.write(path, &existing)
    }

    fn list(&self, collection: &str) -> Result<Vec<Value>> {
        let conn = lock(&self.conn)?;
        let mut stmt =
            conn.prepare("SELECT data FROM documents WHERE collection = ?1 ORDER BY path ASC")?;
        let rows = stmt.query_map([collection], |row| row.get::<_, String>(0))?;

        let mut documents = Vec::new();
        for row in rows {
            documents.push(serde_json::from_str(&row?)?);
        }
        Ok(documents)
    }

    fn delete(&self, path: &str) -> Result<bool> {
        let deleted = {
            let conn = lock(&self.conn)?;
            conn.execute("DELETE FROM documents WHERE path = ?1", [path])?
        };
        if deleted > 0 {
            self.listeners.notify(path, &Value::Null);
        }
        Ok(deleted > 0)
    }

    fn listen(&self, path: &str, listener: Listener) -> Result<Subscription> {
        let id = self.listeners.add(path, listener);
        Ok(Subscription {
            id,
            registry: Arc::downgrade(&self.listeners),
        })
    }
}

/// Recursive object merge: nested objects are merged key by key, anything
/// else in `incoming` replaces what was there.
fn merge_values(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => merge_maps(existing, incoming),
        (slot, incoming) => *slot = incoming,
    }
}

fn merge_maps(existing: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        let nested = value.is_object() && existing.get(&key).is_some_and(Value::is_object);
        match existing.get_mut(&key) {
            Some(slot) if nested => merge_values(slot, value),
            _ => {
                existing.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::open_in_memory;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store() -> SqliteDocumentStore {
        SqliteDocumentStore::new(open_in_memory().unwrap())
    }

    #[test]
    fn get_missing_document_is_none() {
        assert_eq!(store().get("users/u1").unwrap(), None);
    }

    #[test]
    fn set_replaces_without_merge() {
        let store = store();
        store.set("users/u1", json!({"a": 1, "b": 2}), SetOptions::default()).unwrap();
        store.set("users/u1", json!({"c": 3}), SetOptions::default()).unwrap();
        assert_eq!(store.get("users/u1").unwrap(), Some(json!({"c": 3})));
    }

    #[test]
    fn set_with_merge_keeps_nested_fields() {
        let store = store();
        store
            .set("users/u1", json!({"name": "Ada", "prefs": {"theme": "dark"}}), SetOptions::default())
            .unwrap();
        store
            .set("users/u1", json!({"prefs": {"lang": "en"}}), SetOptions::merge())
            .unwrap();
        assert_eq!(
            store.get("users/u1").unwrap(),
            Some(json!({"name": "Ada", "prefs": {"theme": "dark", "lang": "en"}}))
        );
    }

    #[test]
    fn set_rejects_non_objects() {
        let err = store().set("users/u1", json!([1, 2]), SetOptions::default()).unwrap_err();
        assert!(matches!(err, AppError::InvalidDocument(_)));
    }

    #[test]
    fn update_requires_existing_document() {
        let err = store().update("users/u1/subjects/math", json!({"progress": 10})).unwrap_err();
        assert!(matches!(err, AppError::DocumentNotFound(p) if p == "users/u1/subjects/math"));
    }

    #[test]
    fn update_patches_top_level_fields() {
        let store = store();
        store
            .set("users/u1/subjects/math", json!({"name": "Math", "progress": 0}), SetOptions::default())
            .unwrap();
        store.update("users/u1/subjects/math", json!({"progress": 40})).unwrap();
        assert_eq!(
            store.get("users/u1/subjects/math").unwrap(),
            Some(json!({"name": "Math", "progress": 40}))
        );
    }

    #[test]
    fn list_only_returns_direct_children() {
        let store = store();
        store.set("users/u1/tasks/b", json!({"id": "b"}), SetOptions::default()).unwrap();
        store.set("users/u1/tasks/a", json!({"id": "a"}), SetOptions::default()).unwrap();
        store.set("users/u2/tasks/c", json!({"id": "c"}), SetOptions::default()).unwrap();
        store.set("users/u1", json!({"id": "u1"}), SetOptions::default()).unwrap();

        let tasks = store.list("users/u1/tasks").unwrap();
        assert_eq!(tasks, vec![json!({"id": "a"}), json!({"id": "b"})]);
    }

    #[test]
    fn listeners_fire_until_unsubscribed() {
        let store = store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = store
            .listen(
                "users/u1",
                Box::new(move |_: &str, value: &Value| sink.lock().unwrap().push(value.clone())),
            )
            .unwrap();

        store.set("users/u1", json!({"n": 1}), SetOptions::default()).unwrap();
        store.set("users/u2", json!({"n": 99}), SetOptions::default()).unwrap();
        store.update("users/u1", json!({"n": 2})).unwrap();
        assert!(store.delete("users/u1").unwrap());
        assert!(!store.delete("users/u1").unwrap());
        subscription.unsubscribe();
        store.set("users/u1", json!({"n": 3}), SetOptions::default()).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![json!({"n": 1}), json!({"n": 2}), Value::Null]
        );
        assert_eq!(store.get("users/u1").unwrap(), Some(json!({"n": 3})));
    }

    #[test]
    fn collection_of_strips_last_segment() {
        assert_eq!(paths::collection_of("users/u1/tasks/t1"), "users/u1/tasks");
        assert_eq!(paths::collection_of("users"), "");
    }
}
