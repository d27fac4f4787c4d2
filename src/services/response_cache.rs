use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::utils::hash_string;

struct CacheEntry {
    response: String,
    stored_at: Instant,
}

/// Recent model responses keyed by model and prompt.
///
/// One cache lives for one chat session. Entries expire after `ttl`; when
/// `capacity` is reached the oldest entry is evicted.
pub struct ResponseCache {
    entries: HashMap<i64, CacheEntry>,
    ttl: Duration,
    capacity: usize,
}

impl ResponseCache {
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Prompts differing only in case or surrounding whitespace share a key.
    pub fn key(model: &str, prompt: &str) -> i64 {
        hash_string(&format!("{}\u{1f}{}", model, prompt.trim()))
    }

    pub fn get(&mut self, model: &str, prompt: &str) -> Option<String> {
        let key = Self::key(model, prompt);
        let fresh = self
            .entries
            .get(&key)
            .map(|entry| entry.stored_at.elapsed() < self.ttl)?;
        if !fresh {
            self.entries.remove(&key);
            return None;
        }
        self.entries.get(&key).map(|entry| entry.response.clone())
    }

    pub fn insert(&mut self, model: &str, prompt: &str, response: String) {
        let key = Self::key(model, prompt);
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            CacheEntry {
                response,
                stored_at: Instant::now(),
            },
        );
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.stored_at)
            .map(|(key, _)| *key);
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
