use std::collections::HashMap;

use hugin_common::Result;
use parking_lot::Mutex;

use super::Cache;

/// Thread-safe in-memory cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bodies.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Cache for MemoryCache {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn write(&self, key: &str, body: &str) {
        self.entries.lock().insert(key.to_string(), body.to_string());
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
