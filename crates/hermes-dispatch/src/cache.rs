//! In-process cache store.

use hermes_core::CacheStore;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// A [`CacheStore`] kept in memory for the life of the process.
///
/// ```
/// use hermes_core::CacheStore;
/// use hermes_dispatch::MemoryCache;
///
/// let cache = MemoryCache::new();
/// cache.set("k", serde_json::json!(1));
/// assert!(cache.contains("k"));
/// cache.clear("k");
/// assert_eq!(cache.get("k"), None);
/// ```
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Applies `update` to the value under `key` atomically and returns the
    /// new value.
    pub fn update<F>(&self, key: &str, update: F) -> Value
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let mut entries = self.entries.write();
        let next = update(entries.get(key));
        entries.insert(key.to_string(), next.clone());
        next
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.entries.write().insert(key.to_string(), value);
    }

    fn clear(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_set_get_clear() {
        let cache = MemoryCache::new();
        assert!(cache.is_empty());
        cache.set("a", json!({"n": 1}));
        assert_eq!(cache.get("a"), Some(json!({"n": 1})));
        assert_eq!(cache.len(), 1);
        cache.clear("a");
        assert!(!cache.contains("a"));
    }

    #[test]
    fn test_concurrent_updates_are_atomic() {
        let cache = Arc::new(MemoryCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        cache.update("hits", |v| {
                            json!(v.and_then(Value::as_u64).unwrap_or(0) + 1)
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.get("hits"), Some(json!(800)));
    }
}
