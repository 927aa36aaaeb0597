//! Key-value store contract used for rate limiting and route persistence.

use serde_json::Value;

/// A shared key-value store.
///
/// Stores are used from many requests at once and must synchronise
/// internally.
pub trait CacheStore: Send + Sync + 'static {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Value);

    /// Removes `key`.
    fn clear(&self, key: &str);

    /// Returns true if `key` is present.
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}
