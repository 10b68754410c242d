//! The in-memory value map.
//!
//! Values are small and short-lived, and every one of them expires within
//! the configured max ttl, so they simply live in a map behind one mutex.
//! Lock hold times are a single hash map operation, except for prune.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct Entry {
    value: bytes::Bytes,
    expires_at: i64,
}

/// A map of keys to ttl-bounded values.
#[derive(Clone, Default)]
pub struct KvMap(Arc<Mutex<HashMap<bytes::Bytes, Entry>>>);

impl KvMap {
    /// Get the live value at a key. An expired value is removed.
    pub fn get(&self, key: &bytes::Bytes, now: i64) -> Option<bytes::Bytes> {
        use std::collections::hash_map::Entry as E;

        let mut map = self.0.lock().unwrap();
        match map.entry(key.clone()) {
            E::Vacant(_) => None,
            E::Occupied(e) => {
                if e.get().expires_at > now {
                    Some(e.get().value.clone())
                } else {
                    e.remove();
                    None
                }
            }
        }
    }

    /// Replace the value at a key.
    pub fn put(&self, key: bytes::Bytes, value: bytes::Bytes, expires_at: i64) {
        self.0
            .lock()
            .unwrap()
            .insert(key, Entry { value, expires_at });
    }

    /// Remove the value at a key, if any.
    pub fn remove(&self, key: &bytes::Bytes) {
        self.0.lock().unwrap().remove(key);
    }

    /// The live keys starting with `prefix`.
    pub fn list(&self, prefix: &[u8], now: i64) -> Vec<bytes::Bytes> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, e)| e.expires_at > now && k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Drop all values expired as of `now`, returning how many.
    pub fn prune(&self, now: i64) -> usize {
        let mut map = self.0.lock().unwrap();
        let before = map.len();
        map.retain(|_, e| e.expires_at > now);
        before - map.len()
    }
}
