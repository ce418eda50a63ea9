use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};

/// Host key-value persistence primitive.
///
/// Entries are small named strings (serialized JSON documents and
/// auxiliary settings). Backends must satisfy:
/// - `set` is an upsert; `get` of an absent entry returns `Ok(None)`.
/// - `remove` of an absent entry is a no-op.
/// - Exceeding a configured quota fails with [`StoreError::StorageFull`],
///   never with a generic I/O error, and leaves the previous value intact.
pub trait KvBackend: Send + Sync {
    /// Read an entry. Returns `Ok(None)` if absent.
    fn get(&self, entry: &str) -> StoreResult<Option<String>>;

    /// Write an entry, replacing any previous value.
    fn set(&self, entry: &str, value: &str) -> StoreResult<()>;

    /// Remove an entry. No-op if absent.
    fn remove(&self, entry: &str) -> StoreResult<()>;
}

/// In-memory, HashMap-based backend.
///
/// Intended for tests and embedding. An optional byte quota makes
/// [`StoreError::StorageFull`] reachable without a real disk.
pub struct MemoryKv {
    entries: RwLock<HashMap<String, String>>,
    quota: Option<u64>,
}

impl MemoryKv {
    /// Create an unbounded in-memory backend.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota: None,
        }
    }

    /// Create a backend that rejects writes once total stored bytes would
    /// exceed `quota`.
    pub fn with_quota(quota: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota: Some(quota),
        }
    }

    /// Total bytes currently stored across all entries.
    pub fn used_bytes(&self) -> u64 {
        self.entries
            .read()
            .expect("kv lock poisoned")
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl KvBackend for MemoryKv {
    fn get(&self, entry: &str) -> StoreResult<Option<String>> {
        let map = self.entries.read().expect("kv lock poisoned");
        Ok(map.get(entry).cloned())
    }

    fn set(&self, entry: &str, value: &str) -> StoreResult<()> {
        let mut map = self.entries.write().expect("kv lock poisoned");
        if let Some(quota) = self.quota {
            let replaced = map.get(entry).map(|v| v.len() as u64).unwrap_or(0);
            let used: u64 = map
                .iter()
                .map(|(k, v)| (k.len() + v.len()) as u64)
                .sum::<u64>()
                - replaced;
            let requested = (entry.len() + value.len()) as u64;
            if used + requested > quota {
                return Err(StoreError::StorageFull {
                    used,
                    quota,
                    requested,
                });
            }
        }
        map.insert(entry.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, entry: &str) -> StoreResult<()> {
        let mut map = self.entries.write().expect("kv lock poisoned");
        map.remove(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_absent_returns_none() {
        let kv = MemoryKv::new();
        assert!(kv.get("missing").unwrap().is_none());
    }

    #[test]
    fn set_then_get_roundtrip() {
        let kv = MemoryKv::new();
        kv.set("productData", "{}").unwrap();
        assert_eq!(kv.get("productData").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn set_is_upsert() {
        let kv = MemoryKv::new();
        kv.set("a", "1").unwrap();
        kv.set("a", "2").unwrap();
        assert_eq!(kv.get("a").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn remove_absent_is_noop() {
        let kv = MemoryKv::new();
        kv.remove("missing").unwrap();
    }

    #[test]
    fn quota_rejects_oversized_write() {
        let kv = MemoryKv::with_quota(10);
        let err = kv.set("key", "a value well past ten bytes").unwrap_err();
        assert!(matches!(err, StoreError::StorageFull { .. }));
        // The failed write must not leave a partial value behind.
        assert!(kv.get("key").unwrap().is_none());
    }

    #[test]
    fn quota_accounts_for_replaced_value() {
        let kv = MemoryKv::with_quota(16);
        kv.set("k", "0123456789").unwrap();
        // Replacing should free the old value's budget first.
        kv.set("k", "abcdefghij").unwrap();
        assert_eq!(kv.get("k").unwrap().as_deref(), Some("abcdefghij"));
        assert_eq!(kv.used_bytes(), 11);
    }
}
