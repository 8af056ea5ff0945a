//! View counts behind the static counter image.

use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Per-key hit counter.
pub trait CounterStore: Send + Sync + 'static {
    /// Adds one to `key`, creating it at zero first, and returns the new
    /// count.
    fn increment(&self, key: &str) -> Result<u64>;

    /// Current count of `key`; unknown keys read as zero.
    fn get(&self, key: &str) -> Result<u64>;
}

/// Process-lifetime counter store.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counts: Mutex<BTreeMap<String, u64>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for MemoryCounterStore {
    fn increment(&self, key: &str) -> Result<u64> {
        let mut counts = self.counts.lock();
        let count = counts.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        Ok(*count)
    }

    fn get(&self, key: &str) -> Result<u64> {
        Ok(self.counts.lock().get(key).copied().unwrap_or(0))
    }
}

/// Counter store persisted as a JSON object `{"key": count, ...}`.
///
/// Every increment rewrites the file through a temporary sibling and a
/// rename, so a crash leaves either the old or the new counts on disk.
#[derive(Debug)]
pub struct JsonCounterStore {
    path: PathBuf,
    counts: Mutex<BTreeMap<String, u64>>,
}

impl JsonCounterStore {
    /// Opens `path`, starting empty if it does not exist.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file exists but cannot be read.
    /// - [`Error::InvalidConfig`] if it is not a JSON map of counts.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let counts = match std::fs::read(&path) {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                Error::invalid_config(format!(
                    "counter store '{}' is not valid JSON: {e}",
                    path.display()
                ))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(Error::io(&path, e)),
        };
        Ok(Self {
            path,
            counts: Mutex::new(counts),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, counts: &BTreeMap<String, u64>) -> Result<()> {
        let raw = serde_json::to_vec_pretty(counts)
            .map_err(|e| Error::invalid_config(format!("cannot serialize counts: {e}")))?;
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);
        std::fs::write(&temp, raw).map_err(|e| Error::io(&temp, e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| Error::io(&self.path, e))
    }
}

impl CounterStore for JsonCounterStore {
    fn increment(&self, key: &str) -> Result<u64> {
        let mut counts = self.counts.lock();
        let previous = counts.get(key).copied();
        let count = previous.unwrap_or(0).saturating_add(1);
        counts.insert(key.to_string(), count);

        if let Err(e) = self.persist(&counts) {
            match previous {
                Some(p) => counts.insert(key.to_string(), p),
                None => counts.remove(key),
            };
            return Err(e);
        }
        Ok(count)
    }

    fn get(&self, key: &str) -> Result<u64> {
        Ok(self.counts.lock().get(key).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_hit_counts_one() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.get("readme").unwrap(), 0);
        assert_eq!(store.increment("readme").unwrap(), 1);
        assert_eq!(store.increment("readme").unwrap(), 2);
        assert_eq!(store.increment("other").unwrap(), 1);
        assert_eq!(store.get("readme").unwrap(), 2);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let store = std::sync::Arc::new(MemoryCounterStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.increment("key").unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get("key").unwrap(), 800);
    }

    #[test]
    fn json_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("counts.json");

        let store = JsonCounterStore::open(&path).unwrap();
        store.increment("a").unwrap();
        store.increment("a").unwrap();
        store.increment("b").unwrap();
        drop(store);

        let reopened = JsonCounterStore::open(&path).unwrap();
        assert_eq!(reopened.get("a").unwrap(), 2);
        assert_eq!(reopened.increment("b").unwrap(), 2);
    }

    #[test]
    fn corrupt_json_store_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("counts.json");
        std::fs::write(&path, b"not json").unwrap();

        let err = JsonCounterStore::open(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn failed_persist_rolls_back() {
        let dir = TempDir::new().unwrap();
        let store = JsonCounterStore::open(dir.path().join("nested").join("counts.json")).unwrap();
        assert!(store.increment("a").is_err());
        assert_eq!(store.get("a").unwrap(), 0);
    }
}
