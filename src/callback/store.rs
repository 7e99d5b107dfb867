// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Persistent store for beacon hits and injection records

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use parking_lot::Mutex;

use super::hit::{epoch_seconds, CallbackHit, Injection, InjectionCallback};
use crate::error::{Error, Result};

/// Hit log file name inside the log directory
pub const CALLBACKS_FILE: &str = "callbacks.json";
/// Injection index file name inside the log directory
pub const INJECTED_FILE: &str = "injected.json";

/// Store for callback hits and the injection index.
///
/// Hits are kept in arrival order; the injection index is keyed by
/// injection id. Both are mirrored to JSON files after every mutation so
/// external tooling can read them, with writes serialized by a single
/// writer lock and performed atomically (temp file + rename).
pub struct CallbackStore {
    injections: DashMap<String, Injection>,
    hits: Mutex<Vec<CallbackHit>>,
    dir: PathBuf,
    writer: Mutex<()>,
}

impl CallbackStore {
    /// Open a store rooted at `dir`, creating the directory and empty
    /// state files when missing, and reloading any existing state.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let store = Self {
            injections: DashMap::new(),
            hits: Mutex::new(Vec::new()),
            dir,
            writer: Mutex::new(()),
        };

        store.load();
        store.persist_hits();
        store.persist_injections();
        Ok(store)
    }

    /// Insert a fresh injection record. Errors when the id is already
    /// present: ids are supposed to be universally unique.
    pub fn register_injection(&self, id: &str, injection: Injection) -> Result<()> {
        match self.injections.entry(id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::injection(format!(
                "injection {} already registered",
                id
            ))),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(injection);
                self.persist_injections();
                Ok(())
            }
        }
    }

    /// Flip an injection to injected. Unknown ids are a no-op.
    pub fn mark_injected(&self, id: &str, when: f64) {
        let mut changed = false;
        if let Some(mut entry) = self.injections.get_mut(id) {
            entry.injected = true;
            entry.injected_at = Some(when);
            changed = true;
        }
        if changed {
            self.persist_injections();
        }
    }

    /// Append a beacon hit.
    ///
    /// When the hit carries a known injection id, a correlation entry is
    /// also appended to that injection's callback list; hits with unknown
    /// ids are still recorded.
    pub fn record_hit(&self, mut hit: CallbackHit) {
        if let Some(id) = hit.carried_injection_id() {
            hit.injection_id = Some(id.clone());
            // the per-id entry lock serializes callbacks of one injection
            if let Some(mut entry) = self.injections.get_mut(&id) {
                entry.callbacks.push(InjectionCallback {
                    time: epoch_seconds(),
                    remote_addr: hit.remote_addr.clone(),
                    args: hit.args.clone(),
                });
            }
        }

        self.hits.lock().push(hit);
        self.persist_hits();
        self.persist_injections();
    }

    /// Snapshot of all hits, in arrival order
    pub fn list_hits(&self) -> Vec<CallbackHit> {
        self.hits.lock().clone()
    }

    /// Drop all recorded hits
    pub fn clear_hits(&self) {
        self.hits.lock().clear();
        self.persist_hits();
    }

    /// Look up one injection record
    pub fn injection(&self, id: &str) -> Option<Injection> {
        self.injections.get(id).map(|entry| entry.clone())
    }

    /// Snapshot of the injection index
    pub fn list_injections(&self) -> BTreeMap<String, Injection> {
        self.injections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of recorded hits
    pub fn hit_count(&self) -> usize {
        self.hits.lock().len()
    }

    /// Reload persisted state. Unreadable or corrupt files start empty:
    /// losing a log must never keep the proxy from coming up.
    fn load(&self) {
        if let Ok(text) = std::fs::read_to_string(self.dir.join(CALLBACKS_FILE)) {
            match serde_json::from_str::<Vec<CallbackHit>>(&text) {
                Ok(hits) => *self.hits.lock() = hits,
                Err(e) => tracing::warn!("ignoring corrupt {}: {}", CALLBACKS_FILE, e),
            }
        }

        if let Ok(text) = std::fs::read_to_string(self.dir.join(INJECTED_FILE)) {
            match serde_json::from_str::<BTreeMap<String, Injection>>(&text) {
                Ok(injections) => {
                    for (id, injection) in injections {
                        self.injections.insert(id, injection);
                    }
                }
                Err(e) => tracing::warn!("ignoring corrupt {}: {}", INJECTED_FILE, e),
            }
        }
    }

    fn persist_hits(&self) {
        let snapshot = self.hits.lock().clone();
        self.write_json(CALLBACKS_FILE, &snapshot);
    }

    fn persist_injections(&self) {
        let snapshot: BTreeMap<String, Injection> = self.list_injections();
        self.write_json(INJECTED_FILE, &snapshot);
    }

    fn write_json<T: serde::Serialize>(&self, name: &str, value: &T) {
        let _guard = self.writer.lock();
        if let Err(e) = self.try_write_json(name, value) {
            tracing::warn!(file = name, "failed to persist store state: {}", e);
        }
    }

    fn try_write_json<T: serde::Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!(".{}.tmp", name));
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Directory holding the persisted files
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn store() -> (tempfile::TempDir, CallbackStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CallbackStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let (_dir, store) = store();
        store
            .register_injection("a", Injection::new("GET", "http://t/", None, "ua"))
            .unwrap();
        assert!(store
            .register_injection("a", Injection::new("GET", "http://t/", None, "ua"))
            .is_err());
    }

    #[test]
    fn test_mark_injected() {
        let (_dir, store) = store();
        store
            .register_injection("a", Injection::new("GET", "http://t/", None, "ua"))
            .unwrap();

        let when = epoch_seconds();
        store.mark_injected("a", when);
        let injection = store.injection("a").unwrap();
        assert!(injection.injected);
        assert_eq!(injection.injected_at, Some(when));

        // unknown id is a no-op
        store.mark_injected("missing", when);
        assert!(store.injection("missing").is_none());
    }

    #[test]
    fn test_record_hit_correlates_known_injection() {
        let (_dir, store) = store();
        store
            .register_injection("a", Injection::new("GET", "http://t/page", None, "ua"))
            .unwrap();

        let hit = CallbackHit::new("GET", Some("10.0.0.9".to_string())).args(HashMap::from([
            ("id".to_string(), "a".to_string()),
            ("source".to_string(), "proxy-inject".to_string()),
        ]));
        store.record_hit(hit);

        let hits = store.list_hits();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].injection_id.as_deref(), Some("a"));

        let injection = store.injection("a").unwrap();
        assert_eq!(injection.callbacks.len(), 1);
        assert_eq!(
            injection.callbacks[0].args.get("source").map(String::as_str),
            Some("proxy-inject")
        );
    }

    #[test]
    fn test_unknown_injection_id_still_records_hit() {
        let (_dir, store) = store();
        let hit = CallbackHit::new("GET", None)
            .args(HashMap::from([("id".to_string(), "ghost".to_string())]));
        store.record_hit(hit);

        assert_eq!(store.hit_count(), 1);
        assert_eq!(store.list_hits()[0].injection_id.as_deref(), Some("ghost"));
        assert!(store.injection("ghost").is_none());
    }

    #[test]
    fn test_clear_hits_keeps_injections() {
        let (_dir, store) = store();
        store
            .register_injection("a", Injection::new("GET", "http://t/", None, "ua"))
            .unwrap();
        store.record_hit(CallbackHit::new("GET", None));
        assert_eq!(store.hit_count(), 1);

        store.clear_hits();
        assert_eq!(store.hit_count(), 0);
        assert!(store.injection("a").is_some());
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = CallbackStore::open(dir.path()).unwrap();
            store
                .register_injection("a", Injection::new("GET", "http://t/", None, "ua"))
                .unwrap();
            store.mark_injected("a", epoch_seconds());
            store.record_hit(
                CallbackHit::new("GET", None)
                    .args(HashMap::from([("id".to_string(), "a".to_string())])),
            );
        }

        let reopened = CallbackStore::open(dir.path()).unwrap();
        assert_eq!(reopened.hit_count(), 1);
        let injection = reopened.injection("a").unwrap();
        assert!(injection.injected);
        assert_eq!(injection.callbacks.len(), 1);
    }

    #[test]
    fn test_corrupt_state_files_start_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CALLBACKS_FILE), "{not json").unwrap();
        std::fs::write(dir.path().join(INJECTED_FILE), "[]").unwrap();

        let store = CallbackStore::open(dir.path()).unwrap();
        assert_eq!(store.hit_count(), 0);
        assert!(store.list_injections().is_empty());
    }

    #[test]
    fn test_open_creates_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let _store = CallbackStore::open(dir.path()).unwrap();
        assert!(dir.path().join(CALLBACKS_FILE).exists());
        assert!(dir.path().join(INJECTED_FILE).exists());
    }
}
