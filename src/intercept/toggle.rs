// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Process-wide intercept toggle

use std::path::PathBuf;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// State file name inside the log directory
pub const STATE_FILE: &str = "intercept_state.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct ToggleState {
    enabled: bool,
}

/// Global intercept switch, mutated only through [`set`](Self::set) and
/// [`flip`](Self::flip).
///
/// The value is persisted best-effort so a restart keeps the operator's
/// last choice; persistence failures are logged and ignored.
pub struct InterceptToggle {
    enabled: RwLock<bool>,
    state_path: Option<PathBuf>,
}

impl InterceptToggle {
    /// Create a toggle without persistence
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: RwLock::new(enabled),
            state_path: None,
        }
    }

    /// Create a toggle backed by a state file, loading the persisted value
    /// when one exists
    pub fn with_state_file(path: PathBuf) -> Self {
        let enabled = std::fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str::<ToggleState>(&text).ok())
            .map(|state| state.enabled)
            .unwrap_or(false);
        Self {
            enabled: RwLock::new(enabled),
            state_path: Some(path),
        }
    }

    /// Current state
    pub fn enabled(&self) -> bool {
        *self.enabled.read()
    }

    /// Set the state explicitly, returning the new value
    pub fn set(&self, enabled: bool) -> bool {
        *self.enabled.write() = enabled;
        self.persist(enabled);
        enabled
    }

    /// Invert the state, returning the new value
    pub fn flip(&self) -> bool {
        let mut guard = self.enabled.write();
        *guard = !*guard;
        let enabled = *guard;
        drop(guard);
        self.persist(enabled);
        enabled
    }

    fn persist(&self, enabled: bool) {
        let Some(path) = &self.state_path else {
            return;
        };
        let state = ToggleState { enabled };
        match serde_json::to_vec_pretty(&state) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(path, bytes) {
                    tracing::warn!("failed to persist intercept state: {}", e);
                }
            }
            Err(e) => tracing::warn!("failed to encode intercept state: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_set_and_flip() {
        let toggle = InterceptToggle::new(false);
        assert!(!toggle.enabled());

        assert!(toggle.set(true));
        assert!(toggle.enabled());

        assert!(!toggle.flip());
        assert!(!toggle.enabled());
    }

    #[test]
    fn test_set_is_idempotent() {
        let toggle = InterceptToggle::new(false);
        assert!(toggle.set(true));
        assert!(toggle.set(true));
        assert!(toggle.enabled());
    }

    #[test]
    fn test_state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATE_FILE);

        let toggle = InterceptToggle::with_state_file(path.clone());
        assert!(!toggle.enabled());
        toggle.set(true);

        let reloaded = InterceptToggle::with_state_file(path);
        assert!(reloaded.enabled());
    }
}
