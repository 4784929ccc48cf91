//! Versioned scene settings channel
//!
//! The controller owns an open key/value map and republishes it wholesale
//! on every change. Snapshots carry the publisher's origin id and a
//! monotonic version: within one origin the version lets a receiver detect
//! and discard out-of-order delivery, while a change of origin (a new
//! controller after a handoff) starts a fresh sequence that is always
//! accepted. Camera and settings events travel as independent named events
//! with no ordering guarantee between them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A wholesale snapshot of the settings map at a given version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    /// Identifies the publishing controller session; version counters are
    /// only comparable within one origin
    pub origin: Uuid,
    pub version: u64,
    pub values: BTreeMap<String, Value>,
}

/// Controller-side settings state
///
/// `set` merges a single key and bumps the version; the caller then
/// republishes `snapshot()` if it holds control.
#[derive(Debug, Clone)]
pub struct SceneSettings {
    origin: Uuid,
    version: u64,
    values: BTreeMap<String, Value>,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            origin: Uuid::new_v4(),
            version: 0,
            values: BTreeMap::new(),
        }
    }
}

impl SceneSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one key into the map. Returns the new version.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> u64 {
        self.values.insert(key.into(), value.into());
        self.version += 1;
        self.version
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// The snapshot to republish wholesale
    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            origin: self.origin,
            version: self.version,
            values: self.values.clone(),
        }
    }
}

/// Viewer-side receiver that replaces its state with incoming snapshots.
/// A snapshot from the current origin must be newer than the last applied
/// one; a snapshot from a different origin always wins and resets the
/// sequence.
#[derive(Debug, Clone, Default)]
pub struct SettingsReceiver {
    last: Option<(Uuid, u64)>,
    values: BTreeMap<String, Value>,
}

impl SettingsReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a snapshot. Returns false if it was stale and discarded.
    pub fn apply(&mut self, snapshot: SettingsSnapshot) -> bool {
        if let Some((origin, version)) = self.last {
            if origin == snapshot.origin && snapshot.version <= version {
                return false;
            }
        }
        self.last = Some((snapshot.origin, snapshot.version));
        self.values = snapshot.values;
        true
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn last_version(&self) -> u64 {
        self.last.map(|(_, version)| version).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_bumps_version() {
        let mut settings = SceneSettings::new();
        assert_eq!(settings.set("lightIntensity", json!(2.0)), 1);
        assert_eq!(settings.set("lightColor", json!("#ffd9a5")), 2);
        assert_eq!(settings.set("lightIntensity", json!(0.5)), 3);
        assert_eq!(settings.get("lightIntensity"), Some(&json!(0.5)));
    }

    #[test]
    fn test_receiver_replaces_wholesale() {
        let mut settings = SceneSettings::new();
        settings.set("autoSwitch", json!(true));
        settings.set("modelIndex", json!(2));

        let mut receiver = SettingsReceiver::new();
        assert!(receiver.apply(settings.snapshot()));
        assert_eq!(receiver.get("autoSwitch"), Some(&json!(true)));
        assert_eq!(receiver.get("modelIndex"), Some(&json!(2)));
    }

    #[test]
    fn test_stale_snapshot_discarded() {
        let mut settings = SceneSettings::new();
        settings.set("autoSwitch", json!(true));
        let old = settings.snapshot();
        settings.set("autoSwitch", json!(false));
        let new = settings.snapshot();

        let mut receiver = SettingsReceiver::new();
        assert!(receiver.apply(new));
        // Delivered out of order
        assert!(!receiver.apply(old));
        assert_eq!(receiver.get("autoSwitch"), Some(&json!(false)));
        assert_eq!(receiver.last_version(), 2);
    }

    #[test]
    fn test_new_controller_restarts_sequence() {
        // Controller A publishes up to version 2, then hands off
        let mut first = SceneSettings::new();
        first.set("lightIntensity", json!(1.0));
        first.set("lightIntensity", json!(2.0));

        let mut receiver = SettingsReceiver::new();
        assert!(receiver.apply(first.snapshot()));

        // Controller B starts its own sequence at version 1; its first
        // snapshot must not be mistaken for a stale one
        let mut second = SceneSettings::new();
        second.set("lightIntensity", json!(5.0));
        assert!(receiver.apply(second.snapshot()));
        assert_eq!(receiver.get("lightIntensity"), Some(&json!(5.0)));
        assert_eq!(receiver.last_version(), 1);

        // Within B's sequence, ordering is still enforced
        let b1 = second.snapshot();
        second.set("lightIntensity", json!(6.0));
        assert!(receiver.apply(second.snapshot()));
        assert!(!receiver.apply(b1));
    }
}
