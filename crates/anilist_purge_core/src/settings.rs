/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::cache::write_atomic;
use crate::kind::ActivityKind;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub current_type: ActivityKind,
    pub current_activity_id: i64,
    pub auto_open_url: bool,
    pub user_name: Option<String>,
    /// 0 until the user name has been resolved.
    pub user_id: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            current_type: ActivityKind::List,
            current_activity_id: 0,
            auto_open_url: true,
            user_name: None,
            user_id: 0,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredSettings<'a> {
    current_type: i64,
    current_activity_id: i64,
    auto_open_url: bool,
    user_name: Option<&'a str>,
    user_id: i64,
}

impl Settings {
    /// Builds settings from loosely typed JSON. Values of the wrong type or
    /// out of range fall back to defaults; the flag reports whether any did.
    pub fn from_json(value: &Value) -> (Self, bool) {
        let mut s = Settings::default();
        let Some(obj) = value.as_object() else {
            return (s, true);
        };
        let mut corrected = false;

        match field(obj, "currentType") {
            None => {}
            Some(v) => match v
                .as_i64()
                .and_then(ActivityKind::from_index)
                .or_else(|| v.as_str().and_then(ActivityKind::from_str))
            {
                Some(kind) => s.current_type = kind,
                None => corrected = true,
            },
        }
        match field(obj, "currentActivityId").map(Value::as_i64) {
            None => {}
            Some(Some(id)) if id >= 0 => s.current_activity_id = id,
            Some(_) => corrected = true,
        }
        match field(obj, "autoOpenUrl").map(Value::as_bool) {
            None => {}
            Some(Some(b)) => s.auto_open_url = b,
            Some(None) => corrected = true,
        }
        match field(obj, "userName").map(Value::as_str) {
            None => {}
            Some(Some(name)) => s.user_name = Some(name.to_string()),
            Some(None) => corrected = true,
        }
        match field(obj, "userId").map(Value::as_i64) {
            None => {}
            Some(Some(id)) if id >= 0 => s.user_id = id,
            Some(_) => corrected = true,
        }
        (s, corrected)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(StoredSettings {
            current_type: self.current_type.index(),
            current_activity_id: self.current_activity_id,
            auto_open_url: self.auto_open_url,
            user_name: self.user_name.as_deref(),
            user_id: self.user_id,
        })
        .unwrap_or(Value::Null)
    }

    /// Changing the user invalidates the resolved id.
    pub fn set_user_name(&mut self, name: Option<String>) {
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if name != self.user_name {
            self.user_name = name;
            self.user_id = 0;
        }
    }
}

/// null counts as absent.
fn field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

/// Settings file, saved after every mutation.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: Settings,
}

impl SettingsStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(SETTINGS_FILE);
        let current = if path.exists() {
            let raw = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            match serde_json::from_slice::<Value>(&raw) {
                Ok(v) => {
                    let (s, corrected) = Settings::from_json(&v);
                    if corrected {
                        warn!("corrected invalid values in {}", path.display());
                    }
                    s
                }
                Err(e) => {
                    warn!("ignoring malformed {}: {e}", path.display());
                    Settings::default()
                }
            }
        } else {
            Settings::default()
        };
        Ok(Self { path, current })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> &Settings {
        &self.current
    }

    pub fn update<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Settings),
    {
        let mut next = self.current.clone();
        f(&mut next);
        if next == self.current && self.path.exists() {
            return Ok(());
        }
        self.current = next;
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.current.to_json())
            .context("encode settings")?;
        write_atomic(&self.path, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn out_of_range_type_is_clamped() {
        let (s, corrected) = Settings::from_json(&json!({
            "currentType": 7,
            "userName": "someone",
            "userId": 42
        }));
        assert!(corrected);
        assert_eq!(s.current_type, ActivityKind::List);
        assert_eq!(s.user_name.as_deref(), Some("someone"));
        assert_eq!(s.user_id, 42);
    }

    #[test]
    fn wrong_types_fall_back_to_defaults() {
        let (s, corrected) = Settings::from_json(&json!({
            "currentType": 3,
            "autoOpenUrl": "yes",
            "currentActivityId": -4
        }));
        assert!(corrected);
        assert_eq!(s.current_type, ActivityKind::SentMessage);
        assert!(s.auto_open_url);
        assert_eq!(s.current_activity_id, 0);

        let (_, corrected) = Settings::from_json(&json!({"userName": null}));
        assert!(!corrected);
    }

    #[test]
    fn changing_user_resets_id() {
        let mut s = Settings {
            user_name: Some("a".into()),
            user_id: 9,
            ..Settings::default()
        };
        s.set_user_name(Some(" a ".into()));
        assert_eq!(s.user_id, 9);
        s.set_user_name(Some("b".into()));
        assert_eq!(s.user_id, 0);
        assert_eq!(s.user_name.as_deref(), Some("b"));
    }

    #[test]
    fn store_persists_updates() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut store = SettingsStore::open(dir.path()).unwrap();
        assert_eq!(store.get(), &Settings::default());
        store
            .update(|s| {
                s.current_type = ActivityKind::Message;
                s.set_user_name(Some("purger".into()));
                s.current_activity_id = 123;
            })
            .unwrap();

        let raw: Value = serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["currentType"], 2);
        assert_eq!(raw["userName"], "purger");

        let reopened = SettingsStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(), store.get());
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), b"{not json").unwrap();
        let store = SettingsStore::open(dir.path()).unwrap();
        assert_eq!(store.get(), &Settings::default());
    }
}
