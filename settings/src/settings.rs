//! Hierarchical name→value settings with change notification.
//!
//! A `Settings` object is a flat map of JSON values with an optional parent
//! consulted on lookup misses. Mutations and wholesale JSON reloads fire
//! registered on-change callbacks; a child forwards its parent's events down
//! the chain.

use crate::error::{JsonSnafu, SettingsError};
use crate::id::{Id, LazyId};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use snafu::ResultExt;
use std::fmt;
use std::sync::{Arc, Weak};

/// Callback invoked with the name of a setting whose value may have changed.
pub type OnChangeCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// A shared handle to one settings object.
#[derive(Clone, Default)]
pub struct Settings {
    inner: Arc<SettingsInner>,
}

#[derive(Default)]
struct SettingsInner {
    id: LazyId,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    data: Map<String, Value>,
    callbacks: IndexMap<String, OnChangeCallback>,
    parent: Option<Settings>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// This object's identity; also keys the parent-forwarding callback.
    pub fn id(&self) -> Id {
        self.inner.id.get()
    }

    pub fn parent(&self) -> Option<Settings> {
        self.inner.state.lock().parent.clone()
    }

    /// Reparent this object, moving the change-forwarding subscription from
    /// the old parent to the new one.
    pub fn set_parent(&self, parent: Option<&Settings>) {
        let key = format!("settings.child.{}", self.id());
        let old = {
            let mut state = self.inner.state.lock();
            std::mem::replace(&mut state.parent, parent.cloned())
        };
        if let Some(old) = old {
            old.clear_on_change(&key);
        }
        if let Some(parent) = parent {
            let weak: Weak<SettingsInner> = Arc::downgrade(&self.inner);
            parent.add_on_change(
                &key,
                Arc::new(move |name| {
                    if let Some(inner) = weak.upgrade() {
                        Settings { inner }.fire_on_change(name);
                    }
                }),
            );
        }
    }

    /// The value of `name`, consulting the parent chain on a miss.
    pub fn get(&self, name: &str) -> Option<Value> {
        let (value, parent) = {
            let state = self.inner.state.lock();
            (state.data.get(name).cloned(), state.parent.clone())
        };
        value.or_else(|| parent.and_then(|parent| parent.get(name)))
    }

    /// String value of `name`, or `default` when unset or of another type.
    pub fn str_or(&self, name: &str, default: &str) -> String {
        match self.get(name) {
            Some(Value::String(value)) => value,
            Some(other) => {
                tracing::warn!(name, value = %other, "setting is not a string");
                default.to_string()
            }
            None => default.to_string(),
        }
    }

    /// Integer value of `name`, or `default` when unset or of another type.
    pub fn int_or(&self, name: &str, default: i64) -> i64 {
        match self.get(name) {
            Some(Value::Number(value)) => value
                .as_i64()
                .or_else(|| value.as_f64().map(|f| f as i64))
                .unwrap_or(default),
            Some(other) => {
                tracing::warn!(name, value = %other, "setting is not a number");
                default
            }
            None => default,
        }
    }

    /// Boolean value of `name`, or `default` when unset or of another type.
    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        match self.get(name) {
            Some(Value::Bool(value)) => value,
            Some(other) => {
                tracing::warn!(name, value = %other, "setting is not a boolean");
                default
            }
            None => default,
        }
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) {
        self.inner
            .state
            .lock()
            .data
            .insert(name.to_string(), value.into());
        self.fire_on_change(name);
    }

    /// Remove `name` from this object.
    pub fn erase(&self, name: &str) {
        self.inner.state.lock().data.remove(name);
        self.fire_on_change(name);
    }

    /// Whether `name` is set on this object itself (parents not consulted).
    pub fn has(&self, name: &str) -> bool {
        self.inner.state.lock().data.contains_key(name)
    }

    /// Register `callback` under `key`, replacing any previous registration
    /// with the same key.
    pub fn add_on_change(&self, key: &str, callback: OnChangeCallback) {
        self.inner
            .state
            .lock()
            .callbacks
            .insert(key.to_string(), callback);
    }

    /// Drop the callback registered under `key`.
    pub fn clear_on_change(&self, key: &str) {
        self.inner.state.lock().callbacks.shift_remove(key);
    }

    fn fire_on_change(&self, name: &str) {
        let callbacks: Vec<OnChangeCallback> =
            self.inner.state.lock().callbacks.values().cloned().collect();
        for callback in callbacks {
            callback(name);
        }
    }

    /// Serialise the local map. Parents are not included.
    pub fn to_json(&self) -> Result<String, SettingsError> {
        let state = self.inner.state.lock();
        serde_json::to_string(&state.data).context(JsonSnafu)
    }

    /// Replace the local map wholesale, firing a change event for every key
    /// that was added, removed, or bound to a different value.
    pub fn from_json(&self, data: &str) -> Result<(), SettingsError> {
        let new: Map<String, Value> = serde_json::from_str(data).context(JsonSnafu)?;
        let old = {
            let mut state = self.inner.state.lock();
            std::mem::replace(&mut state.data, new)
        };
        let changed: Vec<String> = {
            let state = self.inner.state.lock();
            let mut keys = Vec::new();
            for (key, value) in &old {
                if state.data.get(key) != Some(value) {
                    keys.push(key.clone());
                }
            }
            for key in state.data.keys() {
                if !old.contains_key(key) {
                    keys.push(key.clone());
                }
            }
            keys
        };
        for key in &changed {
            self.fire_on_change(key);
        }
        Ok(())
    }
}

impl serde::Serialize for Settings {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.state.lock().data.serialize(serializer)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Settings")
            .field("data", &state.data)
            .field("parent", &state.parent.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn get_falls_back_to_parent_then_default() {
        let child = Settings::new();
        let parent = Settings::new();
        child.set_parent(Some(&parent));

        assert!(child.bool_or("test", true));
        parent.set("test", false);
        assert!(!child.bool_or("test", true));
    }

    #[test]
    fn parent_changes_forward_to_child_callbacks() {
        let child = Settings::new();
        let parent = Settings::new();
        child.set_parent(Some(&parent));

        let called = Arc::new(AtomicBool::new(false));
        let seen = called.clone();
        child.add_on_change(
            "something",
            Arc::new(move |_| seen.store(true, Ordering::SeqCst)),
        );

        parent.set("test", true);
        assert!(called.load(Ordering::SeqCst));

        called.store(false, Ordering::SeqCst);
        child.clear_on_change("something");
        parent.set("test", true);
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn reparenting_detaches_from_the_old_parent() {
        let child = Settings::new();
        let first = Settings::new();
        let second = Settings::new();
        child.set_parent(Some(&first));

        let called = Arc::new(AtomicBool::new(false));
        let seen = called.clone();
        child.add_on_change("watch", Arc::new(move |_| seen.store(true, Ordering::SeqCst)));

        child.set_parent(Some(&second));
        first.set("test", 1);
        assert!(!called.load(Ordering::SeqCst));

        second.set("test", 2);
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn has_ignores_the_parent() {
        let child = Settings::new();
        let parent = Settings::new();
        child.set_parent(Some(&parent));
        parent.set("inherited", 1);

        assert!(!child.has("inherited"));
        assert!(parent.has("inherited"));
        assert_eq!(child.get("inherited"), Some(Value::from(1)));
    }

    #[test]
    fn set_erase_fire_callbacks() {
        let settings = Settings::new();
        let names = Arc::new(Mutex::new(Vec::new()));
        let sink = names.clone();
        settings.add_on_change("rec", Arc::new(move |name| sink.lock().push(name.to_string())));

        settings.set("font_size", 14);
        settings.erase("font_size");
        assert_eq!(*names.lock(), vec!["font_size", "font_size"]);
    }

    #[test]
    fn typed_getters_fall_back_on_type_mismatch() {
        let settings = Settings::new();
        settings.set("name", 12);
        assert_eq!(settings.str_or("name", "fallback"), "fallback");
        assert_eq!(settings.int_or("name", 0), 12);
        assert!(settings.bool_or("name", true));
    }

    #[test]
    fn json_round_trip() {
        let settings = Settings::new();
        settings.set("a", "text");
        settings.set("b", 3);

        let json = settings.to_json().unwrap();
        let reloaded = Settings::new();
        reloaded.from_json(&json).unwrap();
        assert_eq!(reloaded.get("a"), Some(Value::from("text")));
        assert_eq!(reloaded.get("b"), Some(Value::from(3)));
    }

    // The diffing contract: one event per added, removed, or changed key.
    #[test]
    fn from_json_fires_for_the_difference_only() {
        let cases: &[(&str, &str, &[&str])] = &[
            (r#"{"font_size": 14}"#, r#"{"font_size": 12}"#, &["font_size"]),
            (r#"{"font_size": 14}"#, r#"{"font_size": 14}"#, &[]),
            (
                r#"{"a": "t1", "b": 1, "c": true}"#,
                r#"{"a": "t2", "b": 1, "c": false}"#,
                &["a", "c"],
            ),
            (
                r#"{"a": "t1", "b": 1}"#,
                r#"{"a": "t1", "c": false}"#,
                &["b", "c"],
            ),
        ];

        for (before, after, expected) in cases {
            let settings = Settings::new();
            settings.from_json(before).unwrap();

            let seen = Arc::new(Mutex::new(HashSet::new()));
            let sink = seen.clone();
            settings.add_on_change(
                "diff",
                Arc::new(move |name| {
                    sink.lock().insert(name.to_string());
                }),
            );

            settings.from_json(after).unwrap();
            let expected: HashSet<String> = expected.iter().map(|s| s.to_string()).collect();
            assert_eq!(*seen.lock(), expected, "{before} -> {after}");
        }
    }

    #[test]
    fn from_json_rejects_garbage() {
        let settings = Settings::new();
        assert!(settings.from_json("not json").is_err());
    }
}
