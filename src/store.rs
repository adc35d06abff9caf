//! A small JSON state tree with dotted-path access.
//!
//! Editor preferences live here (`"canvas.show_grid"`, `"sync.debounce_secs"`,
//! ...). The store is persisted as part of the app state, so it serializes as the
//! plain JSON object it wraps.

use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Nested JSON preferences addressed by dotted paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateStore {
    root: Map<String, Value>,
    /// Paths written since the last `take_changes`
    #[serde(skip)]
    changes: Vec<String>,
}

fn split_path(path: &str) -> Result<Vec<&str>, StoreError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(StoreError::EmptyPath);
    }
    Ok(segments)
}

impl StateStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing JSON value. Non-object values yield an empty store.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(root) => Self {
                root,
                changes: Vec::new(),
            },
            _ => Self::default(),
        }
    }

    /// The whole tree as a JSON object.
    pub fn as_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    /// Looks up the value at a dotted path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let segments = split_path(path).ok()?;
        let (last, parents) = segments.split_last()?;
        let mut current = &self.root;
        for segment in parents {
            current = current.get(*segment)?.as_object()?;
        }
        current.get(*last)
    }

    /// Looks up and deserializes the value at a dotted path.
    ///
    /// Values of the wrong type are treated as missing.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let value = self.get(path)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                log::debug!("Ignoring state value at '{path}': {e}");
                None
            }
        }
    }

    /// Whether a value exists at the dotted path.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Stores `value` at a dotted path, creating intermediate objects.
    ///
    /// Fails if an intermediate segment already holds a non-object value.
    pub fn set<T: Serialize>(&mut self, path: &str, value: T) -> Result<(), StoreError> {
        let segments = split_path(path)?;
        let value = serde_json::to_value(value)?;
        let Some((last, parents)) = segments.split_last() else {
            return Err(StoreError::EmptyPath);
        };

        let mut current = &mut self.root;
        for (i, segment) in parents.iter().enumerate() {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match entry {
                Value::Object(map) => map,
                _ => {
                    return Err(StoreError::NotAnObject(
                        segments[..=i].join("."),
                        path.to_string(),
                    ))
                }
            };
        }
        current.insert(last.to_string(), value);
        self.record_change(path);
        Ok(())
    }

    /// Removes and returns the value at a dotted path.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let segments = split_path(path).ok()?;
        let (last, parents) = segments.split_last()?;
        let mut current = &mut self.root;
        for segment in parents {
            current = current.get_mut(*segment)?.as_object_mut()?;
        }
        let removed = current.remove(*last)?;
        self.record_change(path);
        Some(removed)
    }

    /// Drains the paths written since the last call, in first-write order.
    pub fn take_changes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.changes)
    }

    fn record_change(&mut self, path: &str) {
        if !self.changes.iter().any(|p| p == path) {
            self.changes.push(path.to_string());
        }
    }
}
