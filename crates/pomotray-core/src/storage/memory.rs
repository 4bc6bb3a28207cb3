//! In-process store, used for `--offline` runs and tests.

use serde_json::{Map, Value};
use std::sync::Mutex;

use super::{segments, PersistenceStore};
use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct MemoryStore {
    root: Mutex<Value>,
    offline: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(Value::Object(Map::new())),
            offline: false,
        }
    }

    /// A store whose every call fails, to exercise fallback paths.
    pub fn failing() -> Self {
        Self {
            offline: true,
            ..Self::new()
        }
    }

    fn check(&self, path: &str) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Http {
                path: path.to_string(),
                message: "store offline".into(),
            });
        }
        Ok(())
    }

    fn with_root<T>(&self, f: impl FnOnce(&mut Value) -> T) -> T {
        let mut root = self.root.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut root)
    }
}

impl PersistenceStore for MemoryStore {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.check(path)?;
        Ok(self.with_root(|root| lookup(root, path).cloned()))
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.check(path)?;
        self.with_root(|root| *entry(root, path) = value);
        Ok(())
    }

    fn update_field(&self, path: &str, key: &str, value: Value) -> Result<(), StoreError> {
        self.check(path)?;
        self.with_root(|root| {
            let target = entry(root, path);
            if target.is_null() {
                *target = Value::Object(Map::new());
            }
            match target.as_object_mut() {
                Some(object) => {
                    object.insert(key.to_string(), value);
                    Ok(())
                }
                None => Err(StoreError::NotAnObject(path.to_string())),
            }
        })
    }
}

pub(crate) fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for part in segments(path) {
        current = current.get(part)?;
    }
    Some(current)
}

/// Walk to `path`, turning every non-object on the way into an object.
pub(crate) fn entry<'a>(root: &'a mut Value, path: &str) -> &'a mut Value {
    let mut current = root;
    for part in segments(path) {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map.entry(part.to_string()).or_insert(Value::Null),
            _ => unreachable!("converted to object above"),
        };
    }
    current
}
