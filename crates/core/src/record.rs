//! Session record held for the duration of a request.

use std::collections::HashMap;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Key/value session data plus bookkeeping.
///
/// Stored between requests as its JSON payload. The `modified` flag never
/// leaves the process; it tells the request pipeline whether a save is due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier (hex)
    pub id: String,
    /// Unix seconds of the last save
    pub last_access: i64,
    #[serde(default)]
    data: HashMap<String, Value>,
    #[serde(skip)]
    modified: bool,
}

impl SessionRecord {
    /// Creates an empty record for `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            last_access: Utc::now().timestamp(),
            data: HashMap::new(),
            modified: false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Reads a value and deserializes it into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Writes a value, marking the record modified.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
        self.modified = true;
    }

    /// Removes a value. Returns whether it existed.
    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.data.remove(key).is_some();
        if removed {
            self.modified = true;
        }
        removed
    }

    /// Merges every entry of `values` into the record.
    pub fn merge(&mut self, values: serde_json::Map<String, Value>) {
        for (key, value) in values {
            self.set(key, value);
        }
    }

    pub fn data(&self) -> &HashMap<String, Value> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn reset_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    /// Stamps the last access time.
    pub fn touch(&mut self) {
        self.last_access = Utc::now().timestamp();
    }

    /// Serializes the record into its stored form.
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restores a record from its stored form. The result is unmodified.
    pub fn from_payload(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}
