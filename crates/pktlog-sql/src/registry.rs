//! Key registry
//!
//! The host pipeline owns the set of known keys and their per-record values.
//! The sink reaches it only through [`KeyRegistry`]: names are resolved to a
//! stable [`KeyId`] once per (re)connect, and values are looked up by id once
//! per record.
//!
//! [`KeyTable`] is a simple in-memory registry used by the command-line host
//! and by tests.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{KeyResult, Value, ValueKind};

/// Stable handle of a key within a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(pub u32);

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Source of typed key values for the record being output
pub trait KeyRegistry: Send + Sync {
    /// Resolve a dotted key name (e.g. `ip.saddr`) to its id
    fn resolve_by_name(&self, name: &str) -> Option<KeyId>;

    /// Current result of a key, `None` if the id is unknown
    fn resolve_by_id(&self, id: KeyId) -> Option<&KeyResult>;
}

#[derive(Debug, Clone)]
struct Entry {
    kind: ValueKind,
    result: KeyResult,
}

/// In-memory key registry
#[derive(Debug, Clone, Default)]
pub struct KeyTable {
    entries: Vec<Entry>,
    by_name: HashMap<String, KeyId>,
}

impl KeyTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key; registering an existing name returns its id
    pub fn register(&mut self, name: impl Into<String>, kind: ValueKind) -> KeyId {
        let name = name.into();
        if let Some(id) = self.by_name.get(&name) {
            return *id;
        }
        let id = KeyId(self.entries.len() as u32);
        self.entries.push(Entry {
            kind,
            result: KeyResult::invalid(name.clone()),
        });
        self.by_name.insert(name, id);
        id
    }

    /// Number of registered keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keys are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declared kind of a key
    pub fn kind(&self, id: KeyId) -> Option<ValueKind> {
        self.entries.get(id.0 as usize).map(|e| e.kind)
    }

    /// Set the value of a key by id (`None` marks it invalid)
    pub fn set(&mut self, id: KeyId, value: Option<Value>) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id.0 as usize)
            .ok_or_else(|| Error::internal(format!("unknown key id {}", id)))?;
        entry.result.value = value;
        Ok(())
    }

    /// Set the value of a key by name
    pub fn set_by_name(&mut self, name: &str, value: Option<Value>) -> Result<()> {
        let id = self
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::config(format!("unknown key '{}'", name)))?;
        self.set(id, value)
    }

    /// Mark every key invalid (start of a new record)
    pub fn invalidate_all(&mut self) {
        for entry in &mut self.entries {
            entry.result.value = None;
        }
    }

    /// Load one record from a JSON object of `dotted key -> value`.
    ///
    /// All keys are invalidated first. Keys missing from the object, `null`
    /// values and values that do not fit the declared kind stay invalid.
    /// Returns the names present in the object but not registered.
    pub fn load_json_record(&mut self, record: &serde_json::Value) -> Result<Vec<String>> {
        let object = record
            .as_object()
            .ok_or_else(|| Error::config("record must be a JSON object"))?;

        self.invalidate_all();

        let mut unknown = Vec::new();
        for (name, json) in object {
            match self.by_name.get(name.as_str()).copied() {
                Some(id) => {
                    let entry = &mut self.entries[id.0 as usize];
                    entry.result.value = Value::from_json(entry.kind, json);
                }
                None => unknown.push(name.clone()),
            }
        }
        Ok(unknown)
    }
}

impl KeyRegistry for KeyTable {
    fn resolve_by_name(&self, name: &str) -> Option<KeyId> {
        self.by_name.get(name).copied()
    }

    fn resolve_by_id(&self, id: KeyId) -> Option<&KeyResult> {
        self.entries.get(id.0 as usize).map(|e| &e.result)
    }
}
