// Flat key-value state record for resuming a task.
//
// Strategies persist a minimal subset of their state (anchors, generator
// cursors, counters, per-hand session snapshots) as named fields. Each
// value is stored as its JSON text, so the record itself is a plain
// `BTreeMap<String, String>`: the host can put it in NBT, a database row or
// a bincode blob without knowing any engine type.
//
// Keys are namespaced by convention: `task.*` for the task driver, then one
// prefix per strategy (`tower.layer`, `dig.hand.main`, ...).
//
// See also: `strategy.rs` for `write_state`/`read_state`, `task.rs` for the
// task-level fields.

use crate::error::EngineError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateRecord {
    fields: BTreeMap<String, String>,
}

impl StateRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), EngineError> {
        self.fields.insert(key.to_string(), serde_json::to_string(value)?);
        Ok(())
    }

    /// Read a field. Absent fields are `Ok(None)`; malformed ones are errors.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, EngineError> {
        match self.fields.get(key) {
            Some(text) => Ok(Some(serde_json::from_str(text)?)),
            None => Ok(None),
        }
    }

    /// Read a field that must be present.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T, EngineError> {
        self.get(key)?
            .ok_or_else(|| EngineError::MissingField(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VoxelCoord;

    #[test]
    fn typed_fields_roundtrip() {
        let mut record = StateRecord::new();
        record.put("tower.layer", &4u32).unwrap();
        record.put("tower.origin", &VoxelCoord::new(1, -2, 3)).unwrap();
        assert_eq!(record.get::<u32>("tower.layer").unwrap(), Some(4));
        assert_eq!(
            record.require::<VoxelCoord>("tower.origin").unwrap(),
            VoxelCoord::new(1, -2, 3)
        );
        assert_eq!(record.get::<u32>("tower.missing").unwrap(), None);
    }

    #[test]
    fn require_reports_missing_field() {
        let record = StateRecord::new();
        let err = record.require::<u32>("task.mode").unwrap_err();
        assert!(matches!(err, EngineError::MissingField(ref k) if k == "task.mode"));
    }

    #[test]
    fn wrong_type_is_an_error() {
        let mut record = StateRecord::new();
        record.put("dig.cursor", &"north").unwrap();
        assert!(record.get::<u32>("dig.cursor").is_err());
    }

    #[test]
    fn json_text_keeps_key_order() {
        let mut record = StateRecord::new();
        record.put("b", &2).unwrap();
        record.put("a", &1).unwrap();
        let json = record.to_json().unwrap();
        assert!(json.find("\"a\"").unwrap() < json.find("\"b\"").unwrap());
        assert_eq!(StateRecord::from_json(&json).unwrap(), record);
    }
}
