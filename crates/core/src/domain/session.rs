use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::flows::IntakePhase;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Memory persisted between runs of the same session.
///
/// Unknown keys written by other tools are preserved through `extra` so a
/// load/export cycle never drops them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionMemory {
    #[serde(default)]
    pub missing_fields: Vec<String>,
    #[serde(default)]
    pub collected: BTreeMap<String, Value>,
    #[serde(default)]
    pub attempts: BTreeMap<String, u32>,
    #[serde(default = "default_last_state")]
    pub last_state: String,
    #[serde(default)]
    pub last_intent_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_last_state() -> String {
    IntakePhase::Init.as_str().to_string()
}

impl Default for SessionMemory {
    fn default() -> Self {
        Self {
            missing_fields: Vec::new(),
            collected: BTreeMap::new(),
            attempts: BTreeMap::new(),
            last_state: default_last_state(),
            last_intent_id: None,
            extra: Map::new(),
        }
    }
}

impl SessionMemory {
    /// Merges a stored mapping over defaults key by key. A malformed key keeps
    /// its default; a document that is not a mapping yields defaults.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut stored) = value else {
            return Self::default();
        };

        let mut memory = Self::default();
        merge_key(&mut stored, "missing_fields", &mut memory.missing_fields);
        merge_key(&mut stored, "collected", &mut memory.collected);
        merge_key(&mut stored, "attempts", &mut memory.attempts);
        merge_key(&mut stored, "last_state", &mut memory.last_state);
        merge_key(&mut stored, "last_intent_id", &mut memory.last_intent_id);
        memory.extra = stored;
        memory
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn is_resuming(&self) -> bool {
        !self.missing_fields.is_empty()
    }

    pub fn attempts_for(&self, field: &str) -> u32 {
        self.attempts.get(field).copied().unwrap_or(0)
    }

    pub fn record_blank_attempt(&mut self, field: &str) -> u32 {
        let counter = self.attempts.entry(field.to_string()).or_insert(0);
        *counter = counter.saturating_add(1);
        *counter
    }

    pub fn clear_attempts(&mut self, field: &str) {
        self.attempts.remove(field);
    }

    pub fn remember(&mut self, field: &str, value: Value) {
        self.collected.insert(field.to_string(), value);
    }

    /// Forgets the previous request's answers before a new conversation.
    pub fn start_fresh(&mut self) {
        self.collected.clear();
        self.attempts.clear();
        self.missing_fields.clear();
    }
}

fn merge_key<T: DeserializeOwned>(stored: &mut Map<String, Value>, key: &str, slot: &mut T) {
    if let Some(parsed) = stored.remove(key).and_then(|raw| serde_json::from_value(raw).ok()) {
        *slot = parsed;
    }
}
