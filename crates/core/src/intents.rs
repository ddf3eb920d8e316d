//! Intent pack document
//!
//! The pack is the JSON document that drives every conversation: which
//! intents exist, how they are matched, the ordered flow of questions for
//! each, the synonym tables used by the normalizers, and the business rules
//! applied at readiness time. Intents are data, not types.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ConfigError;
use crate::normalize::NormalizeKind;

pub const FALLBACK_INTENT_ID: &str = "fallback_unknown";

pub type SynonymTable = BTreeMap<String, Vec<String>>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentPack {
    #[serde(default)]
    pub intents: Vec<Intent>,
    #[serde(default)]
    pub normalizers: Normalizers,
    #[serde(default)]
    pub defaults: PackDefaults,
    #[serde(default)]
    pub llm: PackLlmSettings,
    #[serde(default)]
    pub fit_rules: FitRules,
    #[serde(default)]
    pub prefill: PrefillSettings,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub id: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default, rename = "match")]
    pub match_rule: MatchRule,
    #[serde(default)]
    pub flow: Vec<FlowStep>,
    #[serde(default)]
    pub required_fields: Option<Vec<String>>,
    #[serde(default)]
    pub handoff: Option<HandoffSettings>,
    #[serde(default)]
    pub opening_message: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub service_category: Option<String>,
    #[serde(default)]
    pub request_type: Option<String>,
    /// Informational intents answer and stop instead of running an intake.
    #[serde(default)]
    pub informational: bool,
    #[serde(default)]
    pub informational_reply: Option<String>,
    /// Legacy per-field settings; a flow step's own `allowed` wins.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSettings>,
}

impl Intent {
    /// Intent used when the pack offers nothing better.
    pub fn synthetic_fallback() -> Self {
        Self { id: FALLBACK_INTENT_ID.to_string(), ..Self::default() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRule {
    #[serde(default)]
    pub always: bool,
    #[serde(default)]
    pub keywords_any: Vec<String>,
    #[serde(default)]
    pub starts_with_any: Vec<String>,
}

impl MatchRule {
    pub fn is_empty(&self) -> bool {
        !self.always
            && self.keywords_any.iter().all(|keyword| keyword.trim().is_empty())
            && self.starts_with_any.iter().all(|prefix| prefix.trim().is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStep {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub normalize: NormalizeKind,
    #[serde(default)]
    pub allowed: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSettings {
    #[serde(default)]
    pub allowed: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffSettings {
    #[serde(default)]
    pub recommended_action: Option<String>,
    #[serde(default)]
    pub routing_hint: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Normalizers {
    #[serde(default)]
    pub urgency: SynonymTable,
    #[serde(default)]
    pub timeline: SynonymTable,
    #[serde(default)]
    pub budget: SynonymTable,
    #[serde(default)]
    pub service_type: SynonymTable,
    #[serde(default)]
    pub constraints_ignore: Vec<String>,
}

impl Normalizers {
    pub fn table(&self, kind: NormalizeKind) -> Option<&SynonymTable> {
        match kind {
            NormalizeKind::Urgency => Some(&self.urgency),
            NormalizeKind::Timeline => Some(&self.timeline),
            NormalizeKind::Budget => Some(&self.budget),
            NormalizeKind::ServiceType => Some(&self.service_type),
            NormalizeKind::Text => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackDefaults {
    #[serde(default)]
    pub service_category: Option<String>,
    #[serde(default)]
    pub request_type: Option<String>,
    #[serde(default)]
    pub greeting: Option<String>,
    #[serde(default)]
    pub opening_question: Option<String>,
    #[serde(default)]
    pub opening_message: Option<String>,
    #[serde(default)]
    pub handoff: Option<HandoffSettings>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PackLlmSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub min_confidence: Option<f64>,
}

/// Budget values that mark a request as economically incompatible.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitRules {
    pub budget_contains: Vec<String>,
    pub budget_equals: Vec<String>,
    pub routing_hint: String,
    pub notes: String,
}

impl Default for FitRules {
    fn default() -> Self {
        Self {
            budget_contains: vec!["free".to_string()],
            budget_equals: Vec::new(),
            routing_hint: "not_a_fit_review".to_string(),
            notes: "Budget constraint is not compatible with typical service delivery.".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefillSettings {
    #[serde(default)]
    pub known_locations: Vec<String>,
}

impl IntentPack {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
        let value = serde_json::from_str::<Value>(&raw)
            .map_err(|source| ConfigError::ParseIntentPack { path: path.to_path_buf(), source })?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let is_empty = match &value {
            Value::Object(map) => map.is_empty(),
            Value::Null => true,
            _ => {
                return Err(ConfigError::Validation(
                    "intent pack must be a JSON object".to_string(),
                ))
            }
        };
        if is_empty {
            return Err(ConfigError::Validation("intent pack is empty".to_string()));
        }
        if !value.get("intents").is_some_and(Value::is_array) {
            return Err(ConfigError::Validation(
                "intent pack is missing an `intents` list".to_string(),
            ));
        }

        let pack = serde_json::from_value::<Self>(value).map_err(|error| {
            ConfigError::Validation(format!("intent pack does not match the expected schema: {error}"))
        })?;
        pack.validate()?;
        Ok(pack)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for intent in &self.intents {
            let id = intent.id.trim();
            if id.is_empty() {
                return Err(ConfigError::Validation(
                    "every intent needs a non-empty `id`".to_string(),
                ));
            }
            if !seen.insert(id.to_string()) {
                return Err(ConfigError::Validation(format!("duplicate intent id `{id}`")));
            }
            if intent.match_rule.is_empty() && id != FALLBACK_INTENT_ID {
                return Err(ConfigError::Validation(format!(
                    "intent `{id}` has no match rule (set `always`, `keywords_any` or `starts_with_any`)"
                )));
            }
        }

        if let Some(confidence) = self.llm.min_confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(ConfigError::Validation(
                    "llm.min_confidence must be in range 0.0..=1.0".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn intent(&self, id: &str) -> Option<&Intent> {
        self.intents.iter().find(|intent| intent.id == id)
    }
}
