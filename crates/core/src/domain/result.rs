use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::session::SessionId;
use crate::flows::IntakePhase;
use crate::intents::FALLBACK_INTENT_ID;
use crate::normalize::{is_provided, NOT_PROVIDED};

pub const SCHEMA_VERSION: &str = "1.2";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Fields with a dedicated slot in [`RequestDetails`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoreField {
    IssueDescription,
    ServiceType,
    Urgency,
    Timeline,
    Location,
    BudgetRange,
    Constraints,
}

impl CoreField {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "issue_description" => Some(Self::IssueDescription),
            "service_type" => Some(Self::ServiceType),
            "urgency" => Some(Self::Urgency),
            "timeline" => Some(Self::Timeline),
            "location" => Some(Self::Location),
            "budget_range" => Some(Self::BudgetRange),
            "constraints" => Some(Self::Constraints),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::IssueDescription => "issue_description",
            Self::ServiceType => "service_type",
            Self::Urgency => "urgency",
            Self::Timeline => "timeline",
            Self::Location => "location",
            Self::BudgetRange => "budget_range",
            Self::Constraints => "constraints",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    Text(String),
    List(Vec<String>),
}

impl ExtraValue {
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Text(value) => !is_provided(value),
            Self::List(values) => values.is_empty(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDetails {
    pub issue_description: String,
    pub service_type: String,
    pub urgency: String,
    pub timeline: String,
    pub location: String,
    pub budget_range: String,
    pub constraints: Vec<String>,
    pub extra_fields: BTreeMap<String, ExtraValue>,
}

impl Default for RequestDetails {
    fn default() -> Self {
        Self {
            issue_description: NOT_PROVIDED.to_string(),
            service_type: NOT_PROVIDED.to_string(),
            urgency: NOT_PROVIDED.to_string(),
            timeline: NOT_PROVIDED.to_string(),
            location: NOT_PROVIDED.to_string(),
            budget_range: NOT_PROVIDED.to_string(),
            constraints: Vec::new(),
            extra_fields: BTreeMap::new(),
        }
    }
}

impl RequestDetails {
    /// The string slot for a core field; `constraints` has none.
    pub fn slot(&self, field: CoreField) -> Option<&String> {
        match field {
            CoreField::IssueDescription => Some(&self.issue_description),
            CoreField::ServiceType => Some(&self.service_type),
            CoreField::Urgency => Some(&self.urgency),
            CoreField::Timeline => Some(&self.timeline),
            CoreField::Location => Some(&self.location),
            CoreField::BudgetRange => Some(&self.budget_range),
            CoreField::Constraints => None,
        }
    }

    pub fn slot_mut(&mut self, field: CoreField) -> Option<&mut String> {
        match field {
            CoreField::IssueDescription => Some(&mut self.issue_description),
            CoreField::ServiceType => Some(&mut self.service_type),
            CoreField::Urgency => Some(&mut self.urgency),
            CoreField::Timeline => Some(&mut self.timeline),
            CoreField::Location => Some(&mut self.location),
            CoreField::BudgetRange => Some(&mut self.budget_range),
            CoreField::Constraints => None,
        }
    }

    /// Missing means blank, the sentinel, an empty list, or absent.
    pub fn is_missing(&self, field: &str) -> bool {
        match CoreField::parse(field) {
            Some(CoreField::Constraints) => self.constraints.is_empty(),
            Some(core) => self.slot(core).map_or(true, |value| !is_provided(value)),
            None => self.extra_fields.get(field).map_or(true, ExtraValue::is_missing),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sources {
    pub prefill: bool,
    pub llm_used: Vec<String>,
}

impl Default for Sources {
    fn default() -> Self {
        Self { prefill: false, llm_used: Vec::new() }
    }
}

impl Sources {
    pub fn record_llm_use(&mut self, tag: &str) {
        if !self.llm_used.iter().any(|used| used == tag) {
            self.llm_used.push(tag.to_string());
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub request_type: String,
    pub service_category: String,
    pub intent_id: String,
    pub summary: String,
    pub details: RequestDetails,
    pub decision_log: Vec<String>,
    pub sources: Sources,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    Ready,
    NotReady,
    NotAFit,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    pub status: ReadinessStatus,
    pub missing_fields: Vec<String>,
    pub inconsistencies: Vec<String>,
    pub notes: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    RouteHuman,
    AskFollowUp,
    Completed,
}

impl RecommendedAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "route_human" => Some(Self::RouteHuman),
            "ask_follow_up" => Some(Self::AskFollowUp),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handoff {
    pub recommended_action: RecommendedAction,
    pub next_questions: Vec<String>,
    pub routing_hint: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub source: String,
    pub user_id: String,
    pub username: String,
    pub timestamp_utc: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub language: String,
    pub state: IntakePhase,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub conversation_turns: u32,
    pub tool_calls: Vec<String>,
    pub created_at_utc: DateTime<Utc>,
}

/// The structured record emitted once per run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeResult {
    pub schema_version: String,
    pub request_id: RequestId,
    pub channel: Channel,
    pub session: SessionInfo,
    pub request: Request,
    pub readiness: Readiness,
    pub handoff: Handoff,
    pub audit: Audit,
}

impl IntakeResult {
    pub fn new(request_id: RequestId, session_id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            request_id,
            channel: Channel {
                source: "cli".to_string(),
                user_id: "local_user".to_string(),
                username: "local".to_string(),
                timestamp_utc: now,
            },
            session: SessionInfo {
                session_id,
                language: "en".to_string(),
                state: IntakePhase::Init,
            },
            request: Request {
                request_type: "service_request".to_string(),
                service_category: "general_services".to_string(),
                intent_id: FALLBACK_INTENT_ID.to_string(),
                summary: "Service request".to_string(),
                details: RequestDetails::default(),
                decision_log: Vec::new(),
                sources: Sources::default(),
            },
            readiness: Readiness {
                status: ReadinessStatus::NotReady,
                missing_fields: Vec::new(),
                inconsistencies: Vec::new(),
                notes: String::new(),
            },
            handoff: Handoff {
                recommended_action: RecommendedAction::AskFollowUp,
                next_questions: Vec::new(),
                routing_hint: "human_review".to_string(),
            },
            audit: Audit { conversation_turns: 0, tool_calls: Vec::new(), created_at_utc: now },
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
