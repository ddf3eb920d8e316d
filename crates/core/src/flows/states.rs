use serde::{Deserialize, Serialize};

pub const MAX_FOLLOWUP_ROUNDS: u32 = 2;
pub const MAX_EMPTY_TRIES_PER_FIELD_IN_RUN: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakePhase {
    Init,
    Opening,
    Collecting,
    ReadinessCheck,
    FollowUp,
    Finalized,
}

impl IntakePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Opening => "opening",
            Self::Collecting => "collecting",
            Self::ReadinessCheck => "readiness_check",
            Self::FollowUp => "follow_up",
            Self::Finalized => "finalized",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Finalized)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntakeEvent {
    Started,
    Resumed,
    OpeningAnswered,
    FlowCompleted,
    MissingFields,
    AllFieldsCollected,
    FollowUpRoundCompleted,
    FollowUpExhausted,
    NotAFit,
    Informational,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlowContext {
    pub missing_required_fields: Vec<String>,
    pub follow_up_rounds: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    AskOpeningQuestion,
    ReaskPendingFields,
    ApplyPrefill,
    AskFlowQuestions,
    ComputeMissingFields,
    AskMissingFields,
    FinalizeReady,
    FinalizeNotReady,
    FinalizeNotAFit,
    FinalizeInformational,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: IntakePhase,
    pub to: IntakePhase,
    pub event: IntakeEvent,
    pub actions: Vec<FlowAction>,
}
