use thiserror::Error;

use crate::flows::states::{
    FlowAction, FlowContext, IntakeEvent, IntakePhase, TransitionOutcome, MAX_FOLLOWUP_ROUNDS,
};

pub trait FlowDefinition {
    fn initial_phase(&self) -> IntakePhase;
    fn transition(
        &self,
        current: &IntakePhase,
        event: &IntakeEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Debug, Default)]
pub struct IntakeFlow;

impl FlowDefinition for IntakeFlow {
    fn initial_phase(&self) -> IntakePhase {
        IntakePhase::Init
    }

    fn transition(
        &self,
        current: &IntakePhase,
        event: &IntakeEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_intake(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_phase(&self) -> IntakePhase {
        self.flow.initial_phase()
    }

    pub fn apply(
        &self,
        current: &IntakePhase,
        event: &IntakeEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }
}

impl Default for FlowEngine<IntakeFlow> {
    fn default() -> Self {
        Self::new(IntakeFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("required fields still missing in {state:?}: {missing_fields:?}")]
    MissingRequiredFields { state: IntakePhase, missing_fields: Vec<String> },
    #[error("follow-up limit of {limit} rounds reached")]
    FollowUpLimitReached { limit: u32 },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: IntakePhase, event: IntakeEvent },
}

fn transition_intake(
    current: &IntakePhase,
    event: &IntakeEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{
        ApplyPrefill, AskFlowQuestions, AskMissingFields, AskOpeningQuestion,
        ComputeMissingFields, FinalizeInformational, FinalizeNotAFit, FinalizeNotReady,
        FinalizeReady, ReaskPendingFields,
    };
    use IntakeEvent::{
        AllFieldsCollected, FlowCompleted, FollowUpExhausted, FollowUpRoundCompleted,
        Informational, MissingFields, NotAFit, OpeningAnswered, Resumed, Started,
    };
    use IntakePhase::{Collecting, Finalized, FollowUp, Init, Opening, ReadinessCheck};

    let invalid = || FlowTransitionError::InvalidTransition { state: *current, event: event.clone() };
    let missing = &context.missing_required_fields;

    let (to, actions) = match (current, event) {
        (Init, Started) => (Opening, vec![AskOpeningQuestion]),
        (Init, Resumed) => (Collecting, vec![ReaskPendingFields]),
        (Opening, OpeningAnswered) => (Collecting, vec![ApplyPrefill, AskFlowQuestions]),
        (Opening, Informational) => (Finalized, vec![FinalizeInformational]),
        (Collecting, FlowCompleted) => (ReadinessCheck, vec![ComputeMissingFields]),
        (ReadinessCheck, MissingFields) => {
            if missing.is_empty() {
                return Err(invalid());
            }
            if context.follow_up_rounds >= MAX_FOLLOWUP_ROUNDS {
                return Err(FlowTransitionError::FollowUpLimitReached {
                    limit: MAX_FOLLOWUP_ROUNDS,
                });
            }
            (FollowUp, vec![AskMissingFields])
        }
        (ReadinessCheck, AllFieldsCollected) => {
            if !missing.is_empty() {
                return Err(FlowTransitionError::MissingRequiredFields {
                    state: *current,
                    missing_fields: missing.clone(),
                });
            }
            (Finalized, vec![FinalizeReady])
        }
        (ReadinessCheck, FollowUpExhausted) => {
            if missing.is_empty() || context.follow_up_rounds < MAX_FOLLOWUP_ROUNDS {
                return Err(invalid());
            }
            (Finalized, vec![FinalizeNotReady])
        }
        (FollowUp, FollowUpRoundCompleted) => (ReadinessCheck, vec![ComputeMissingFields]),
        (Finalized, NotAFit) => return Err(invalid()),
        (_, NotAFit) => (Finalized, vec![FinalizeNotAFit]),
        _ => return Err(invalid()),
    };

    Ok(TransitionOutcome { from: *current, to, event: event.clone(), actions })
}
