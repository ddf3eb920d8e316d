pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError, IntakeFlow};
pub use states::{
    FlowAction, FlowContext, IntakeEvent, IntakePhase, TransitionOutcome,
    MAX_EMPTY_TRIES_PER_FIELD_IN_RUN, MAX_FOLLOWUP_ROUNDS,
};
