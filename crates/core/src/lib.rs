pub mod config;
pub mod consistency;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod intents;
pub mod normalize;
pub mod routing;

pub use config::{AppConfig, ConfigError, LlmConfig, LlmProvider, LoadOptions, LogFormat};
pub use domain::result::{
    CoreField, ExtraValue, IntakeResult, ReadinessStatus, RecommendedAction, RequestDetails,
    RequestId,
};
pub use domain::session::{SessionId, SessionMemory};
pub use errors::{ApplicationError, DomainError};
pub use flows::{FlowEngine, IntakeEvent, IntakeFlow, IntakePhase};
pub use intents::{Intent, IntentPack, FALLBACK_INTENT_ID};
pub use normalize::{NormalizeKind, NOT_PROVIDED};
pub use routing::{IntentRouter, IntentSelection, SelectionReason};
