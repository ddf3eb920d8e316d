//! Intake agent runtime
//!
//! Runs one intake conversation against an intent pack: applies answers to
//! the result record, asks follow-ups for missing required fields, and hands
//! back the finished [`IntakeResult`](intake_core::IntakeResult) together with
//! the session memory to persist.
//!
//! # Architecture
//!
//! 1. **Field application** (`fields`) - normalize, resolve conflicts, confirm corrections
//! 2. **Readiness loop** (`runtime`) - flow questions, bounded follow-ups, finalization
//! 3. **Guardrails** (`guardrails`) - table-driven not-a-fit early exit
//! 4. **Collaborators** (`prefill`, `correction`, `llm`, `prompt`) - injectable seams
//!
//! # Safety Principle
//!
//! The LLM only proposes corrections. A suggestion reaches the record only
//! after the user confirms it, and every failure degrades to "no suggestion".

pub mod correction;
pub mod fields;
pub mod guardrails;
pub mod llm;
pub mod prefill;
pub mod prompt;
pub mod runtime;

pub use correction::{build_suggester, CorrectionSuggester, DisabledSuggester, StaticSuggester};
pub use fields::{FieldApplier, IntakeRecord};
pub use guardrails::{FitDecision, FitPolicy};
pub use prefill::{HeuristicPrefillExtractor, NoPrefill, PrefillExtractor};
pub use prompt::{CheckpointSink, Confirmation, NoCheckpoint, Prompter, ScriptedPrompter};
pub use runtime::IntakeAgent;
