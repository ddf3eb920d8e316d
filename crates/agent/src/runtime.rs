//! Readiness and follow-up loop
//!
//! [`IntakeAgent`] drives one run of a conversation: opening question, intent
//! selection, prefill, the intent's flow, then a bounded number of follow-up
//! rounds for required fields that are still missing. Phase changes go through
//! the core [`FlowEngine`]; a refused transition is logged and the phase kept.

use intake_core::domain::result::Handoff;
use intake_core::flows::{FlowContext, MAX_EMPTY_TRIES_PER_FIELD_IN_RUN, MAX_FOLLOWUP_ROUNDS};
use intake_core::intents::{HandoffSettings, Intent, IntentPack};
use intake_core::routing::{opening_message, question_for, required_fields};
use intake_core::{
    FlowEngine, IntakeEvent, IntakeFlow, IntakePhase, IntakeResult, IntentRouter, ReadinessStatus,
    RecommendedAction, RequestId, SessionId, SessionMemory,
};
use tracing::{debug, info, warn};

use crate::correction::{CorrectionSuggester, DisabledSuggester};
use crate::fields::{FieldApplier, IntakeRecord};
use crate::guardrails::{FitDecision, FitPolicy};
use crate::prefill::{HeuristicPrefillExtractor, PrefillExtractor};
use crate::prompt::{CheckpointSink, NoCheckpoint, Prompter};

const DEFAULT_OPENING_QUESTION: &str = "Tell me briefly what you need help with.";
const DEFAULT_INFORMATIONAL_REPLY: &str =
    "Thanks for your question. A team member will follow up with the details.";
const DEFAULT_ROUTING_HINT: &str = "human_review";
const READY_NOTES: &str = "Request has sufficient information for human handling.";
const NOT_READY_NOTES: &str = "More information is required to proceed.";
const INFORMATIONAL_NOTES: &str = "Informational request (not an intake).";

pub struct IntakeAgent<'a> {
    pack: &'a IntentPack,
    record: IntakeRecord,
    flow: FlowEngine<IntakeFlow>,
    phase: IntakePhase,
    context: FlowContext,
    intent: Option<Intent>,
    suggester: Box<dyn CorrectionSuggester + 'a>,
    extractor: Box<dyn PrefillExtractor + 'a>,
    fit: FitPolicy,
    checkpoint: Box<dyn CheckpointSink + 'a>,
    turns: u32,
}

impl<'a> IntakeAgent<'a> {
    /// `memory` is the previously exported state for this session, if any.
    pub fn new(
        pack: &'a IntentPack,
        request_id: RequestId,
        session_id: SessionId,
        memory: Option<SessionMemory>,
    ) -> Self {
        let flow = FlowEngine::default();
        let phase = flow.initial_phase();
        Self {
            pack,
            record: IntakeRecord::new(
                IntakeResult::new(request_id, session_id),
                memory.unwrap_or_default(),
            ),
            flow,
            phase,
            context: FlowContext::default(),
            intent: None,
            suggester: Box::new(DisabledSuggester),
            extractor: Box::new(HeuristicPrefillExtractor::new(&pack.prefill)),
            fit: FitPolicy::from_rules(&pack.fit_rules),
            checkpoint: Box::new(NoCheckpoint),
            turns: 0,
        }
    }

    pub fn with_suggester(mut self, suggester: Box<dyn CorrectionSuggester + 'a>) -> Self {
        self.suggester = suggester;
        self
    }

    pub fn with_extractor(mut self, extractor: Box<dyn PrefillExtractor + 'a>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: Box<dyn CheckpointSink + 'a>) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    pub fn phase(&self) -> IntakePhase {
        self.phase
    }

    pub fn result(&self) -> &IntakeResult {
        &self.record.result
    }

    /// Runs the conversation to completion and returns the result record.
    pub fn run(&mut self, prompter: &mut dyn Prompter) -> IntakeResult {
        let resuming = self.record.memory.is_resuming();
        info!(
            event_name = "intake.run.started",
            correlation_id = %self.record.result.request_id.0,
            session_id = self.record.result.session.session_id.as_str(),
            resuming,
            "intake run started"
        );

        if resuming {
            self.run_resumed(prompter);
        } else {
            self.run_fresh(prompter);
        }

        self.record.result.audit.conversation_turns = self.turns;
        self.record.result.session.state = self.phase;
        self.record.memory.last_state = self.phase.as_str().to_string();
        self.publish();

        let readiness = &self.record.result.readiness;
        info!(
            event_name = "intake.readiness.finalized",
            correlation_id = %self.record.result.request_id.0,
            session_id = self.record.result.session.session_id.as_str(),
            intent_id = %self.record.result.request.intent_id,
            status = ?readiness.status,
            missing = readiness.missing_fields.len(),
            inconsistencies = readiness.inconsistencies.len(),
            turns = self.turns,
            "intake run finalized"
        );

        self.record.result.clone()
    }

    /// A persistable snapshot, consistent at any point of the run.
    ///
    /// Before finalization the pending list is exported as whatever is still
    /// unanswered from the resumed list, followed by the missing required
    /// fields, so an interrupted run resumes where it stopped.
    pub fn export_state(&self) -> SessionMemory {
        let mut memory = self.record.memory.clone();
        memory.last_state = self.phase.as_str().to_string();

        if !self.phase.is_final() {
            if let Some(intent) = &self.intent {
                let mut pending: Vec<String> = memory
                    .missing_fields
                    .iter()
                    .filter(|field| self.record.is_missing(field))
                    .cloned()
                    .collect();
                for field in self.missing_required(intent) {
                    if !pending.contains(&field) {
                        pending.push(field);
                    }
                }
                memory.missing_fields = pending;
                memory.last_intent_id = Some(intent.id.clone());
            }
        }

        memory
    }

    fn run_fresh(&mut self, prompter: &mut dyn Prompter) {
        self.advance(IntakeEvent::Started);

        let pack = self.pack;
        let defaults = &pack.defaults;
        let greeting = defaults.greeting.as_deref().filter(|text| !text.trim().is_empty());
        if let Some(greeting) = greeting {
            prompter.say(greeting);
        }
        let question = defaults
            .opening_question
            .clone()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OPENING_QUESTION.to_string());
        let opening = self.ask(prompter, &question);

        let selection = IntentRouter::new(self.pack).select(&opening);
        let entry = selection.log_entry();
        let reason = selection.reason;
        let intent = selection.intent.into_owned();

        self.record.memory.start_fresh();
        self.record.memory.last_intent_id = Some(intent.id.clone());
        self.adopt_intent(&intent);
        self.intent = Some(intent.clone());
        self.record.log(entry);
        info!(
            event_name = "intake.intent.selected",
            correlation_id = %self.record.result.request_id.0,
            session_id = self.record.result.session.session_id.as_str(),
            intent_id = %intent.id,
            reason = reason.tag(),
            "intent selected"
        );
        self.apply_answer(&intent, "issue_description", &opening, prompter);
        self.publish();

        if intent.informational {
            self.finalize_informational(&intent, &opening, prompter);
            return;
        }

        self.advance(IntakeEvent::OpeningAnswered);
        prompter.say(&opening_message(self.pack, &intent));

        let candidates = self.extractor.extract(&opening);
        FieldApplier::new(self.pack, self.suggester.as_ref()).apply_prefill(
            &intent,
            &candidates,
            &mut self.record,
        );
        if self.stopped_as_not_a_fit() {
            return;
        }

        for step in &intent.flow {
            let field = step.field.trim();
            if field.is_empty() || field == "issue_description" {
                continue;
            }
            let answer = self.ask(prompter, &question_for(&intent, field));
            self.record_answer(&intent, field, &answer, prompter);
            if self.stopped_as_not_a_fit() {
                return;
            }
        }

        self.advance(IntakeEvent::FlowCompleted);
        self.readiness_loop(&intent, prompter);
    }

    fn run_resumed(&mut self, prompter: &mut dyn Prompter) {
        self.advance(IntakeEvent::Resumed);
        let pending = self.record.memory.missing_fields.clone();
        let last_intent_id = self.record.memory.last_intent_id.clone();

        let router = IntentRouter::new(self.pack);
        let intent = match router.resume(last_intent_id.as_deref()) {
            Some(selection) => {
                self.record.log(format!("intent_resumed: {}", selection.intent.id));
                selection.intent.into_owned()
            }
            None => {
                let selection = router.fallback();
                self.record.log(format!(
                    "intent_resume_fallback: {} ({})",
                    selection.intent.id,
                    selection.reason.tag()
                ));
                warn!(
                    event_name = "intake.intent.resume_fallback",
                    correlation_id = %self.record.result.request_id.0,
                    session_id = self.record.result.session.session_id.as_str(),
                    last_intent_id = last_intent_id.as_deref().unwrap_or(""),
                    fallback_id = %selection.intent.id,
                    "stored intent is not in the current pack"
                );
                selection.intent.into_owned()
            }
        };

        self.record.memory.last_intent_id = Some(intent.id.clone());
        self.adopt_intent(&intent);
        FieldApplier::new(self.pack, self.suggester.as_ref()).hydrate(&intent, &mut self.record);
        self.intent = Some(intent.clone());

        for field in &pending {
            let answer = self.ask(prompter, &question_for(&intent, field));
            self.record_answer(&intent, field, &answer, prompter);
            if self.stopped_as_not_a_fit() {
                return;
            }
        }

        self.advance(IntakeEvent::FlowCompleted);
        self.readiness_loop(&intent, prompter);
    }

    fn readiness_loop(&mut self, intent: &Intent, prompter: &mut dyn Prompter) {
        loop {
            let missing = self.missing_required(intent);
            self.context.missing_required_fields = missing.clone();

            if missing.is_empty() {
                self.advance(IntakeEvent::AllFieldsCollected);
                self.finalize_ready(intent);
                return;
            }
            if self.context.follow_up_rounds >= MAX_FOLLOWUP_ROUNDS {
                self.advance(IntakeEvent::FollowUpExhausted);
                self.finalize_not_ready(intent, missing);
                return;
            }

            self.advance(IntakeEvent::MissingFields);
            self.context.follow_up_rounds += 1;

            for field in &missing {
                if self.record.memory.attempts_for(field) >= MAX_EMPTY_TRIES_PER_FIELD_IN_RUN {
                    self.record.log(format!("follow_up_skipped: {field}"));
                    continue;
                }
                let answer = self.ask(prompter, &question_for(intent, field));
                self.record_answer(intent, field, &answer, prompter);
                if self.stopped_as_not_a_fit() {
                    return;
                }
            }

            self.advance(IntakeEvent::FollowUpRoundCompleted);
        }
    }

    fn ask(&mut self, prompter: &mut dyn Prompter, question: &str) -> String {
        self.turns = self.turns.saturating_add(1);
        prompter.ask(question)
    }

    fn apply_answer(
        &mut self,
        intent: &Intent,
        field: &str,
        answer: &str,
        prompter: &mut dyn Prompter,
    ) {
        FieldApplier::new(self.pack, self.suggester.as_ref()).apply(
            intent,
            field,
            answer,
            &mut self.record,
            prompter,
        );
    }

    /// Applies a flow or follow-up answer and keeps the blank-answer counter.
    fn record_answer(
        &mut self,
        intent: &Intent,
        field: &str,
        answer: &str,
        prompter: &mut dyn Prompter,
    ) {
        if answer.trim().is_empty() {
            let attempts = self.record.memory.record_blank_attempt(field);
            debug!(
                event_name = "intake.field.blank",
                correlation_id = %self.record.result.request_id.0,
                session_id = self.record.result.session.session_id.as_str(),
                field,
                attempts,
                "blank answer"
            );
        } else {
            self.apply_answer(intent, field, answer, prompter);
            if !self.record.is_missing(field) {
                self.record.memory.clear_attempts(field);
            }
        }
        self.publish();
    }

    fn missing_required(&self, intent: &Intent) -> Vec<String> {
        required_fields(intent).into_iter().filter(|field| self.record.is_missing(field)).collect()
    }

    fn advance(&mut self, event: IntakeEvent) {
        match self.flow.apply(&self.phase, &event, &self.context) {
            Ok(outcome) => {
                debug!(
                    event_name = "intake.phase.changed",
                    correlation_id = %self.record.result.request_id.0,
                    from = outcome.from.as_str(),
                    to = outcome.to.as_str(),
                    actions = ?outcome.actions,
                    "phase changed"
                );
                self.phase = outcome.to;
            }
            Err(error) => {
                warn!(
                    event_name = "intake.phase.rejected",
                    correlation_id = %self.record.result.request_id.0,
                    phase = self.phase.as_str(),
                    error = %error,
                    "phase transition refused"
                );
            }
        }
    }

    fn publish(&self) {
        self.checkpoint.checkpoint(&self.export_state());
    }

    fn adopt_intent(&mut self, intent: &Intent) {
        let defaults = &self.pack.defaults;
        let request = &mut self.record.result.request;
        request.intent_id = intent.id.clone();
        if let Some(request_type) = non_blank(&intent.request_type, &defaults.request_type) {
            request.request_type = request_type;
        }
        if let Some(category) = non_blank(&intent.service_category, &defaults.service_category) {
            request.service_category = category;
        }
    }

    /// Finalizes as not-a-fit when the guardrail trips. Returns whether it did.
    fn stopped_as_not_a_fit(&mut self) -> bool {
        let FitDecision::NotAFit { reason_code, notes, routing_hint } =
            self.fit.evaluate(&self.record.result.request.details)
        else {
            return false;
        };

        self.advance(IntakeEvent::NotAFit);
        let budget = self.record.result.request.details.budget_range.clone();
        self.record.log(format!("not_a_fit: {reason_code} (budget_range='{budget}')"));

        let result = &mut self.record.result;
        result.readiness.status = ReadinessStatus::NotAFit;
        result.readiness.missing_fields.clear();
        result.readiness.notes = notes;
        result.handoff = Handoff {
            recommended_action: RecommendedAction::RouteHuman,
            next_questions: Vec::new(),
            routing_hint,
        };
        self.record.memory.missing_fields.clear();
        true
    }

    fn finalize_ready(&mut self, intent: &Intent) {
        let (recommended_action, routing_hint) = self.ready_handoff(intent);
        let result = &mut self.record.result;
        result.readiness.status = ReadinessStatus::Ready;
        result.readiness.missing_fields.clear();
        result.readiness.notes = READY_NOTES.to_string();
        result.handoff = Handoff { recommended_action, next_questions: Vec::new(), routing_hint };
        self.record.memory.missing_fields.clear();
        self.record.log("readiness: ready");
    }

    fn finalize_not_ready(&mut self, intent: &Intent, missing: Vec<String>) {
        let next_questions = missing.iter().map(|field| question_for(intent, field)).collect();
        self.record.log(format!("readiness: not_ready (missing: {})", missing.join(", ")));

        let result = &mut self.record.result;
        result.readiness.status = ReadinessStatus::NotReady;
        result.readiness.missing_fields = missing.clone();
        result.readiness.notes = NOT_READY_NOTES.to_string();
        result.handoff = Handoff {
            recommended_action: RecommendedAction::AskFollowUp,
            next_questions,
            routing_hint: DEFAULT_ROUTING_HINT.to_string(),
        };
        self.record.memory.missing_fields = missing;
    }

    fn finalize_informational(
        &mut self,
        intent: &Intent,
        opening: &str,
        prompter: &mut dyn Prompter,
    ) {
        self.advance(IntakeEvent::Informational);
        let reply = intent
            .informational_reply
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or(DEFAULT_INFORMATIONAL_REPLY);
        prompter.say(reply);

        let configured = intent.handoff.clone().unwrap_or_default();
        let recommended_action = configured
            .recommended_action
            .as_deref()
            .and_then(RecommendedAction::parse)
            .unwrap_or(RecommendedAction::Completed);
        let routing_hint = configured
            .routing_hint
            .filter(|hint| !hint.trim().is_empty())
            .unwrap_or_else(|| "informational".to_string());

        let result = &mut self.record.result;
        result.request.summary = format!("User asked a general question: {}", opening.trim());
        result.request.request_type = "general_question".to_string();
        result.request.service_category = "informational".to_string();
        result.readiness.status = ReadinessStatus::NotReady;
        result.readiness.missing_fields.clear();
        result.readiness.notes = INFORMATIONAL_NOTES.to_string();
        result.handoff = Handoff { recommended_action, next_questions: Vec::new(), routing_hint };
        self.record.memory.missing_fields.clear();
        self.record.log("informational: no intake required");
    }

    /// The intent's handoff when its action is final, else the pack default.
    fn ready_handoff(&self, intent: &Intent) -> (RecommendedAction, String) {
        let defaults = self.pack.defaults.handoff.as_ref();
        let default_hint = defaults
            .and_then(|handoff| handoff.routing_hint.clone())
            .filter(|hint| !hint.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ROUTING_HINT.to_string());

        for handoff in [intent.handoff.as_ref(), defaults].into_iter().flatten() {
            if let Some(action) = final_action(handoff) {
                let hint = handoff
                    .routing_hint
                    .clone()
                    .filter(|hint| !hint.trim().is_empty())
                    .unwrap_or_else(|| default_hint.clone());
                return (action, hint);
            }
        }

        (RecommendedAction::RouteHuman, default_hint)
    }
}

fn final_action(handoff: &HandoffSettings) -> Option<RecommendedAction> {
    handoff
        .recommended_action
        .as_deref()
        .and_then(RecommendedAction::parse)
        .filter(|action| {
            matches!(action, RecommendedAction::RouteHuman | RecommendedAction::Completed)
        })
}

fn non_blank(primary: &Option<String>, fallback: &Option<String>) -> Option<String> {
    primary
        .iter()
        .chain(fallback.iter())
        .find(|value| !value.trim().is_empty())
        .cloned()
}
