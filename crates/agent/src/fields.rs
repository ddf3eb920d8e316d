//! Field application engine
//!
//! Applies one raw answer to the result record. Each field name is routed to
//! its normalizer, then through the keep-earliest resolver, and every accepted
//! value is mirrored into session memory so a later run can hydrate from it.
//! Location and service-type answers may be corrected by a
//! [`CorrectionSuggester`] when the user confirms the suggestion.

use std::collections::BTreeMap;

use intake_core::consistency::{resolve, Comparison};
use intake_core::intents::{Intent, IntentPack};
use intake_core::normalize::{
    is_provided, is_valid_service_type, match_synonym, normalize, normalize_constraints,
    NormalizeKind, NOT_PROVIDED,
};
use intake_core::routing::{allowed_values, normalizer_for};
use intake_core::{CoreField, ExtraValue, IntakeResult, SessionMemory};
use serde_json::Value;
use tracing::debug;

use crate::correction::CorrectionSuggester;
use crate::prompt::{Confirmation, Prompter};

pub const LOCATION_CORRECTION: &str = "location_correction";
pub const SERVICE_TYPE_CORRECTION: &str = "service_type_correction";

/// The result under construction and the memory exported alongside it.
#[derive(Clone, Debug)]
pub struct IntakeRecord {
    pub result: IntakeResult,
    pub memory: SessionMemory,
}

impl IntakeRecord {
    pub fn new(result: IntakeResult, memory: SessionMemory) -> Self {
        Self { result, memory }
    }

    /// Appends to the decision log and mirrors the entry to tracing.
    pub fn log(&mut self, entry: impl Into<String>) {
        let entry = entry.into();
        debug!(
            event_name = "intake.decision",
            correlation_id = %self.result.request_id.0,
            session_id = self.result.session.session_id.as_str(),
            entry = %entry,
            "decision recorded"
        );
        self.result.request.decision_log.push(entry);
    }

    pub fn is_missing(&self, field: &str) -> bool {
        self.result.request.details.is_missing(field)
    }

    fn rewrite_summary(&mut self, intent: &Intent, service_type: &str) {
        let label = intent.label.as_deref().filter(|label| !label.trim().is_empty());
        self.result.request.summary =
            format!("{}: {service_type}", label.unwrap_or("Service request"));
    }
}

pub struct FieldApplier<'a> {
    pack: &'a IntentPack,
    suggester: &'a dyn CorrectionSuggester,
}

impl<'a> FieldApplier<'a> {
    pub fn new(pack: &'a IntentPack, suggester: &'a dyn CorrectionSuggester) -> Self {
        Self { pack, suggester }
    }

    /// Applies one answer. Blank answers change nothing.
    pub fn apply(
        &self,
        intent: &Intent,
        field: &str,
        raw: &str,
        record: &mut IntakeRecord,
        prompter: &mut dyn Prompter,
    ) {
        let raw = raw.trim();
        if raw.is_empty() {
            return;
        }

        match CoreField::parse(field) {
            Some(CoreField::Constraints) => self.append_constraint(raw, "user_set", record),
            Some(CoreField::IssueDescription) => {
                let value = normalize(NormalizeKind::Text, raw, &self.pack.normalizers);
                record.result.request.details.issue_description = value.clone();
                record.memory.remember(field, Value::String(value.clone()));
                record.log(format!("user_set: issue_description='{value}'"));
            }
            Some(CoreField::Location) => {
                let candidate = self.confirm_location(raw, record, prompter);
                let value = normalize(NormalizeKind::Text, &candidate, &self.pack.normalizers);
                commit(CoreField::Location, &value, Comparison::CaseInsensitive, record);
            }
            Some(CoreField::ServiceType) => self.apply_service_type(intent, raw, record, prompter),
            Some(core @ (CoreField::Urgency | CoreField::Timeline | CoreField::BudgetRange)) => {
                let kind = enumerated_kind(core);
                let value = normalize(kind, raw, &self.pack.normalizers);
                if is_provided(&value) {
                    commit(core, &value, Comparison::Exact, record);
                }
            }
            None => self.apply_extra(intent, field, raw, record),
        }
    }

    /// Writes extracted candidates without conflict checks.
    pub fn apply_prefill(
        &self,
        intent: &Intent,
        candidates: &BTreeMap<String, String>,
        record: &mut IntakeRecord,
    ) {
        let mut applied_any = false;

        for (field, raw) in candidates {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }

            let value = match CoreField::parse(field) {
                Some(CoreField::Constraints) => {
                    let before = record.result.request.details.constraints.len();
                    self.append_constraint(raw, "prefill", record);
                    applied_any |= record.result.request.details.constraints.len() > before;
                    continue;
                }
                Some(core @ (CoreField::Urgency | CoreField::Timeline | CoreField::BudgetRange)) => {
                    normalize(enumerated_kind(core), raw, &self.pack.normalizers)
                }
                Some(CoreField::ServiceType) => match self.prefill_service_type(intent, raw) {
                    Some(value) => value,
                    None => continue,
                },
                Some(CoreField::IssueDescription | CoreField::Location) => {
                    normalize(NormalizeKind::Text, raw, &self.pack.normalizers)
                }
                None => normalize(normalizer_for(intent, field), raw, &self.pack.normalizers),
            };
            if !is_provided(&value) {
                continue;
            }

            match CoreField::parse(field) {
                Some(core) => {
                    if let Some(slot) = record.result.request.details.slot_mut(core) {
                        *slot = value.clone();
                    }
                }
                None => {
                    record
                        .result
                        .request
                        .details
                        .extra_fields
                        .insert(field.clone(), ExtraValue::Text(value.clone()));
                }
            }
            if field == CoreField::ServiceType.name() {
                record.rewrite_summary(intent, &value);
            }
            record.memory.remember(field, Value::String(value.clone()));
            record.log(format!("prefill: {field}='{value}'"));
            applied_any = true;
        }

        if applied_any {
            record.result.request.sources.prefill = true;
        }
    }

    /// Restores details from `memory.collected` when resuming.
    pub fn hydrate(&self, intent: &Intent, record: &mut IntakeRecord) {
        let collected = record.memory.collected.clone();
        let details = &mut record.result.request.details;

        for (field, value) in &collected {
            match (CoreField::parse(field), value) {
                (Some(CoreField::Constraints), Value::Array(items)) => {
                    details.constraints = strings(items);
                }
                (Some(CoreField::Constraints), Value::String(text)) if is_provided(text) => {
                    details.constraints = vec![text.clone()];
                }
                (Some(core), Value::String(text)) if is_provided(text) => {
                    if let Some(slot) = details.slot_mut(core) {
                        *slot = text.clone();
                    }
                }
                (None, Value::Array(items)) => {
                    details.extra_fields.insert(field.clone(), ExtraValue::List(strings(items)));
                }
                (None, Value::String(text)) => {
                    details.extra_fields.insert(field.clone(), ExtraValue::Text(text.clone()));
                }
                _ => {}
            }
        }

        let service_type = details.service_type.clone();
        if is_provided(&service_type) {
            record.rewrite_summary(intent, &service_type);
        }
    }

    fn append_constraint(&self, raw: &str, source: &str, record: &mut IntakeRecord) {
        let value = normalize_constraints(raw, &self.pack.normalizers);
        if value.is_empty() {
            return;
        }

        let constraints = &mut record.result.request.details.constraints;
        constraints.push(value.clone());
        let mirrored = Value::from(constraints.clone());
        record.memory.remember(CoreField::Constraints.name(), mirrored);
        record.log(format!("{source}: constraints += '{value}'"));
    }

    fn confirm_location(
        &self,
        raw: &str,
        record: &mut IntakeRecord,
        prompter: &mut dyn Prompter,
    ) -> String {
        if !self.suggester.is_enabled() {
            return raw.to_string();
        }

        record.result.audit.tool_calls.push("suggest_location_correction".to_string());
        let Some(suggestion) = self.suggester.suggest_location(raw) else {
            return raw.to_string();
        };
        if suggestion.trim().to_lowercase() == raw.to_lowercase() {
            return raw.to_string();
        }

        if ask_to_confirm(prompter, &suggestion) {
            record.result.request.sources.record_llm_use(LOCATION_CORRECTION);
            record.log(format!("llm_suggestion_accepted: location='{suggestion}'"));
            suggestion
        } else {
            record.log(format!("llm_suggestion_rejected: location='{suggestion}'"));
            raw.to_string()
        }
    }

    fn apply_service_type(
        &self,
        intent: &Intent,
        raw: &str,
        record: &mut IntakeRecord,
        prompter: &mut dyn Prompter,
    ) {
        let value = self.canonical_service_type(raw);
        if !is_provided(&value) {
            return;
        }

        let allowed = allowed_values(intent, CoreField::ServiceType.name());
        let accepted = if allowed.is_empty() {
            if is_valid_service_type(&value) {
                value
            } else {
                raw.to_string()
            }
        } else if let Some(member) = allowed.iter().find(|member| member.eq_ignore_ascii_case(&value))
        {
            member.clone()
        } else {
            match self.confirm_service_type(&value, &allowed, record, prompter) {
                Some(suggestion) => suggestion,
                None => {
                    record.log(format!("service_type_not_allowed: '{value}'"));
                    return;
                }
            }
        };

        if commit(CoreField::ServiceType, &accepted, Comparison::CaseInsensitive, record) {
            record.rewrite_summary(intent, &accepted);
        }
    }

    fn confirm_service_type(
        &self,
        value: &str,
        allowed: &[String],
        record: &mut IntakeRecord,
        prompter: &mut dyn Prompter,
    ) -> Option<String> {
        if !self.suggester.is_enabled() {
            return None;
        }

        record.result.audit.tool_calls.push("suggest_service_type_correction".to_string());
        let suggestion = self.suggester.suggest_service_type(value, allowed)?;

        if ask_to_confirm(prompter, &suggestion) {
            record.result.request.sources.record_llm_use(SERVICE_TYPE_CORRECTION);
            record.log(format!("llm_suggestion_accepted: service_type='{suggestion}'"));
            Some(suggestion)
        } else {
            record.log(format!("llm_suggestion_rejected: service_type='{suggestion}'"));
            None
        }
    }

    /// Prefill never prompts, so values outside the allowed set are dropped.
    fn prefill_service_type(&self, intent: &Intent, raw: &str) -> Option<String> {
        let value = self.canonical_service_type(raw);
        if !is_provided(&value) {
            return None;
        }

        let allowed = allowed_values(intent, CoreField::ServiceType.name());
        if allowed.is_empty() {
            return is_valid_service_type(&value).then_some(value);
        }
        let member = allowed.iter().find(|member| member.eq_ignore_ascii_case(&value)).cloned();
        if member.is_none() {
            debug!(
                event_name = "intake.prefill.dropped",
                intent_id = intent.id.as_str(),
                field = "service_type",
                value = %value,
                "prefill value outside the allowed set"
            );
        }
        member
    }

    /// Permissive normalization plus an exact synonym lookup.
    fn canonical_service_type(&self, raw: &str) -> String {
        let value = normalize(NormalizeKind::ServiceType, raw, &self.pack.normalizers);
        match_synonym(&self.pack.normalizers.service_type, &value.to_lowercase()).unwrap_or(value)
    }

    fn apply_extra(&self, intent: &Intent, field: &str, raw: &str, record: &mut IntakeRecord) {
        let kind = normalizer_for(intent, field);
        let value = normalize(kind, raw, &self.pack.normalizers);
        if !is_provided(&value) {
            return;
        }

        let extras = &mut record.result.request.details.extra_fields;
        if let Some(ExtraValue::List(items)) = extras.get_mut(field) {
            items.push(value.clone());
            let mirrored = Value::from(items.clone());
            record.memory.remember(field, mirrored);
            record.log(format!("user_set: {field} += '{value}'"));
            return;
        }

        let current = match extras.get(field) {
            Some(ExtraValue::Text(text)) => text.clone(),
            _ => NOT_PROVIDED.to_string(),
        };
        let resolution = resolve(
            field,
            &current,
            &value,
            Comparison::for_kind(kind),
            &mut record.result.readiness.inconsistencies,
        );
        if resolution.applied {
            extras.insert(field.to_string(), ExtraValue::Text(value.clone()));
            record.memory.remember(field, Value::String(value.clone()));
            record.log(format!("user_set: {field}='{value}'"));
        }
    }
}

/// Runs `value` through the resolver for a string slot. Returns whether it was written.
fn commit(field: CoreField, value: &str, comparison: Comparison, record: &mut IntakeRecord) -> bool {
    if !is_provided(value) {
        return false;
    }

    let name = field.name();
    let details = &mut record.result.request.details;
    let Some(slot) = details.slot_mut(field) else {
        return false;
    };
    let resolution =
        resolve(name, slot, value, comparison, &mut record.result.readiness.inconsistencies);
    if !resolution.applied {
        return false;
    }

    *slot = value.to_string();
    record.memory.remember(name, Value::String(value.to_string()));
    record.log(format!("user_set: {name}='{value}'"));
    true
}

fn enumerated_kind(field: CoreField) -> NormalizeKind {
    match field {
        CoreField::Urgency => NormalizeKind::Urgency,
        CoreField::Timeline => NormalizeKind::Timeline,
        CoreField::BudgetRange => NormalizeKind::Budget,
        _ => NormalizeKind::Text,
    }
}

fn ask_to_confirm(prompter: &mut dyn Prompter, suggestion: &str) -> bool {
    let answer = prompter.ask(&format!("I think you meant \"{suggestion}\". Use that? (y/n)"));
    Confirmation::parse(&answer).is_yes()
}

fn strings(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(text.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use intake_core::intents::{Intent, IntentPack};
    use intake_core::{
        ExtraValue, IntakeResult, RequestId, SessionId, SessionMemory, NOT_PROVIDED,
    };
    use serde_json::json;

    use super::{FieldApplier, IntakeRecord, LOCATION_CORRECTION};
    use crate::correction::{DisabledSuggester, StaticSuggester};
    use crate::prompt::ScriptedPrompter;

    fn pack() -> IntentPack {
        IntentPack::from_value(json!({
            "intents": [{
                "id": "pre_quote_request",
                "label": "Pre-quote request",
                "match": {"always": true},
                "flow": [
                    {"field": "service_type", "question": "Which service?", "required": true,
                     "normalize": "service_type", "allowed": ["repair", "installation"]},
                    {"field": "device_count", "question": "How many?", "normalize": "text"}
                ]
            }],
            "normalizers": {
                "urgency": {"urgent": ["urgent", "asap"], "flexible": ["flexible"]},
                "budget": {"free": ["free", "no budget"]},
                "service_type": {"repair": ["fix", "repar"]},
                "constraints_ignore": ["none", "n/a"]
            }
        }))
        .expect("valid pack")
    }

    fn record() -> IntakeRecord {
        IntakeRecord::new(
            IntakeResult::new(RequestId("req_test".to_string()), SessionId("sess".to_string())),
            SessionMemory::default(),
        )
    }

    fn intent(pack: &IntentPack) -> Intent {
        pack.intent("pre_quote_request").cloned().expect("intent")
    }

    #[test]
    fn blank_answers_leave_the_record_untouched() {
        let pack = pack();
        let intent = intent(&pack);
        let applier = FieldApplier::new(&pack, &DisabledSuggester);
        let mut record = record();
        let mut prompter = ScriptedPrompter::default();
        applier.apply(&intent, "urgency", "asap", &mut record, &mut prompter);
        let before = record.result.clone();

        for field in ["urgency", "location", "constraints", "service_type", "device_count"] {
            applier.apply(&intent, field, "   ", &mut record, &mut prompter);
        }

        assert_eq!(record.result, before);
        assert!(prompter.asked.is_empty());
    }

    #[test]
    fn earliest_answer_wins_and_conflict_is_recorded_once() {
        let pack = pack();
        let intent = intent(&pack);
        let applier = FieldApplier::new(&pack, &DisabledSuggester);
        let mut record = record();
        let mut prompter = ScriptedPrompter::default();

        applier.apply(&intent, "urgency", "urgent", &mut record, &mut prompter);
        applier.apply(&intent, "urgency", "urgent", &mut record, &mut prompter);
        assert!(record.result.readiness.inconsistencies.is_empty());

        applier.apply(&intent, "urgency", "flexible", &mut record, &mut prompter);
        assert_eq!(record.result.request.details.urgency, "urgent");
        assert_eq!(
            record.result.readiness.inconsistencies,
            vec!["urgency_conflict: kept 'urgent', ignored 'flexible'".to_string()]
        );
    }

    #[test]
    fn unrecognized_enumerated_answers_are_dropped_silently() {
        let pack = pack();
        let intent = intent(&pack);
        let applier = FieldApplier::new(&pack, &DisabledSuggester);
        let mut record = record();
        let mut prompter = ScriptedPrompter::default();

        applier.apply(&intent, "budget_range", "not sure", &mut record, &mut prompter);
        applier.apply(&intent, "timeline", "someday", &mut record, &mut prompter);

        assert_eq!(record.result.request.details.budget_range, NOT_PROVIDED);
        assert_eq!(record.result.request.details.timeline, NOT_PROVIDED);
        assert!(record.result.request.decision_log.is_empty());
    }

    #[test]
    fn constraints_append_and_skip_negatives() {
        let pack = pack();
        let intent = intent(&pack);
        let applier = FieldApplier::new(&pack, &DisabledSuggester);
        let mut record = record();
        let mut prompter = ScriptedPrompter::default();

        for answer in ["open until 6pm", "no", "N/A", "parking on site"] {
            applier.apply(&intent, "constraints", answer, &mut record, &mut prompter);
        }

        assert_eq!(
            record.result.request.details.constraints,
            vec!["open until 6pm".to_string(), "parking on site".to_string()]
        );
        assert_eq!(record.memory.collected["constraints"], json!(["open until 6pm", "parking on site"]));
        assert_eq!(
            record.result.request.decision_log.last().map(String::as_str),
            Some("user_set: constraints += 'parking on site'")
        );
    }

    #[test]
    fn accepted_location_correction_is_recorded_once() {
        let pack = pack();
        let intent = intent(&pack);
        let suggester =
            StaticSuggester { location: Some("Toronto".to_string()), service_type: None };
        let applier = FieldApplier::new(&pack, &suggester);
        let mut record = record();
        let mut prompter = ScriptedPrompter::new(["yes", "y"]);

        applier.apply(&intent, "location", "toronot", &mut record, &mut prompter);
        applier.apply(&intent, "location", "torono", &mut record, &mut prompter);

        assert_eq!(record.result.request.details.location, "Toronto");
        assert_eq!(record.result.request.sources.llm_used, vec![LOCATION_CORRECTION.to_string()]);
        assert!(record.result.readiness.inconsistencies.is_empty());
        assert_eq!(record.result.audit.tool_calls.len(), 2);
        assert_eq!(prompter.asked[0], "I think you meant \"Toronto\". Use that? (y/n)");
    }

    #[test]
    fn rejected_location_correction_keeps_raw_text() {
        let pack = pack();
        let intent = intent(&pack);
        let suggester =
            StaticSuggester { location: Some("Toronto".to_string()), service_type: None };
        let applier = FieldApplier::new(&pack, &suggester);
        let mut record = record();
        let mut prompter = ScriptedPrompter::new(["maybe"]);

        applier.apply(&intent, "location", "Toronot ON", &mut record, &mut prompter);

        assert_eq!(record.result.request.details.location, "Toronot ON");
        assert!(record.result.request.sources.llm_used.is_empty());
        assert!(record
            .result
            .request
            .decision_log
            .contains(&"llm_suggestion_rejected: location='Toronto'".to_string()));
    }

    #[test]
    fn service_type_synonym_maps_into_the_allowed_set() {
        let pack = pack();
        let intent = intent(&pack);
        let applier = FieldApplier::new(&pack, &DisabledSuggester);
        let mut record = record();
        let mut prompter = ScriptedPrompter::default();

        applier.apply(&intent, "service_type", "Fix", &mut record, &mut prompter);

        assert_eq!(record.result.request.details.service_type, "repair");
        assert_eq!(record.result.request.summary, "Pre-quote request: repair");
    }

    #[test]
    fn service_type_outside_allowed_set_needs_an_accepted_suggestion() {
        let pack = pack();
        let intent = intent(&pack);
        let suggester =
            StaticSuggester { location: None, service_type: Some("installation".to_string()) };
        let applier = FieldApplier::new(&pack, &suggester);

        let mut rejected = record();
        let mut prompter = ScriptedPrompter::new(["no"]);
        applier.apply(&intent, "service_type", "mounting", &mut rejected, &mut prompter);
        assert_eq!(rejected.result.request.details.service_type, NOT_PROVIDED);
        assert_eq!(rejected.result.request.summary, "Service request");

        let mut accepted = record();
        let mut prompter = ScriptedPrompter::new(["yes"]);
        applier.apply(&intent, "service_type", "mounting", &mut accepted, &mut prompter);
        assert_eq!(accepted.result.request.details.service_type, "installation");
        assert_eq!(accepted.result.request.summary, "Pre-quote request: installation");
        assert_eq!(accepted.result.request.sources.llm_used, vec!["service_type_correction"]);
    }

    #[test]
    fn unconstrained_service_type_falls_back_to_raw_text() {
        let pack = IntentPack::from_value(json!({
            "intents": [{"id": "open", "match": {"always": true}}]
        }))
        .expect("valid pack");
        let intent = pack.intent("open").cloned().expect("intent");
        let applier = FieldApplier::new(&pack, &DisabledSuggester);
        let mut record = record();
        let mut prompter = ScriptedPrompter::default();

        applier.apply(&intent, "service_type", "ok", &mut record, &mut prompter);

        assert_eq!(record.result.request.details.service_type, "ok");
    }

    #[test]
    fn prefill_writes_without_conflict_checks() {
        let pack = pack();
        let intent = intent(&pack);
        let applier = FieldApplier::new(&pack, &DisabledSuggester);
        let mut record = record();
        let candidates = BTreeMap::from([
            ("location".to_string(), "Toronto".to_string()),
            ("budget_range".to_string(), "800".to_string()),
            ("urgency".to_string(), "maybe later".to_string()),
        ]);

        applier.apply_prefill(&intent, &candidates, &mut record);

        let details = &record.result.request.details;
        assert_eq!(details.location, "Toronto");
        assert_eq!(details.budget_range, "500-1000");
        assert_eq!(details.urgency, NOT_PROVIDED);
        assert!(record.result.request.sources.prefill);
        assert!(record.result.request.decision_log.contains(&"prefill: location='Toronto'".to_string()));
    }

    #[test]
    fn prefill_keeps_only_allowed_service_types() {
        let pack = pack();
        let intent = intent(&pack);
        let applier = FieldApplier::new(&pack, &DisabledSuggester);
        let mut prompter = ScriptedPrompter::default();

        let mut outside = record();
        let candidates = BTreeMap::from([("service_type".to_string(), "plumbing".to_string())]);
        applier.apply_prefill(&intent, &candidates, &mut outside);
        assert_eq!(outside.result.request.details.service_type, NOT_PROVIDED);
        assert!(!outside.result.request.sources.prefill);
        assert!(!outside.memory.collected.contains_key("service_type"));

        applier.apply(&intent, "service_type", "repair", &mut outside, &mut prompter);
        assert_eq!(outside.result.request.details.service_type, "repair");
        assert!(outside.result.readiness.inconsistencies.is_empty());
        assert!(prompter.asked.is_empty());

        let mut synonym = record();
        let candidates = BTreeMap::from([("service_type".to_string(), "Fix".to_string())]);
        applier.apply_prefill(&intent, &candidates, &mut synonym);
        assert_eq!(synonym.result.request.details.service_type, "repair");
        assert_eq!(synonym.result.request.summary, "Pre-quote request: repair");
    }

    #[test]
    fn extra_fields_resolve_text_and_append_lists() {
        let pack = pack();
        let intent = intent(&pack);
        let applier = FieldApplier::new(&pack, &DisabledSuggester);
        let mut record = record();
        let mut prompter = ScriptedPrompter::default();
        record
            .result
            .request
            .details
            .extra_fields
            .insert("photos".to_string(), ExtraValue::List(vec!["front.jpg".to_string()]));

        applier.apply(&intent, "device_count", "Three", &mut record, &mut prompter);
        applier.apply(&intent, "device_count", "three", &mut record, &mut prompter);
        applier.apply(&intent, "device_count", "four", &mut record, &mut prompter);
        applier.apply(&intent, "photos", "back.jpg", &mut record, &mut prompter);

        let extras = &record.result.request.details.extra_fields;
        assert_eq!(extras["device_count"], ExtraValue::Text("Three".to_string()));
        assert_eq!(
            extras["photos"],
            ExtraValue::List(vec!["front.jpg".to_string(), "back.jpg".to_string()])
        );
        assert_eq!(record.result.readiness.inconsistencies.len(), 1);
    }

    #[test]
    fn hydration_restores_collected_answers() {
        let pack = pack();
        let intent = intent(&pack);
        let applier = FieldApplier::new(&pack, &DisabledSuggester);
        let mut record = record();
        record.memory.remember("service_type", json!("repair"));
        record.memory.remember("constraints", json!(["weekends only"]));
        record.memory.remember("photos", json!(["front.jpg"]));

        applier.hydrate(&intent, &mut record);

        let details = &record.result.request.details;
        assert_eq!(details.service_type, "repair");
        assert_eq!(details.constraints, vec!["weekends only".to_string()]);
        assert!(!details.is_missing("photos"));
        assert_eq!(record.result.request.summary, "Pre-quote request: repair");
    }
}
