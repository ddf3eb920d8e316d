//! Intent selection and per-intent field helpers.

use std::borrow::Cow;

use crate::intents::{Intent, IntentPack, FALLBACK_INTENT_ID};
use crate::normalize::NormalizeKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionReason {
    RuleMatch,
    Always,
    NoMatch,
    NoIntents,
    Resumed,
}

impl SelectionReason {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::RuleMatch => "rule_match",
            Self::Always => "always",
            Self::NoMatch => "no_match",
            Self::NoIntents => "no_intents",
            Self::Resumed => "resumed",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IntentSelection<'a> {
    pub intent: Cow<'a, Intent>,
    pub reason: SelectionReason,
    pub score: u32,
}

impl IntentSelection<'_> {
    pub fn log_entry(&self) -> String {
        format!("intent_selected: {} ({})", self.intent.id, self.reason.tag())
    }
}

pub struct IntentRouter<'a> {
    pack: &'a IntentPack,
}

impl<'a> IntentRouter<'a> {
    pub fn new(pack: &'a IntentPack) -> Self {
        Self { pack }
    }

    /// Picks the best-scoring intent for the opening text.
    ///
    /// Highest `(score, priority)` wins; on a full tie the intent listed first
    /// wins. With no scoring intent the chain is `fallback_unknown`, then the
    /// highest-priority `always` intent, then a synthetic empty intent.
    pub fn select(&self, opening_text: &str) -> IntentSelection<'a> {
        let text = opening_text.trim().to_lowercase();

        let mut best: Option<(u32, i64, &'a Intent)> = None;
        for intent in &self.pack.intents {
            if intent.match_rule.always {
                continue;
            }
            let score = match_score(intent, &text);
            if score == 0 {
                continue;
            }
            let better = best.map_or(true, |(best_score, best_priority, _)| {
                (score, intent.priority) > (best_score, best_priority)
            });
            if better {
                best = Some((score, intent.priority, intent));
            }
        }

        if let Some((score, _, intent)) = best {
            return IntentSelection {
                intent: Cow::Borrowed(intent),
                reason: SelectionReason::RuleMatch,
                score,
            };
        }

        self.no_match_chain()
    }

    /// Looks `intent_id` up in the current pack; `None` when it is gone.
    pub fn resume(&self, intent_id: Option<&str>) -> Option<IntentSelection<'a>> {
        let intent = self.find_by_id(intent_id?)?;
        Some(IntentSelection {
            intent: Cow::Borrowed(intent),
            reason: SelectionReason::Resumed,
            score: 0,
        })
    }

    pub fn find_by_id(&self, intent_id: &str) -> Option<&'a Intent> {
        self.pack.intents.iter().find(|intent| intent.id == intent_id)
    }

    pub fn fallback(&self) -> IntentSelection<'a> {
        self.no_match_chain()
    }

    fn no_match_chain(&self) -> IntentSelection<'a> {
        if let Some(intent) = self.find_by_id(FALLBACK_INTENT_ID) {
            return IntentSelection {
                intent: Cow::Borrowed(intent),
                reason: SelectionReason::NoMatch,
                score: 0,
            };
        }

        let mut always: Option<&'a Intent> = None;
        for intent in self.pack.intents.iter().filter(|intent| intent.match_rule.always) {
            if always.map_or(true, |current| intent.priority > current.priority) {
                always = Some(intent);
            }
        }
        if let Some(intent) = always {
            return IntentSelection {
                intent: Cow::Borrowed(intent),
                reason: SelectionReason::Always,
                score: 0,
            };
        }

        IntentSelection {
            intent: Cow::Owned(Intent::synthetic_fallback()),
            reason: SelectionReason::NoIntents,
            score: 0,
        }
    }
}

/// +1 per keyword found in `text`, +2 per prefix `text` starts with.
pub fn match_score(intent: &Intent, lowered_text: &str) -> u32 {
    let rule = &intent.match_rule;
    let keywords = rule
        .keywords_any
        .iter()
        .map(|keyword| keyword.to_lowercase())
        .filter(|keyword| !keyword.is_empty() && lowered_text.contains(keyword.as_str()))
        .count();
    let prefixes = rule
        .starts_with_any
        .iter()
        .map(|prefix| prefix.to_lowercase())
        .filter(|prefix| !prefix.is_empty() && lowered_text.starts_with(prefix.as_str()))
        .count();

    u32::try_from(keywords + prefixes * 2).unwrap_or(u32::MAX)
}

pub fn question_for(intent: &Intent, field: &str) -> String {
    let configured = intent
        .flow
        .iter()
        .find(|step| step.field == field && !step.question.trim().is_empty());
    if let Some(step) = configured {
        return step.question.clone();
    }

    let neutral = match field {
        "issue_description" => "Tell me briefly what you need help with.",
        "service_type" => "What type of service is this?",
        "location" => "What is your location (city/country)?",
        "budget_range" => {
            "Do you have an estimated budget? (example: <50, 50-100, 100-300, 300-500, 500-1000, not sure)"
        }
        "timeline" => {
            "When do you want this addressed? (within_24h / within_1_week / within_2_weeks)"
        }
        "urgency" => "Is this urgent or flexible? (urgent/flexible)",
        _ => return format!("Please provide: {field}"),
    };
    neutral.to_string()
}

/// Explicit `required_fields` when non-empty, else required flow steps in order.
pub fn required_fields(intent: &Intent) -> Vec<String> {
    if let Some(explicit) = intent.required_fields.as_ref().filter(|fields| !fields.is_empty()) {
        return explicit.clone();
    }

    intent
        .flow
        .iter()
        .filter(|step| step.required && !step.field.trim().is_empty())
        .map(|step| step.field.clone())
        .collect()
}

/// Closed set for `field`; empty means unconstrained.
pub fn allowed_values(intent: &Intent, field: &str) -> Vec<String> {
    let from_step = intent
        .flow
        .iter()
        .find(|step| step.field == field && !step.allowed.is_empty())
        .map(|step| step.allowed.clone());
    if let Some(allowed) = from_step {
        return allowed;
    }

    intent.fields.get(field).map(|settings| settings.allowed.clone()).unwrap_or_default()
}

/// The step's configured kind, else the kind implied by the field name.
pub fn normalizer_for(intent: &Intent, field: &str) -> NormalizeKind {
    if let Some(step) = intent.flow.iter().find(|step| step.field == field) {
        return step.normalize;
    }

    match field {
        "urgency" => NormalizeKind::Urgency,
        "timeline" => NormalizeKind::Timeline,
        "budget_range" => NormalizeKind::Budget,
        "service_type" => NormalizeKind::ServiceType,
        _ => NormalizeKind::Text,
    }
}

pub fn opening_message(pack: &IntentPack, intent: &Intent) -> String {
    intent
        .opening_message
        .clone()
        .or_else(|| pack.defaults.opening_message.clone())
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            "I can help you create a service request. I'll ask a few quick questions.".to_string()
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        allowed_values, match_score, normalizer_for, question_for, required_fields, IntentRouter,
        SelectionReason,
    };
    use crate::intents::{IntentPack, FALLBACK_INTENT_ID};
    use crate::normalize::NormalizeKind;

    fn pack(value: serde_json::Value) -> IntentPack {
        IntentPack::from_value(value).expect("valid pack")
    }

    fn always_and_keyword_pack() -> IntentPack {
        pack(json!({
            "intents": [
                {"id": "pre_quote_request", "priority": 100, "match": {"always": true}},
                {"id": "pricing_question", "priority": 1,
                 "match": {"keywords_any": ["price", "cost"]}}
            ]
        }))
    }

    #[test]
    fn keyword_intent_beats_higher_priority_always_intent() {
        let pack = always_and_keyword_pack();
        let selection = IntentRouter::new(&pack).select("What does a repair COST?");

        assert_eq!(selection.intent.id, "pricing_question");
        assert_eq!(selection.reason, SelectionReason::RuleMatch);
        assert_eq!(selection.log_entry(), "intent_selected: pricing_question (rule_match)");
    }

    #[test]
    fn always_intent_is_used_when_nothing_scores() {
        let pack = always_and_keyword_pack();
        let selection = IntentRouter::new(&pack).select("My laptop will not boot");

        assert_eq!(selection.intent.id, "pre_quote_request");
        assert_eq!(selection.log_entry(), "intent_selected: pre_quote_request (always)");
    }

    #[test]
    fn prefix_matches_outweigh_keywords_and_score_beats_priority() {
        let pack = pack(json!({
            "intents": [
                {"id": "keywords", "priority": 50,
                 "match": {"keywords_any": ["install", "printer"]}},
                {"id": "prefix", "priority": 1,
                 "match": {"starts_with_any": ["install"], "keywords_any": ["printer"]}}
            ]
        }));
        let selection = IntentRouter::new(&pack).select("  Install a printer");

        assert_eq!(selection.intent.id, "prefix");
        assert_eq!(selection.score, 3);
    }

    #[test]
    fn priority_breaks_score_ties_then_order() {
        let pack = pack(json!({
            "intents": [
                {"id": "first", "priority": 1, "match": {"keywords_any": ["leak"]}},
                {"id": "second", "priority": 5, "match": {"keywords_any": ["leak"]}},
                {"id": "third", "priority": 5, "match": {"keywords_any": ["leak"]}}
            ]
        }));
        assert_eq!(IntentRouter::new(&pack).select("a leak").intent.id, "second");
    }

    #[test]
    fn configured_fallback_wins_over_always_intent() {
        let pack = pack(json!({
            "intents": [
                {"id": "catch_all", "match": {"always": true}},
                {"id": FALLBACK_INTENT_ID, "flow": []}
            ]
        }));
        let selection = IntentRouter::new(&pack).select("hello");

        assert_eq!(selection.intent.id, FALLBACK_INTENT_ID);
        assert_eq!(selection.reason, SelectionReason::NoMatch);
    }

    #[test]
    fn empty_pack_yields_synthetic_fallback() {
        let pack = pack(json!({"intents": []}));
        let selection = IntentRouter::new(&pack).select("hello");

        assert_eq!(selection.intent.id, FALLBACK_INTENT_ID);
        assert!(selection.intent.flow.is_empty());
        assert_eq!(selection.log_entry(), "intent_selected: fallback_unknown (no_intents)");
    }

    #[test]
    fn resume_looks_up_the_current_pack() {
        let pack = always_and_keyword_pack();
        let router = IntentRouter::new(&pack);

        let resumed = router.resume(Some("pricing_question")).expect("intent still present");
        assert_eq!(resumed.reason, SelectionReason::Resumed);
        assert!(router.resume(Some("retired_intent")).is_none());
        assert!(router.resume(None).is_none());
    }

    #[test]
    fn field_helpers_read_flow_then_fall_back() {
        let pack = pack(json!({
            "intents": [{
                "id": "intake",
                "match": {"always": true},
                "flow": [
                    {"field": "service_type", "question": "Which service?", "required": true,
                     "normalize": "service_type", "allowed": ["repair", "installation"]},
                    {"field": "location", "question": "", "required": true},
                    {"field": "urgency", "question": "Urgent?", "normalize": "urgency"},
                    {"field": "", "required": true}
                ],
                "fields": {"device": {"allowed": ["laptop"]}}
            }]
        }));
        let intent = pack.intent("intake").expect("intent");

        assert_eq!(question_for(intent, "service_type"), "Which service?");
        assert_eq!(question_for(intent, "location"), "What is your location (city/country)?");
        assert_eq!(question_for(intent, "tax_year"), "Please provide: tax_year");
        assert_eq!(required_fields(intent), vec!["service_type", "location"]);
        assert_eq!(allowed_values(intent, "service_type"), vec!["repair", "installation"]);
        assert_eq!(allowed_values(intent, "device"), vec!["laptop"]);
        assert!(allowed_values(intent, "location").is_empty());
        assert_eq!(normalizer_for(intent, "urgency"), NormalizeKind::Urgency);
        assert_eq!(normalizer_for(intent, "budget_range"), NormalizeKind::Budget);
        assert_eq!(normalizer_for(intent, "location"), NormalizeKind::Text);
    }

    #[test]
    fn explicit_required_fields_override_the_flow() {
        let pack = pack(json!({
            "intents": [{
                "id": "intake",
                "match": {"always": true},
                "required_fields": ["issue_description", "location"],
                "flow": [{"field": "service_type", "required": true}]
            }]
        }));
        let intent = pack.intent("intake").expect("intent");
        assert_eq!(required_fields(intent), vec!["issue_description", "location"]);
        assert_eq!(match_score(intent, "anything"), 0);
    }
}
