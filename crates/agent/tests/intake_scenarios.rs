use std::path::PathBuf;

use intake_agent::{IntakeAgent, NoPrefill, ScriptedPrompter, StaticSuggester};
use intake_core::{
    IntakeResult, IntentPack, ReadinessStatus, RecommendedAction, RequestId, SessionId,
    SessionMemory, NOT_PROVIDED,
};
use serde_json::json;

fn shipped_pack() -> IntentPack {
    let path =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../configs/intents_generic.json");
    IntentPack::load(&path).expect("shipped intent pack loads")
}

fn agent(pack: &IntentPack, memory: Option<SessionMemory>) -> IntakeAgent<'_> {
    IntakeAgent::new(
        pack,
        RequestId("req_scenario".to_string()),
        SessionId("sess_scenario".to_string()),
        memory,
    )
}

fn run(pack: &IntentPack, answers: &[&str]) -> (IntakeResult, ScriptedPrompter) {
    let mut prompter = ScriptedPrompter::new(answers.iter().copied());
    let result = agent(pack, None).run(&mut prompter);
    (result, prompter)
}

fn logged(result: &IntakeResult, entry: &str) -> bool {
    result.request.decision_log.iter().any(|line| line == entry)
}

#[test]
fn rich_opening_message_completes_the_request() {
    let pack = shipped_pack();
    let (result, prompter) = run(
        &pack,
        &[
            "Need help with a laptop in Toronto next week, budget $800.",
            "repair",
            "urgent",
            "Toronto",
            "800",
            "no",
        ],
    );

    let details = &result.request.details;
    assert_eq!(details.service_type, "repair");
    assert_eq!(details.urgency, "urgent");
    assert_eq!(details.location, "Toronto");
    assert_eq!(details.timeline, "within_1_week");
    assert_eq!(details.budget_range, "500-1000");
    assert!(details.constraints.is_empty());
    assert_eq!(result.readiness.status, ReadinessStatus::Ready);
    assert!(result.readiness.inconsistencies.is_empty());
    assert_eq!(result.handoff.recommended_action, RecommendedAction::RouteHuman);
    assert!(result.request.sources.prefill);
    assert_eq!(result.request.summary, "Pre-quote request: repair");
    assert!(logged(&result, "intent_selected: pre_quote_request (always)"));
    assert!(logged(&result, "prefill: location='Toronto'"));
    assert_eq!(prompter.said.first().map(String::as_str), Some("Hi! I'm the intake assistant."));
    assert_eq!(prompter.remaining(), 0);
}

#[test]
fn repeated_blank_location_ends_not_ready() {
    let pack = IntentPack::from_value(json!({
        "intents": [{
            "id": "pre_quote_request",
            "match": {"always": true},
            "flow": [
                {"field": "issue_description", "question": "What do you need?", "required": true},
                {"field": "location", "question": "Where are you?", "required": true}
            ]
        }]
    }))
    .expect("valid pack");

    let (result, prompter) = run(&pack, &["Need repair next week.", "", ""]);

    assert_eq!(result.readiness.status, ReadinessStatus::NotReady);
    assert_eq!(result.readiness.missing_fields, vec!["location".to_string()]);
    assert_eq!(result.handoff.recommended_action, RecommendedAction::AskFollowUp);
    assert_eq!(result.handoff.next_questions, vec!["Where are you?".to_string()]);
    assert_eq!(result.request.details.timeline, "within_1_week");
    assert!(logged(&result, "follow_up_skipped: location"));
    assert_eq!(prompter.asked.len(), 3);
}

#[test]
fn blank_answers_everywhere_still_terminate() {
    let pack = shipped_pack();
    let (result, prompter) = run(&pack, &[]);

    assert_eq!(result.readiness.status, ReadinessStatus::NotReady);
    assert_eq!(
        result.readiness.missing_fields,
        vec!["issue_description".to_string(), "service_type".to_string(), "location".to_string()]
    );
    assert_eq!(result.handoff.next_questions.len(), 3);
    // 1 opening + 5 flow steps + 3 in round one + 1 in round two
    assert_eq!(prompter.asked.len(), 10);
}

#[test]
fn later_answer_never_overwrites_an_earlier_one() {
    let pack = shipped_pack();
    let (result, _) = run(
        &pack,
        &["Fix my sink in Toronto", "repair", "", "Montreal", "", "no"],
    );

    assert_eq!(result.request.details.location, "Toronto");
    assert_eq!(
        result.readiness.inconsistencies,
        vec!["location_conflict: kept 'Toronto', ignored 'Montreal'".to_string()]
    );
    assert_eq!(result.readiness.status, ReadinessStatus::Ready);
}

#[test]
fn informational_intent_answers_without_an_intake() {
    let pack = shipped_pack();
    let (result, prompter) = run(&pack, &["What are your opening hours?"]);

    assert_eq!(result.request.intent_id, "general_question");
    assert_eq!(result.request.request_type, "general_question");
    assert_eq!(result.request.service_category, "informational");
    assert_eq!(
        result.request.summary,
        "User asked a general question: What are your opening hours?"
    );
    assert_eq!(result.readiness.status, ReadinessStatus::NotReady);
    assert_eq!(result.readiness.notes, "Informational request (not an intake).");
    assert_eq!(result.handoff.recommended_action, RecommendedAction::Completed);
    assert_eq!(result.handoff.routing_hint, "informational");
    assert_eq!(prompter.asked.len(), 1);
}

#[test]
fn free_budget_stops_the_flow_as_not_a_fit() {
    let pack = shipped_pack();
    let (result, prompter) =
        run(&pack, &["Set up my home network", "installation", "flexible", "Madrid", "free"]);

    assert_eq!(result.readiness.status, ReadinessStatus::NotAFit);
    assert_eq!(result.handoff.recommended_action, RecommendedAction::RouteHuman);
    assert_eq!(result.handoff.routing_hint, "not_a_fit_review");
    assert!(result.handoff.next_questions.is_empty());
    assert_eq!(result.request.details.budget_range, "free");
    assert!(!prompter.asked.iter().any(|question| question.starts_with("Any constraints")));
}

#[test]
fn confirmed_location_correction_is_used_and_audited() {
    let pack = shipped_pack();
    let suggester = StaticSuggester { location: Some("Toronto".to_string()), service_type: None };
    let mut agent = agent(&pack, None).with_suggester(Box::new(suggester));
    let mut prompter = ScriptedPrompter::new([
        "My dishwasher is broken",
        "repair",
        "",
        "toronot",
        "yes",
        "",
        "no",
    ]);

    let result = agent.run(&mut prompter);

    assert_eq!(result.request.details.location, "Toronto");
    assert_eq!(result.request.sources.llm_used, vec!["location_correction".to_string()]);
    assert!(result.audit.tool_calls.contains(&"suggest_location_correction".to_string()));
    assert!(logged(&result, "llm_suggestion_accepted: location='Toronto'"));
    assert_eq!(result.readiness.status, ReadinessStatus::Ready);
}

#[test]
fn resumed_session_asks_only_the_pending_field() {
    let pack = shipped_pack();
    let memory = SessionMemory::from_value(json!({
        "missing_fields": ["location"],
        "last_intent_id": "pre_quote_request",
        "last_state": "finalized",
        "collected": {
            "issue_description": "Washing machine leaks",
            "service_type": "repair"
        }
    }));
    let mut agent = agent(&pack, Some(memory)).with_extractor(Box::new(NoPrefill));
    let mut prompter = ScriptedPrompter::new(["Vancouver"]);

    let result = agent.run(&mut prompter);

    assert_eq!(prompter.asked, vec!["What is your location (city/country)?".to_string()]);
    assert_eq!(result.readiness.status, ReadinessStatus::Ready);
    assert_eq!(result.request.details.service_type, "repair");
    assert!(logged(&result, "intent_resumed: pre_quote_request"));

    let exported = agent.export_state();
    assert!(exported.missing_fields.is_empty());
    assert_eq!(exported.collected["location"], json!("Vancouver"));
}

#[test]
fn resumed_session_with_retired_intent_falls_back() {
    let pack = shipped_pack();
    let memory = SessionMemory::from_value(json!({
        "missing_fields": ["location"],
        "last_intent_id": "retired_intent",
        "collected": {
            "issue_description": "Garage door stuck",
            "service_type": "repair"
        }
    }));
    let mut agent = agent(&pack, Some(memory));
    let mut prompter = ScriptedPrompter::new(["London"]);

    let result = agent.run(&mut prompter);

    assert!(logged(&result, "intent_resume_fallback: pre_quote_request (always)"));
    assert_eq!(result.request.intent_id, "pre_quote_request");
    assert_eq!(result.readiness.status, ReadinessStatus::Ready);
    assert_eq!(agent.export_state().last_intent_id.as_deref(), Some("pre_quote_request"));
}

#[test]
fn unfinished_run_can_be_resumed_from_its_export() {
    let pack = shipped_pack();
    let mut prompter = ScriptedPrompter::new(["Install a ceiling fan", "installation"]);
    let mut agent = agent(&pack, None);
    let first = agent.run(&mut prompter);
    assert_eq!(first.readiness.status, ReadinessStatus::NotReady);
    assert_eq!(first.request.details.location, NOT_PROVIDED);

    let memory = agent.export_state();
    assert_eq!(memory.missing_fields, vec!["location".to_string()]);

    let mut resumed = IntakeAgent::new(
        &pack,
        RequestId("req_second".to_string()),
        SessionId("sess_scenario".to_string()),
        Some(memory),
    );
    let mut prompter = ScriptedPrompter::new(["Montreal"]);
    let result = resumed.run(&mut prompter);

    assert_eq!(result.readiness.status, ReadinessStatus::Ready);
    assert_eq!(result.request.details.service_type, "installation");
    assert_eq!(result.request.details.location, "Montreal");
}
