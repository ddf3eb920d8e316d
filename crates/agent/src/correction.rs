//! Correction suggestions for location and service-type answers.
//!
//! Suggesters never fail: transport errors, timeouts, malformed output and
//! low-confidence guesses all come back as `None`.

use std::time::Duration;

use anyhow::Result;
use intake_core::config::LlmConfig;
use intake_core::intents::PackLlmSettings;
use serde_json::Value;
use tracing::{info, warn};

use crate::llm::{client_from_config, LlmClient};

pub const NO_SUGGESTION: &str = "NO_SUGGESTION";

pub trait CorrectionSuggester {
    fn suggest_location(&self, raw: &str) -> Option<String>;
    fn suggest_service_type(&self, raw: &str, allowed: &[String]) -> Option<String>;

    fn is_enabled(&self) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledSuggester;

impl CorrectionSuggester for DisabledSuggester {
    fn suggest_location(&self, _raw: &str) -> Option<String> {
        None
    }

    fn suggest_service_type(&self, _raw: &str, _allowed: &[String]) -> Option<String> {
        None
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Fixed suggestions, for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct StaticSuggester {
    pub location: Option<String>,
    pub service_type: Option<String>,
}

impl CorrectionSuggester for StaticSuggester {
    fn suggest_location(&self, raw: &str) -> Option<String> {
        self.location.clone().filter(|suggestion| !suggestion.eq_ignore_ascii_case(raw.trim()))
    }

    fn suggest_service_type(&self, _raw: &str, allowed: &[String]) -> Option<String> {
        self.service_type.clone().filter(|suggestion| allowed.contains(suggestion))
    }
}

const LOCATION_INSTRUCTIONS: &str = "You are helping clean a user's location field.\n\
Return a normalized location in ONE of these formats:\n  - City\n  - City, Country\n\
Prefer the shortest unambiguous form.\n\n\
Return ONLY a JSON object with keys:\n  - suggestion: string (corrected location)\n  - confidence: number from 0 to 1\n\
If you are not confident or you cannot improve it, return:\n\
{\"suggestion\":\"NO_SUGGESTION\",\"confidence\":0}\n\
Do NOT add any extra text.";

const SERVICE_TYPE_INSTRUCTIONS: &str = "You are helping map a user's service type into a closed set.\n\
Choose exactly ONE from the allowed list.\n\
Return ONLY JSON with keys:\n  - suggestion: string (must be one of allowed)\n  - confidence: number 0..1\n\
If you are not confident, return:\n\
{\"suggestion\":\"NO_SUGGESTION\",\"confidence\":0}\n\
Do NOT add any extra text.";

/// Asks an [`LlmClient`] for corrections, blocking on a private runtime.
pub struct LlmCorrectionSuggester {
    client: Box<dyn LlmClient>,
    runtime: tokio::runtime::Runtime,
    timeout: Duration,
    min_confidence: f64,
}

impl LlmCorrectionSuggester {
    pub fn new(client: Box<dyn LlmClient>, timeout: Duration, min_confidence: f64) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        Ok(Self { client, runtime, timeout, min_confidence })
    }

    fn ask(&self, kind: &'static str, system_prompt: &str, user_prompt: &str) -> Option<String> {
        let call = self.client.complete(system_prompt, user_prompt);
        let outcome = self.runtime.block_on(async { tokio::time::timeout(self.timeout, call).await });

        match outcome {
            Ok(Ok(text)) => {
                let suggestion = parse_suggestion(&text, self.min_confidence);
                if suggestion.is_none() {
                    tracing::debug!(
                        event_name = "intake.llm.no_suggestion",
                        kind,
                        provider = self.client.provider_name(),
                        "llm returned no usable suggestion"
                    );
                }
                suggestion
            }
            Ok(Err(error)) => {
                warn!(
                    event_name = "intake.llm.failed",
                    kind,
                    provider = self.client.provider_name(),
                    error = %error,
                    "llm correction call failed"
                );
                None
            }
            Err(_) => {
                warn!(
                    event_name = "intake.llm.timeout",
                    kind,
                    provider = self.client.provider_name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "llm correction call timed out"
                );
                None
            }
        }
    }
}

impl CorrectionSuggester for LlmCorrectionSuggester {
    fn suggest_location(&self, raw: &str) -> Option<String> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }

        let user_prompt = format!("Raw location: \"{value}\"");
        self.ask("location", LOCATION_INSTRUCTIONS, &user_prompt)
            .filter(|suggestion| suggestion.to_lowercase() != value.to_lowercase())
    }

    fn suggest_service_type(&self, raw: &str, allowed: &[String]) -> Option<String> {
        let value = raw.trim();
        if value.is_empty() || allowed.is_empty() {
            return None;
        }

        let user_prompt = format!("Allowed: {allowed:?}\nUser entered: \"{value}\"");
        self.ask("service_type", SERVICE_TYPE_INSTRUCTIONS, &user_prompt)
            .filter(|suggestion| allowed.contains(suggestion))
    }
}

/// Picks the suggester for a run.
///
/// Corrections need the pack to opt in and the runtime LLM settings to be
/// usable; anything else yields [`DisabledSuggester`]. The pack's
/// `min_confidence` wins over the runtime default when present.
pub fn build_suggester(
    pack: &PackLlmSettings,
    config: &LlmConfig,
) -> Box<dyn CorrectionSuggester> {
    if !pack.enabled {
        info!(
            event_name = "intake.llm.disabled",
            reason = "pack",
            "llm corrections disabled by intent pack"
        );
        return Box::new(DisabledSuggester);
    }
    if let Some(reason) = config.unusable_reason() {
        warn!(event_name = "intake.llm.disabled", reason, "llm corrections unavailable");
        return Box::new(DisabledSuggester);
    }

    let min_confidence = pack.min_confidence.unwrap_or(config.min_confidence);
    let timeout = Duration::from_secs(config.timeout_secs);
    let built = client_from_config(config)
        .and_then(|client| LlmCorrectionSuggester::new(client, timeout, min_confidence));

    match built {
        Ok(suggester) => {
            info!(
                event_name = "intake.llm.enabled",
                provider = config.provider.as_str(),
                model = %config.model,
                min_confidence,
                "llm corrections enabled"
            );
            Box::new(suggester)
        }
        Err(error) => {
            warn!(
                event_name = "intake.llm.disabled",
                error = %error,
                "llm client could not be built"
            );
            Box::new(DisabledSuggester)
        }
    }
}

/// Reads `{"suggestion": ..., "confidence": ...}`, tolerating a fenced block.
pub fn parse_suggestion(text: &str, min_confidence: f64) -> Option<String> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let payload = serde_json::from_str::<Value>(body).ok()?;
    let suggestion = payload.get("suggestion")?.as_str()?.trim().to_string();
    let confidence = match payload.get("confidence") {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(raw)) => raw.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };

    if confidence < min_confidence {
        return None;
    }
    if suggestion.is_empty() || suggestion.eq_ignore_ascii_case(NO_SUGGESTION) {
        return None;
    }
    Some(suggestion)
}
