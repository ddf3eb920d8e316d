use std::path::{Path, PathBuf};

use intake_core::config::ConfigOverrides;
use intake_core::routing::required_fields;
use intake_core::{ApplicationError, IntentPack};
use serde::Serialize;

use crate::commands::{load_settings, CommandResult};

const COMMAND: &str = "validate";

#[derive(Debug, Serialize)]
pub struct PackReport {
    pub command: &'static str,
    pub status: &'static str,
    pub path: String,
    pub llm_enabled: bool,
    pub intents: Vec<IntentReport>,
}

#[derive(Debug, Serialize)]
pub struct IntentReport {
    pub id: String,
    pub priority: i64,
    pub always: bool,
    pub informational: bool,
    pub required_fields: Vec<String>,
}

/// An explicit pack path skips settings resolution entirely.
pub fn run(intents_path: Option<PathBuf>, settings_path: Option<PathBuf>) -> CommandResult {
    let path = match intents_path {
        Some(path) => path,
        None => match load_settings(settings_path, ConfigOverrides::default()) {
            Ok(config) => config.intents.path,
            Err(error) => return CommandResult::from_error(COMMAND, &error),
        },
    };

    match report(&path) {
        Ok(report) => CommandResult::report(COMMAND, &report),
        Err(error) => CommandResult::from_error(COMMAND, &error),
    }
}

pub fn report(path: &Path) -> Result<PackReport, ApplicationError> {
    let pack = IntentPack::load(path)?;
    let intents = pack
        .intents
        .iter()
        .map(|intent| IntentReport {
            id: intent.id.clone(),
            priority: intent.priority,
            always: intent.match_rule.always,
            informational: intent.informational,
            required_fields: required_fields(intent),
        })
        .collect();

    Ok(PackReport {
        command: COMMAND,
        status: "ok",
        path: path.display().to_string(),
        llm_enabled: pack.llm.enabled,
        intents,
    })
}
