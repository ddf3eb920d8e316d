use std::path::PathBuf;

use intake_core::config::ConfigOverrides;
use intake_core::{ApplicationError, SessionId};

use crate::commands::{load_settings, CommandResult};
use crate::session_store::SessionStore;

const COMMAND: &str = "session";

fn store(
    sessions_dir: Option<PathBuf>,
    settings_path: Option<PathBuf>,
) -> Result<SessionStore, ApplicationError> {
    let overrides = ConfigOverrides { sessions_dir, ..ConfigOverrides::default() };
    let config = load_settings(settings_path, overrides)?;
    Ok(SessionStore::new(config.sessions.dir))
}

/// Prints the stored memory document; exit 1 when nothing is stored.
pub fn show(
    session_id: String,
    sessions_dir: Option<PathBuf>,
    settings_path: Option<PathBuf>,
) -> CommandResult {
    let store = match store(sessions_dir, settings_path) {
        Ok(store) => store,
        Err(error) => return CommandResult::from_error(COMMAND, &error),
    };
    let session_id = SessionId(session_id);

    match store.load(&session_id) {
        Some(memory) => CommandResult::report(COMMAND, &memory.to_value()),
        None => CommandResult::failure(
            COMMAND,
            "not_found",
            format!(
                "no stored memory for session `{}` in `{}`",
                session_id.as_str(),
                store.dir().display()
            ),
            1,
        ),
    }
}

pub fn clear(
    session_id: String,
    sessions_dir: Option<PathBuf>,
    settings_path: Option<PathBuf>,
) -> CommandResult {
    let store = match store(sessions_dir, settings_path) {
        Ok(store) => store,
        Err(error) => return CommandResult::from_error(COMMAND, &error),
    };
    let session_id = SessionId(session_id);

    match store.clear(&session_id) {
        Ok(true) => CommandResult::success(
            COMMAND,
            format!("cleared stored memory for session `{}`", session_id.as_str()),
        ),
        Ok(false) => CommandResult::success(
            COMMAND,
            format!("session `{}` had no stored memory", session_id.as_str()),
        ),
        Err(error) => CommandResult::from_error(COMMAND, &ApplicationError::from(error)),
    }
}
