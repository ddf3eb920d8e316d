use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use intake_agent::{build_suggester, CheckpointSink, IntakeAgent, Prompter};
use intake_core::config::{ConfigOverrides, LlmConfig};
use intake_core::{ApplicationError, IntentPack, RequestId, SessionId, SessionMemory};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::commands::{load_settings, CommandResult};
use crate::logging;
use crate::session_store::SessionStore;
use crate::terminal::LinePrompter;

const COMMAND: &str = "run";
pub const DEFAULT_SESSION_ID: &str = "sess_local_001";
pub const RESULT_HEADER: &str = "--- intake_result (JSON) ---";
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    pub intents_path: Option<PathBuf>,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
    pub sessions_dir: Option<PathBuf>,
    pub settings_path: Option<PathBuf>,
}

/// Most recent checkpoint, shared with the interrupt watcher.
#[derive(Clone, Debug, Default)]
pub struct LatestSnapshot(Arc<Mutex<Option<SessionMemory>>>);

impl LatestSnapshot {
    pub fn current(&self) -> Option<SessionMemory> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replace(&self, memory: SessionMemory) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(memory);
    }
}

impl CheckpointSink for LatestSnapshot {
    fn checkpoint(&self, snapshot: &SessionMemory) {
        self.replace(snapshot.clone());
    }
}

pub fn run(options: RunOptions) -> CommandResult {
    let overrides = ConfigOverrides {
        intents_path: options.intents_path,
        sessions_dir: options.sessions_dir,
        ..ConfigOverrides::default()
    };
    let config = match load_settings(options.settings_path, overrides) {
        Ok(config) => config,
        Err(error) => return CommandResult::from_error(COMMAND, &error),
    };
    logging::init(&config.logging);

    let pack = match IntentPack::load(&config.intents.path) {
        Ok(pack) => pack,
        Err(error) => return CommandResult::from_error(COMMAND, &ApplicationError::from(error)),
    };

    let mut prompter = LinePrompter::stdio();
    let session_id = resolve_session_id(options.session_id, &mut prompter);
    let store = SessionStore::new(config.sessions.dir.clone());
    let latest = LatestSnapshot::default();
    watch_for_interrupt(store.clone(), session_id.clone(), latest.clone());

    execute(&pack, &config.llm, &store, session_id, options.request_id, &mut prompter, latest)
}

/// Blank or missing ids fall back to the local default session.
pub fn resolve_session_id(explicit: Option<String>, prompter: &mut dyn Prompter) -> SessionId {
    let raw = match explicit {
        Some(id) => id,
        None => prompter.ask(&format!("Session id (press Enter for {DEFAULT_SESSION_ID}):")),
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        SessionId(DEFAULT_SESSION_ID.to_string())
    } else {
        SessionId(trimmed.to_string())
    }
}

pub fn new_request_id() -> RequestId {
    RequestId(format!("req_{}", Uuid::new_v4().simple()))
}

/// Runs one conversation against an already loaded pack and persists the
/// exported memory. The result document is returned even when saving fails.
pub fn execute(
    pack: &IntentPack,
    llm: &LlmConfig,
    store: &SessionStore,
    session_id: SessionId,
    request_id: Option<String>,
    prompter: &mut dyn Prompter,
    latest: LatestSnapshot,
) -> CommandResult {
    let memory = store.load(&session_id);
    if let Some(memory) = &memory {
        latest.replace(memory.clone());
    }

    let request_id = request_id.map(RequestId).unwrap_or_else(new_request_id);
    let mut agent = IntakeAgent::new(pack, request_id, session_id.clone(), memory)
        .with_suggester(build_suggester(&pack.llm, llm))
        .with_checkpoint(Box::new(latest));

    let result = agent.run(prompter);
    let document = match serde_json::to_string_pretty(&result.to_json()) {
        Ok(document) => document,
        Err(error) => return CommandResult::failure(COMMAND, "serialization", error.to_string(), 1),
    };
    let output = format!("{RESULT_HEADER}\n{document}");

    match store.save(&session_id, &agent.export_state()) {
        Ok(path) => {
            info!(
                event_name = "intake.session.saved",
                correlation_id = %result.request_id.0,
                session_id = %session_id.as_str(),
                path = %path.display(),
                "session memory saved"
            );
            CommandResult { exit_code: 0, output }
        }
        Err(source) => {
            let error = ApplicationError::from(source);
            error!(
                event_name = "intake.session.save_failed",
                correlation_id = %result.request_id.0,
                session_id = %session_id.as_str(),
                error_class = error.error_class(),
                error = %error,
                "session memory could not be saved"
            );
            CommandResult { exit_code: error.exit_code(), output }
        }
    }
}

/// Saves the latest checkpoint and exits when Ctrl+C arrives mid-conversation.
fn watch_for_interrupt(store: SessionStore, session_id: SessionId, latest: LatestSnapshot) {
    let spawned = thread::Builder::new().name("intake-interrupt".to_string()).spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(error) => {
                warn!(
                    event_name = "intake.interrupt.unavailable",
                    error = %error,
                    "interrupt handler could not start"
                );
                return;
            }
        };
        if let Err(error) = runtime.block_on(tokio::signal::ctrl_c()) {
            warn!(
                event_name = "intake.interrupt.unavailable",
                error = %error,
                "ctrl_c listener failed"
            );
            return;
        }

        if let Some(memory) = latest.current() {
            match store.save(&session_id, &memory) {
                Ok(path) => info!(
                    event_name = "intake.session.saved_on_interrupt",
                    session_id = %session_id.as_str(),
                    path = %path.display(),
                    "session memory saved after interrupt"
                ),
                Err(error) => error!(
                    event_name = "intake.session.save_failed",
                    session_id = %session_id.as_str(),
                    error = %error,
                    "session memory could not be saved after interrupt"
                ),
            }
        }
        eprintln!("\nInterrupted. Progress for session {} was kept.", session_id.as_str());
        std::process::exit(INTERRUPTED_EXIT_CODE);
    });

    if let Err(error) = spawned {
        warn!(
            event_name = "intake.interrupt.unavailable",
            error = %error,
            "interrupt thread not spawned"
        );
    }
}
