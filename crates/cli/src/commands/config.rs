use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use intake_core::config::{AppConfig, ConfigOverrides};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::load_settings;

struct SourceLookup {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

impl SourceLookup {
    fn new(explicit: Option<&Path>) -> Self {
        let path = detect_config_path(explicit);
        let doc = load_config_file_doc(path.as_deref());
        Self { path, doc }
    }

    fn line(&self, key_path: &str, env_keys: &[&str], value: &str) -> String {
        render_line(key_path, value, self.field_source(key_path, env_keys))
    }

    fn field_source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

pub fn run(settings_path: Option<PathBuf>) -> String {
    let sources = SourceLookup::new(settings_path.as_deref());
    let config = match load_settings(settings_path, ConfigOverrides::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    render(&config, &sources).join("\n")
}

fn render(config: &AppConfig, sources: &SourceLookup) -> Vec<String> {
    let llm_api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        "effective config (source precedence: env > file > default):".to_string(),
        sources.line(
            "intents.path",
            &["INTAKE_INTENTS_PATH"],
            &config.intents.path.display().to_string(),
        ),
        sources.line(
            "sessions.dir",
            &["INTAKE_SESSIONS_DIR"],
            &config.sessions.dir.display().to_string(),
        ),
        sources.line("llm.provider", &["INTAKE_LLM_PROVIDER"], config.llm.provider.as_str()),
        sources.line("llm.model", &["INTAKE_LLM_MODEL"], &config.llm.model),
        sources.line(
            "llm.base_url",
            &["INTAKE_LLM_BASE_URL"],
            config.llm.base_url.as_deref().unwrap_or("<unset>"),
        ),
        sources.line("llm.api_key", &["INTAKE_LLM_API_KEY"], &llm_api_key),
        sources.line(
            "llm.timeout_secs",
            &["INTAKE_LLM_TIMEOUT_SECS"],
            &config.llm.timeout_secs.to_string(),
        ),
        sources.line(
            "llm.min_confidence",
            &["INTAKE_LLM_MIN_CONFIDENCE"],
            &config.llm.min_confidence.to_string(),
        ),
        sources.line(
            "logging.level",
            &["INTAKE_LOGGING_LEVEL", "INTAKE_LOG_LEVEL"],
            &config.logging.level,
        ),
        sources.line(
            "logging.format",
            &["INTAKE_LOGGING_FORMAT", "INTAKE_LOG_FORMAT"],
            &format!("{:?}", config.logging.format).to_lowercase(),
        ),
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from("intake.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/intake.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a provider prefix such as `sk-` and hides the rest.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
