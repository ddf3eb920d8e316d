use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_INTENTS_PATH: &str = "configs/intents_generic.json";
pub const DEFAULT_SESSIONS_DIR: &str = "sessions";
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.75;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub intents: IntentsConfig,
    pub sessions: SessionsConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct IntentsConfig {
    pub path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct SessionsConfig {
    pub dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub min_confidence: f64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub intents_path: Option<PathBuf>,
    pub sessions_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("could not parse intent pack `{path}`: {source}")]
    ParseIntentPack { path: PathBuf, source: serde_json::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            intents: IntentsConfig { path: PathBuf::from(DEFAULT_INTENTS_PATH) },
            sessions: SessionsConfig { dir: PathBuf::from(DEFAULT_SESSIONS_DIR) },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 20,
                min_confidence: DEFAULT_MIN_CONFIDENCE,
            },
            logging: LoggingConfig { level: "warn".to_string(), format: LogFormat::Compact },
        }
    }
}

impl LlmConfig {
    /// Why this provider cannot be called, or `None` when it can.
    pub fn unusable_reason(&self) -> Option<&'static str> {
        match self.provider {
            LlmProvider::OpenAi | LlmProvider::Anthropic => {
                let missing = self
                    .api_key
                    .as_ref()
                    .map(|value| value.expose_secret().trim().is_empty())
                    .unwrap_or(true);
                missing.then_some("llm.api_key is not set")
            }
            LlmProvider::Ollama => {
                let missing =
                    self.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
                missing.then_some("llm.base_url is not set")
            }
        }
    }

    pub fn is_usable(&self) -> bool {
        self.unusable_reason().is_none()
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("intake.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(path) = patch.intents.and_then(|intents| intents.path) {
            self.intents.path = path;
        }

        if let Some(dir) = patch.sessions.and_then(|sessions| sessions.dir) {
            self.sessions.dir = dir;
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(min_confidence) = llm.min_confidence {
                self.llm.min_confidence = min_confidence;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("INTAKE_INTENTS_PATH") {
            self.intents.path = PathBuf::from(value);
        }
        if let Some(value) = read_env("INTAKE_SESSIONS_DIR") {
            self.sessions.dir = PathBuf::from(value);
        }

        if let Some(value) = read_env("INTAKE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("INTAKE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("INTAKE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("INTAKE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("INTAKE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("INTAKE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("INTAKE_LLM_MIN_CONFIDENCE") {
            self.llm.min_confidence = parse_f64("INTAKE_LLM_MIN_CONFIDENCE", &value)?;
        }

        let log_level = read_env("INTAKE_LOGGING_LEVEL").or_else(|| read_env("INTAKE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("INTAKE_LOGGING_FORMAT").or_else(|| read_env("INTAKE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(intents_path) = overrides.intents_path {
            self.intents.path = intents_path;
        }
        if let Some(sessions_dir) = overrides.sessions_dir {
            self.sessions.dir = sessions_dir;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_paths(self)?;
        validate_llm(&self.llm)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("intake.toml"), PathBuf::from("config/intake.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Expands `${VAR}` and `${VAR:-fallback}` references before TOML parsing.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let expression_and_tail = &rest[start + 2..];
        let end = expression_and_tail.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let expression = &expression_and_tail[..end];

        let (name, fallback) = match expression.split_once(":-") {
            Some((name, fallback)) => (name.trim(), Some(fallback)),
            None => (expression.trim(), None),
        };
        match (env::var(name), fallback) {
            (Ok(value), _) => output.push_str(&value),
            (Err(_), Some(fallback)) => output.push_str(fallback),
            (Err(_), None) => {
                return Err(ConfigError::MissingEnvInterpolation { var: name.to_string() })
            }
        }

        rest = &expression_and_tail[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

fn validate_paths(config: &AppConfig) -> Result<(), ConfigError> {
    if config.intents.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("intents.path must not be empty".to_string()));
    }
    if config.sessions.dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation("sessions.dir must not be empty".to_string()));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&llm.min_confidence) {
        return Err(ConfigError::Validation(
            "llm.min_confidence must be in range 0.0..=1.0".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    intents: Option<IntentsPatch>,
    sessions: Option<SessionsPatch>,
    llm: Option<LlmPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct IntentsPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionsPatch {
    dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    min_confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::{Mutex, OnceLock, PoisonError};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        interpolate_env_vars, AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions,
        LogFormat,
    };

    /// Serializes env mutation across tests and restores the touched keys.
    fn with_vars<T>(vars: &[(&str, &str)], body: impl FnOnce() -> T) -> T {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        let _guard =
            ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(PoisonError::into_inner);

        let previous: Vec<(String, Option<String>)> =
            vars.iter().map(|(key, _)| (key.to_string(), env::var(key).ok())).collect();
        for (key, value) in vars {
            env::set_var(key, value);
        }

        let outcome = body();

        for (key, value) in previous {
            match value {
                Some(value) => env::set_var(&key, value),
                None => env::remove_var(&key),
            }
        }
        outcome
    }

    fn write_settings(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("intake.toml");
        fs::write(&path, body).expect("write settings file");
        path
    }

    fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
        AppConfig::load(LoadOptions {
            config_path: Some(path.to_path_buf()),
            ..LoadOptions::default()
        })
    }

    #[test]
    fn settings_file_values_can_come_from_env_references() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_settings(
            &dir,
            r#"
[llm]
provider = "openai"
api_key = "${TEST_INTAKE_API_KEY}"

[sessions]
dir = "${TEST_INTAKE_UNSET_DIR:-var/sessions}"
"#,
        );

        let config = with_vars(&[("TEST_INTAKE_API_KEY", "sk-from-env")], || load_from(&path))
            .expect("settings load");

        let api_key = config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string());
        assert_eq!(api_key.as_deref(), Some("sk-from-env"));
        assert!(config.llm.is_usable());
        assert_eq!(config.sessions.dir, PathBuf::from("var/sessions"));
    }

    #[test]
    fn interpolation_errors_name_the_problem() {
        assert!(matches!(
            interpolate_env_vars("key = \"${TEST_INTAKE_NEVER_SET_VAR}\""),
            Err(ConfigError::MissingEnvInterpolation { var }) if var == "TEST_INTAKE_NEVER_SET_VAR"
        ));
        assert!(matches!(
            interpolate_env_vars("key = \"${OPEN"),
            Err(ConfigError::UnterminatedInterpolation)
        ));
        assert_eq!(interpolate_env_vars("plain = \"$5\"").ok().as_deref(), Some("plain = \"$5\""));
    }

    #[test]
    fn logging_env_aliases_are_supported() {
        let aliases = [("INTAKE_LOG_LEVEL", "debug"), ("INTAKE_LOG_FORMAT", "pretty")];
        let config = with_vars(&aliases, || AppConfig::load(LoadOptions::default()))
            .expect("settings load");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn overrides_beat_env_which_beats_the_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_settings(
            &dir,
            r#"
[intents]
path = "packs/from-file.json"

[sessions]
dir = "sessions-from-file"

[llm]
model = "model-from-file"
min_confidence = 0.9

[logging]
level = "warn"
"#,
        );

        let config = with_vars(
            &[
                ("INTAKE_SESSIONS_DIR", "/tmp/sessions-from-env"),
                ("INTAKE_LLM_MODEL", "model-from-env"),
            ],
            || {
                AppConfig::load(LoadOptions {
                    config_path: Some(path.clone()),
                    overrides: ConfigOverrides {
                        intents_path: Some(PathBuf::from("packs/from-override.json")),
                        log_level: Some("error".to_string()),
                        ..ConfigOverrides::default()
                    },
                    ..LoadOptions::default()
                })
            },
        )
        .expect("settings load");

        assert_eq!(config.intents.path, PathBuf::from("packs/from-override.json"));
        assert_eq!(config.logging.level, "error");
        assert_eq!(config.sessions.dir, PathBuf::from("/tmp/sessions-from-env"));
        assert_eq!(config.llm.model, "model-from-env");
        assert!((config.llm.min_confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_confidence_is_rejected_with_the_key_name() {
        let error = with_vars(&[("INTAKE_LLM_MIN_CONFIDENCE", "1.5")], || {
            AppConfig::load(LoadOptions::default())
        })
        .expect_err("validation failure");

        let names_key = match &error {
            ConfigError::Validation(message) => message.contains("llm.min_confidence"),
            _ => false,
        };
        assert!(names_key, "unexpected error: {error}");
    }

    #[test]
    fn malformed_env_override_is_rejected() {
        let error = with_vars(&[("INTAKE_LLM_TIMEOUT_SECS", "soon")], || {
            AppConfig::load(LoadOptions::default())
        })
        .expect_err("invalid override");

        let names_key = match &error {
            ConfigError::InvalidEnvOverride { key, .. } => key == "INTAKE_LLM_TIMEOUT_SECS",
            _ => false,
        };
        assert!(names_key, "unexpected error: {error}");
    }

    #[test]
    fn api_key_stays_out_of_debug_output() {
        let config = with_vars(&[("INTAKE_LLM_API_KEY", "sk-secret-value")], || {
            AppConfig::load(LoadOptions::default())
        })
        .expect("settings load");

        assert!(!format!("{config:?}").contains("sk-secret-value"));
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn missing_credentials_make_llm_unusable() {
        let mut config = AppConfig::default();
        assert_eq!(config.llm.unusable_reason(), Some("llm.api_key is not set"));

        config.llm.provider = LlmProvider::Ollama;
        config.llm.base_url = Some("http://localhost:11434/v1".to_string());
        assert!(config.llm.is_usable());
    }

    #[test]
    fn required_file_must_exist() {
        let error = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/intake.toml")),
            require_file: true,
            ..LoadOptions::default()
        })
        .expect_err("missing file");
        assert!(matches!(error, ConfigError::MissingConfigFile(_)));
    }
}
