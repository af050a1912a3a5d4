//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;
use wingman_pipeline::SessionOptions;
use wingman_voice::VoiceConfig;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Remote speech and completion services.
    #[serde(default)]
    pub voice: VoiceConfig,

    /// Defaults for new voice sessions.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "wingman_pipeline=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Voice session defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Language used until an interview or the client chooses one.
    #[serde(default = "default_language")]
    pub language: String,

    /// Synthesis speed multiplier.
    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3001
}

fn default_db_path() -> String {
    "wingman.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    wingman_db::DbRuntimeSettings::default().busy_timeout_ms
}

fn default_pool_max_size() -> u32 {
    wingman_db::DbRuntimeSettings::default().pool_max_size
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_language() -> String {
    SessionOptions::default().language
}

fn default_speed() -> f32 {
    SessionOptions::default().speed
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            speed: default_speed(),
        }
    }
}

impl DatabaseConfig {
    pub fn runtime_settings(&self) -> wingman_db::DbRuntimeSettings {
        wingman_db::DbRuntimeSettings {
            busy_timeout_ms: self.busy_timeout_ms,
            pool_max_size: self.pool_max_size,
        }
    }
}

impl SessionConfig {
    pub fn options(&self) -> SessionOptions {
        SessionOptions {
            language: self.language.clone(),
            speed: self.speed,
            ..SessionOptions::default()
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but holds an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `WINGMAN_HOST` overrides `server.host`
/// - `WINGMAN_PORT` overrides `server.port`
/// - `WINGMAN_DB_PATH` overrides `database.path`
/// - `WINGMAN_LOG_LEVEL` overrides `logging.level`
/// - `WINGMAN_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `FAL_KEY`, `OPENROUTER_API_KEY` set the service keys
/// - `OPENROUTER_MODEL`, `STT_URL`, `TTS_URL`, `LLM_URL` override `voice.*`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// if the merged configuration is invalid.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Applies overrides from `lookup`, which maps a variable name to its value.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(parsed) = lookup("WINGMAN_HOST").and_then(|v| v.parse().ok()) {
        config.server.host = parsed;
    }
    if let Some(parsed) = lookup("WINGMAN_PORT").and_then(|v| v.parse().ok()) {
        config.server.port = parsed;
    }
    if let Some(db_path) = lookup("WINGMAN_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = lookup("WINGMAN_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("WINGMAN_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    let voice = &mut config.voice;
    for (key, slot) in [
        ("FAL_KEY", &mut voice.fal_key),
        ("OPENROUTER_API_KEY", &mut voice.openrouter_api_key),
        ("OPENROUTER_MODEL", &mut voice.llm_model),
        ("STT_URL", &mut voice.stt_url),
        ("TTS_URL", &mut voice.tts_url),
        ("LLM_URL", &mut voice.llm_url),
    ] {
        if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
            *slot = value;
        }
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    config
        .voice
        .validate()
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;
    wingman_voice::tts::validate_speed(config.session.speed)
        .map_err(|e| ConfigError::Invalid(format!("session.speed: {e}")))?;
    if config.session.language.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "session.language must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.database.path, "wingman.db");
        assert_eq!(config.session.language, "tr");
        assert_eq!(config.voice.llm_model, wingman_voice::config::DEFAULT_LLM_MODEL);
    }

    #[test]
    fn file_sections_are_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 4000

[logging]
level = "debug"
json = true

[voice]
llm_model = "openai/gpt-4o-mini"

[session]
language = "en"
speed = 1.2
"#,
        )
        .unwrap();

        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.server.port, 4000);
        assert!(config.logging.json);
        assert_eq!(config.voice.llm_model, "openai/gpt-4o-mini");
        assert_eq!(config.voice.stt_url, wingman_voice::config::DEFAULT_STT_URL);
        let options = config.session.options();
        assert_eq!(options.language, "en");
        assert_eq!(options.min_audio_bytes, wingman_pipeline::MIN_AUDIO_BYTES);
    }

    #[test]
    fn invalid_speed_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[session]\nspeed = 0.0\n").unwrap();
        assert!(matches!(
            load_config(path.to_str()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("WINGMAN_PORT", "8080"),
            ("WINGMAN_HOST", "not-an-ip"),
            ("WINGMAN_LOG_JSON", "1"),
            ("FAL_KEY", "fal-secret"),
            ("OPENROUTER_API_KEY", "or-secret"),
            ("LLM_URL", "  "),
        ]);
        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, default_host());
        assert!(config.logging.json);
        assert!(config.voice.has_credentials());
        assert_eq!(config.voice.llm_url, wingman_voice::config::DEFAULT_LLM_URL);
        assert!(!format!("{:?}", config.voice).contains("fal-secret"));
    }
}
