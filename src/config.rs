use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bot::tts::DEFAULT_ENDPOINT;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

/// Optional JSON config file. Every field can also come from the environment.
#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    discord_token: Option<String>,
    /// Cloud Text-to-Speech API key
    tts_api_key: Option<String>,
    /// Base URL of the synthesis API (tests point this at a local server)
    tts_endpoint: Option<String>,
    language_code: Option<String>,
    volume_gain_db: Option<f64>,
    /// Link shown with the presence line
    presence_url: Option<String>,
    /// Directory for state files (logs, snapshot). Defaults to current directory.
    data_dir: Option<String>,
    /// Snapshot location. Defaults to `<data_dir>/data.json`.
    snapshot_path: Option<String>,
    shutdown_timeout_secs: Option<u64>,
}

/// Environment variables that override the config file.
pub const ENV_DISCORD_TOKEN: &str = "DISCORD_CLIENT_SECRET";
pub const ENV_TTS_API_KEY: &str = "T2S_API_KEY";
pub const ENV_LANGUAGE_CODE: &str = "T2S_LANGUAGE_CODE";
pub const ENV_VOLUME_GAIN_DB: &str = "VOLUME_GAIN_DB";
pub const ENV_PRESENCE_URL: &str = "PRESENCE_URL";
pub const ENV_DATA_DIR: &str = "T2S_DATA_DIR";

const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

pub struct Config {
    pub discord_token: String,
    pub tts_api_key: String,
    pub tts_endpoint: String,
    /// Synthesis language, e.g. "en-US" or "ja-JP".
    pub language_code: String,
    pub volume_gain_db: f64,
    pub presence_url: Option<String>,
    /// Directory for state files (logs, snapshot).
    pub data_dir: PathBuf,
    pub snapshot_path: PathBuf,
    /// Upper bound on leave-voice + save during shutdown.
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Load from an optional config file, with the process environment on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`] with an explicit environment lookup.
    pub fn load_with_env<F>(path: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::ReadFile { path: path.to_path_buf(), source: e })?;
                serde_json::from_str(&content)
                    .map_err(|e| ConfigError::ParseJson { path: path.to_path_buf(), source: e })?
            }
            None => ConfigFile::default(),
        };

        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let discord_token = var(ENV_DISCORD_TOKEN).or(file.discord_token).unwrap_or_default();
        if discord_token.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "discord_token is required (or set {ENV_DISCORD_TOKEN})"
            )));
        }

        let tts_api_key = var(ENV_TTS_API_KEY).or(file.tts_api_key).unwrap_or_default();
        if tts_api_key.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "tts_api_key is required (or set {ENV_TTS_API_KEY})"
            )));
        }

        let language_code = var(ENV_LANGUAGE_CODE).or(file.language_code).unwrap_or_default();
        if language_code.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "language_code is required (or set {ENV_LANGUAGE_CODE})"
            )));
        }

        let volume_gain_db = match var(ENV_VOLUME_GAIN_DB) {
            Some(raw) => raw.trim().parse::<f64>().map_err(|_| {
                ConfigError::Validation(format!("{ENV_VOLUME_GAIN_DB} must be a number, got '{raw}'"))
            })?,
            None => file.volume_gain_db.unwrap_or(0.0),
        };
        if !volume_gain_db.is_finite() {
            return Err(ConfigError::Validation("volume_gain_db must be finite".into()));
        }

        let data_dir = var(ENV_DATA_DIR)
            .or(file.data_dir)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let snapshot_path = file
            .snapshot_path
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("data.json"));

        Ok(Self {
            discord_token,
            tts_api_key,
            tts_endpoint: file.tts_endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            language_code: language_code.trim().to_string(),
            volume_gain_db,
            presence_url: var(ENV_PRESENCE_URL).or(file.presence_url),
            data_dir,
            snapshot_path,
            shutdown_timeout: Duration::from_secs(
                file.shutdown_timeout_secs.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn full_env() -> impl Fn(&str) -> Option<String> + use<> {
        env_of(&[
            (ENV_DISCORD_TOKEN, "token"),
            (ENV_TTS_API_KEY, "key"),
            (ENV_LANGUAGE_CODE, "ja-JP"),
        ])
    }

    fn assert_err<T>(result: Result<T, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_env_only() {
        let config = Config::load_with_env(None, full_env()).expect("should load from env");
        assert_eq!(config.discord_token, "token");
        assert_eq!(config.language_code, "ja-JP");
        assert_eq!(config.volume_gain_db, 0.0);
        assert_eq!(config.presence_url, None);
        assert_eq!(config.snapshot_path, PathBuf::from("./data.json"));
        assert_eq!(config.tts_endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_valid_file() {
        let file = write_config(r#"{
            "discord_token": "file-token",
            "tts_api_key": "file-key",
            "language_code": "en-US",
            "volume_gain_db": -2.5,
            "presence_url": "https://twitch.tv/someone",
            "data_dir": "/var/lib/t2sbot",
            "shutdown_timeout_secs": 2
        }"#);
        let config = Config::load_with_env(Some(file.path()), env_of(&[])).expect("should load valid config");
        assert_eq!(config.discord_token, "file-token");
        assert_eq!(config.volume_gain_db, -2.5);
        assert_eq!(config.presence_url.as_deref(), Some("https://twitch.tv/someone"));
        assert_eq!(config.snapshot_path, PathBuf::from("/var/lib/t2sbot/data.json"));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config(r#"{
            "discord_token": "file-token",
            "tts_api_key": "file-key",
            "language_code": "en-US"
        }"#);
        let env = env_of(&[(ENV_LANGUAGE_CODE, "ja-JP"), (ENV_VOLUME_GAIN_DB, "3")]);
        let config = Config::load_with_env(Some(file.path()), env).unwrap();
        assert_eq!(config.language_code, "ja-JP");
        assert_eq!(config.volume_gain_db, 3.0);
        assert_eq!(config.discord_token, "file-token");
    }

    #[test]
    fn test_missing_token() {
        let env = env_of(&[(ENV_TTS_API_KEY, "key"), (ENV_LANGUAGE_CODE, "en-US")]);
        let err = assert_err(Config::load_with_env(None, env));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("discord_token"));
    }

    #[test]
    fn test_blank_env_counts_as_missing() {
        let env = env_of(&[
            (ENV_DISCORD_TOKEN, "token"),
            (ENV_TTS_API_KEY, "key"),
            (ENV_LANGUAGE_CODE, "  "),
        ]);
        let err = assert_err(Config::load_with_env(None, env));
        assert!(err.to_string().contains("language_code"));
    }

    #[test]
    fn test_invalid_volume_gain() {
        let env = env_of(&[
            (ENV_DISCORD_TOKEN, "token"),
            (ENV_TTS_API_KEY, "key"),
            (ENV_LANGUAGE_CODE, "en-US"),
            (ENV_VOLUME_GAIN_DB, "loud"),
        ]);
        let err = assert_err(Config::load_with_env(None, env));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("VOLUME_GAIN_DB"));
    }

    #[test]
    fn test_file_not_found() {
        let err = assert_err(Config::load_with_env(Some(Path::new("/nonexistent/path/config.json")), full_env()));
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let file = write_config("{ invalid json }");
        let err = assert_err(Config::load_with_env(Some(file.path()), full_env()));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let file = write_config(r#"{ "telegram_bot_token": "x" }"#);
        let err = assert_err(Config::load_with_env(Some(file.path()), full_env()));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }
}
