use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use teloxide::types::ChatId;
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{}': {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Failed to parse the JSON bot config.
    #[error("failed to parse config file '{}': {source}", .path.display())]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Failed to parse the TOML emotes file.
    #[error("failed to parse emotes file '{}': {source}", .path.display())]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// Validation error.
    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Deserialize)]
struct ConfigFile {
    telegram_bot_token: String,
    /// Groups the bot answers in. Empty means every group it is a member of.
    #[serde(default)]
    allowed_groups: Vec<i64>,
    /// Directory for state files (logs, database). Defaults to current directory.
    data_dir: Option<String>,
    /// Path to the TOML file holding `[[emote]]` and `[[gif]]` tables.
    emotes_file: Option<String>,
    /// Path to the SQLite database. Defaults to `<data_dir>/sophie.db`.
    database_file: Option<String>,
    /// Extra names the bot answers to besides its Telegram username and first name.
    #[serde(default)]
    trigger_names: Vec<String>,
    log_chat_id: Option<i64>,
}

pub struct Config {
    pub telegram_bot_token: String,
    pub allowed_groups: HashSet<ChatId>,
    pub data_dir: PathBuf,
    pub emotes_path: PathBuf,
    pub database_path: PathBuf,
    pub trigger_names: Vec<String>,
    pub log_chat_id: Option<ChatId>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        if file.telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = file.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
            ));
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let emotes_path = file
            .emotes_file
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("emotes.toml"));
        let database_path = file
            .database_file
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("sophie.db"));

        let trigger_names = file
            .trigger_names
            .into_iter()
            .map(|name| name.trim().trim_start_matches('@').to_string())
            .filter(|name| !name.is_empty())
            .collect();

        Ok(Self {
            telegram_bot_token: file.telegram_bot_token,
            allowed_groups: file.allowed_groups.into_iter().map(ChatId).collect(),
            data_dir,
            emotes_path,
            database_path,
            trigger_names,
            log_chat_id: file.log_chat_id.map(ChatId),
        })
    }

    pub fn is_allowed_group(&self, chat_id: ChatId) -> bool {
        self.allowed_groups.is_empty() || self.allowed_groups.contains(&chat_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn assert_err<T>(result: Result<T, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_valid_config_defaults() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdefGHIjklMNOpqrsTUVwxyz"
        }"#);
        let config = Config::load(file.path()).expect("should load valid config");
        assert_eq!(config.data_dir, PathBuf::from("."));
        assert_eq!(config.emotes_path, PathBuf::from("emotes.toml"));
        assert_eq!(config.database_path, PathBuf::from("./sophie.db"));
        assert!(config.trigger_names.is_empty());
        assert!(config.log_chat_id.is_none());
        assert!(config.is_allowed_group(ChatId(-100)));
    }

    #[test]
    fn test_database_defaults_into_data_dir() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdef",
            "data_dir": "/var/lib/sophie"
        }"#);
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/sophie/sophie.db"));
    }

    #[test]
    fn test_allowed_groups_restrict() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdef",
            "allowed_groups": [-1001, -1002]
        }"#);
        let config = Config::load(file.path()).unwrap();
        assert!(config.is_allowed_group(ChatId(-1001)));
        assert!(!config.is_allowed_group(ChatId(-1003)));
    }

    #[test]
    fn test_trigger_names_normalized() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdef",
            "trigger_names": ["@Sophie", "  ", "sophie bot "]
        }"#);
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.trigger_names, vec!["Sophie".to_string(), "sophie bot".to_string()]);
    }

    #[test]
    fn test_empty_token() {
        let file = write_config(r#"{ "telegram_bot_token": "" }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("telegram_bot_token"));
    }

    #[test]
    fn test_invalid_token_format_no_colon() {
        let file = write_config(r#"{ "telegram_bot_token": "invalid_token_no_colon" }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("invalid"));
    }

    #[test]
    fn test_invalid_token_format_empty_secret() {
        let file = write_config(r#"{ "telegram_bot_token": "123456789:" }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_file_not_found() {
        let err = assert_err(Config::load("/nonexistent/path/config.json"));
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let file = write_config("{ invalid json }");
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }
}
