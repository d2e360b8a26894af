use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use teloxide::types::ChatId;

use crate::classifier::Command;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Unknown IANA timezone name.
    InvalidTimezone { name: String, reason: String },
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
            Self::InvalidTimezone { name, reason } => {
                write!(f, "invalid timezone '{}': {}", name, reason)
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
            Self::InvalidTimezone { .. } | Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct PersonFile {
    /// Telegram username of the sender (with or without @)
    username: String,
    /// Name shown in records and statistics
    name: String,
}

#[derive(Deserialize)]
struct WebhookFile {
    /// Public HTTPS URL Telegram should post updates to
    url: String,
    #[serde(default = "default_listen_addr")]
    listen_addr: String,
}

#[derive(Deserialize)]
struct ConfigFile {
    telegram_bot_token: String,
    /// Shown in help and error replies as the person to contact
    #[serde(default)]
    admin_username: String,
    categories: Vec<String>,
    people: Vec<PersonFile>,
    #[serde(default = "default_flag_token")]
    flag_token: String,
    #[serde(default = "default_timezone")]
    timezone: String,
    /// Directory for the database and logs. Defaults to current directory.
    data_dir: Option<String>,
    log_chat_id: Option<i64>,
    /// Receive updates through a webhook instead of long polling.
    webhook: Option<WebhookFile>,
}

fn default_flag_token() -> String {
    "буржуйство".to_string()
}

fn default_timezone() -> String {
    "Europe/Moscow".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:8443".to_string()
}

/// A person allowed to record expenses, keyed by Telegram username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub username: String,
    pub name: String,
}

impl Person {
    pub fn new(username: &str, name: &str) -> Self {
        Self {
            username: normalize_username(username),
            name: name.trim().to_string(),
        }
    }
}

/// Tokens the bot understands. Built once at startup, read-only afterwards.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    /// Category tokens in declaration order (lowercase).
    pub categories: Vec<String>,
    /// People in declaration order.
    pub people: Vec<Person>,
    /// Marker word that sets the flag on an entry (lowercase).
    pub flag_token: String,
    pub commands: Vec<Command>,
}

impl Vocabulary {
    pub fn new(
        categories: Vec<String>,
        people: Vec<Person>,
        flag_token: &str,
    ) -> Result<Self, ConfigError> {
        let flag_token = normalize_token(flag_token);
        check_token("flag_token", &flag_token)?;

        if categories.is_empty() {
            return Err(ConfigError::Validation("categories must contain at least one category".into()));
        }
        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(categories.len());
        for raw in categories {
            let category = normalize_token(&raw);
            check_token("category", &category)?;
            if category == flag_token {
                return Err(ConfigError::Validation(format!(
                    "category '{}' clashes with flag_token",
                    category
                )));
            }
            if !seen.insert(category.clone()) {
                return Err(ConfigError::Validation(format!("duplicate category '{}'", category)));
            }
            normalized.push(category);
        }

        if people.is_empty() {
            return Err(ConfigError::Validation("people must contain at least one person".into()));
        }
        check_people(&people)?;

        Ok(Self {
            categories: normalized,
            people,
            flag_token,
            commands: Command::ALL.to_vec(),
        })
    }

    /// Look up the person behind a Telegram username.
    pub fn person_for(&self, username: &str) -> Option<&Person> {
        let username = normalize_username(username);
        self.people.iter().find(|p| p.username == username)
    }

    pub fn person_names(&self) -> Vec<String> {
        self.people.iter().map(|p| p.name.clone()).collect()
    }
}

fn check_people(people: &[Person]) -> Result<(), ConfigError> {
    let mut usernames = HashSet::new();
    let mut names = HashSet::new();
    for person in people {
        if person.username.is_empty() || person.name.is_empty() {
            return Err(ConfigError::Validation("people entries need both username and name".into()));
        }
        if !usernames.insert(person.username.as_str()) {
            return Err(ConfigError::Validation(format!("duplicate username '{}'", person.username)));
        }
        if !names.insert(person.name.as_str()) {
            return Err(ConfigError::Validation(format!("duplicate person name '{}'", person.name)));
        }
    }
    Ok(())
}

fn normalize_token(s: &str) -> String {
    s.trim().to_lowercase()
}

fn normalize_username(s: &str) -> String {
    s.trim().trim_start_matches('@').to_lowercase()
}

fn check_token(what: &str, token: &str) -> Result<(), ConfigError> {
    if token.is_empty() {
        return Err(ConfigError::Validation(format!("{} must not be empty", what)));
    }
    // A leading digit would be read as an amount.
    if token.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must not start with a digit",
            what, token
        )));
    }
    Ok(())
}

/// Webhook listener settings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub listen_addr: SocketAddr,
}

pub struct Config {
    pub telegram_bot_token: String,
    pub admin_username: String,
    pub vocabulary: Vocabulary,
    /// Timezone used for record timestamps and the "current month".
    pub timezone: Tz,
    /// Directory for the database and logs.
    pub data_dir: PathBuf,
    pub log_chat_id: Option<ChatId>,
    pub webhook: Option<WebhookConfig>,
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

        let people = file
            .people
            .iter()
            .map(|p| Person::new(&p.username, &p.name))
            .collect();
        let vocabulary = Vocabulary::new(file.categories, people, &file.flag_token)?;

        let timezone = file.timezone.parse::<Tz>().map_err(|e| ConfigError::InvalidTimezone {
            name: file.timezone.clone(),
            reason: e.to_string(),
        })?;

        let webhook = match file.webhook {
            Some(w) => {
                if !w.url.starts_with("https://") {
                    return Err(ConfigError::Validation("webhook.url must be an https:// URL".into()));
                }
                let listen_addr = w.listen_addr.parse::<SocketAddr>().map_err(|e| {
                    ConfigError::Validation(format!("webhook.listen_addr '{}': {}", w.listen_addr, e))
                })?;
                Some(WebhookConfig { url: w.url, listen_addr })
            }
            None => None,
        };

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            telegram_bot_token: file.telegram_bot_token,
            admin_username: file.admin_username.trim().to_string(),
            vocabulary,
            timezone,
            data_dir,
            log_chat_id: file.log_chat_id.map(ChatId),
            webhook,
        })
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
    fn test_valid_config() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdefGHIjklMNOpqrsTUVwxyz",
            "admin_username": "@boss",
            "categories": [" Еда ", "транспорт"],
            "people": [{"username": "@Alice", "name": "аня"}, {"username": "bob", "name": "боря"}]
        }"#);
        let config = Config::load(file.path()).expect("should load valid config");
        assert_eq!(config.vocabulary.categories, vec!["еда", "транспорт"]);
        assert_eq!(config.vocabulary.flag_token, "буржуйство");
        assert_eq!(config.vocabulary.people[0].username, "alice");
        assert_eq!(config.timezone, chrono_tz::Europe::Moscow);
        assert!(config.webhook.is_none());
        assert_eq!(config.data_dir, PathBuf::from("."));
    }

    #[test]
    fn test_webhook_config() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdef",
            "categories": ["еда"],
            "people": [{"username": "alice", "name": "аня"}],
            "webhook": {"url": "https://example.org/hook"}
        }"#);
        let config = Config::load(file.path()).unwrap();
        let webhook = config.webhook.unwrap();
        assert_eq!(webhook.url, "https://example.org/hook");
        assert_eq!(webhook.listen_addr.port(), 8443);
    }

    #[test]
    fn test_webhook_requires_https() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdef",
            "categories": ["еда"],
            "people": [{"username": "alice", "name": "аня"}],
            "webhook": {"url": "http://example.org/hook"}
        }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_empty_token() {
        let file = write_config(r#"{
            "telegram_bot_token": "",
            "categories": ["еда"],
            "people": [{"username": "alice", "name": "аня"}]
        }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("telegram_bot_token"));
    }

    #[test]
    fn test_invalid_token_format_no_colon() {
        let file = write_config(r#"{
            "telegram_bot_token": "invalid_token_no_colon",
            "categories": ["еда"],
            "people": [{"username": "alice", "name": "аня"}]
        }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(err.to_string().contains("invalid"));
    }

    #[test]
    fn test_empty_categories() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdef",
            "categories": [],
            "people": [{"username": "alice", "name": "аня"}]
        }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(err.to_string().contains("categories"));
    }

    #[test]
    fn test_invalid_timezone() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdef",
            "categories": ["еда"],
            "people": [{"username": "alice", "name": "аня"}],
            "timezone": "Mars/Olympus"
        }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::InvalidTimezone { .. }));
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

    #[test]
    fn test_vocabulary_rejects_duplicates() {
        let people = vec![Person::new("alice", "аня")];
        let err = assert_err(Vocabulary::new(vec!["еда".into(), "ЕДА".into()], people, "буржуйство"));
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_vocabulary_rejects_flag_clash() {
        let people = vec![Person::new("alice", "аня")];
        let err = assert_err(Vocabulary::new(vec!["буржуйство".into()], people, "буржуйство"));
        assert!(err.to_string().contains("flag_token"));
    }

    #[test]
    fn test_vocabulary_rejects_numeric_category() {
        let people = vec![Person::new("alice", "аня")];
        let err = assert_err(Vocabulary::new(vec!["7eleven".into()], people, "буржуйство"));
        assert!(err.to_string().contains("digit"));
    }

    #[test]
    fn test_person_lookup_ignores_at_and_case() {
        let people = vec![Person::new("Alice", "аня"), Person::new("bob", "боря")];
        let vocabulary = Vocabulary::new(vec!["еда".into()], people, "буржуйство").unwrap();
        assert_eq!(vocabulary.person_for("@ALICE").map(|p| p.name.as_str()), Some("аня"));
        assert!(vocabulary.person_for("mallory").is_none());
        assert_eq!(vocabulary.person_names(), vec!["аня", "боря"]);
    }
}
