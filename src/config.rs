use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

const DEFAULT_QUIZ_LIMIT: usize = 20;
const DEFAULT_PORT: u16 = 10000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub questions_path: PathBuf,
    pub database_path: PathBuf,
    pub dialogue_db_path: String,
    pub storage_backend: StorageBackend,
    pub quiz_limit: usize,
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Public base URL, without the trailing slash.
    pub url: String,
    /// Always starts with a slash.
    pub path: String,
    pub port: u16,
}

impl WebhookConfig {
    pub fn full_url(&self) -> String {
        format!("{}{}", self.url, self.path)
    }
}

impl Config {
    /// Reads the configuration from the process environment. Call `dotenv()` first
    /// if a `.env` file should be honored.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = get("TELOXIDE_TOKEN")
            .or_else(|| get("BOT_TOKEN"))
            .ok_or_else(|| Error::Config("TELOXIDE_TOKEN (or BOT_TOKEN) is not set".to_string()))?;

        let storage_backend = match get("STORAGE_BACKEND").as_deref() {
            None | Some("sqlite") => StorageBackend::Sqlite,
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(Error::Config(format!(
                    "STORAGE_BACKEND must be 'sqlite' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let quiz_limit = match get("QUIZ_LIMIT") {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| Error::Config(format!("QUIZ_LIMIT is not a number: '{}'", raw)))?,
            None => DEFAULT_QUIZ_LIMIT,
        };

        let webhook = match get("WEBHOOK_URL") {
            Some(url) => {
                let mut path = get("WEBHOOK_PATH").unwrap_or_else(|| "/telegram".to_string());
                if !path.starts_with('/') {
                    path.insert(0, '/');
                }
                let port = match get("PORT") {
                    Some(raw) => raw
                        .parse::<u16>()
                        .map_err(|_| Error::Config(format!("PORT is not a valid port: '{}'", raw)))?,
                    None => DEFAULT_PORT,
                };
                Some(WebhookConfig {
                    url: url.trim_end_matches('/').to_string(),
                    path,
                    port,
                })
            }
            None => None,
        };

        Ok(Self {
            bot_token,
            questions_path: get("QUESTIONS_PATH")
                .unwrap_or_else(|| "questions.csv".to_string())
                .into(),
            database_path: get("DATABASE_PATH")
                .unwrap_or_else(|| "quizbot.sqlite".to_string())
                .into(),
            dialogue_db_path: get("DIALOGUE_DB_PATH").unwrap_or_else(|| "dialogues.sqlite".to_string()),
            storage_backend,
            quiz_limit,
            webhook,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = config_from(&[("BOT_TOKEN", "123:abc")]).unwrap();
        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.quiz_limit, 20);
        assert_eq!(config.storage_backend, StorageBackend::Sqlite);
        assert_eq!(config.questions_path, PathBuf::from("questions.csv"));
        assert!(config.webhook.is_none());
    }

    #[test]
    fn missing_token_is_a_config_error() {
        assert!(matches!(config_from(&[]), Err(Error::Config(_))));
    }

    #[test]
    fn webhook_path_and_url_are_normalized() {
        let config = config_from(&[
            ("TELOXIDE_TOKEN", "t"),
            ("WEBHOOK_URL", "https://example.org/"),
            ("WEBHOOK_PATH", "hook"),
            ("PORT", "8443"),
        ])
        .unwrap();
        let webhook = config.webhook.unwrap();
        assert_eq!(webhook.full_url(), "https://example.org/hook");
        assert_eq!(webhook.port, 8443);
    }

    #[test]
    fn rejects_unknown_backend_and_bad_limit() {
        assert!(config_from(&[("BOT_TOKEN", "t"), ("STORAGE_BACKEND", "sheets")]).is_err());
        assert!(config_from(&[("BOT_TOKEN", "t"), ("QUIZ_LIMIT", "many")]).is_err());
    }
}
