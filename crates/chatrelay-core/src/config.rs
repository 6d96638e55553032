//! Relay configuration
//!
//! Values come from an optional TOML file (`CHATRELAY_CONFIG` or
//! `chatrelay.toml` in the working directory) and are then overridden by
//! environment variables. Both secrets are required; everything else has a
//! default.

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chatrelay_ai::llm::{OPENROUTER_BASE_URL, OPENROUTER_DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::completion::DEFAULT_SYSTEM_PROMPT;
use crate::conversation::DEFAULT_MAX_HISTORY;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_POLLING_TIMEOUT_SECS: u32 = 30;
const DEFAULT_CONFIG_FILE: &str = "chatrelay.toml";
const MAX_SECRET_TOKEN_LEN: usize = 256;

/// Startup configuration failure. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Failed to load config file {path}: {reason}")]
    File { path: String, reason: String },
}

/// How inbound updates reach the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Polling,
    Webhook,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Polling => f.write_str("polling"),
            Self::Webhook => f.write_str("webhook"),
        }
    }
}

#[derive(Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    /// Public base URL. When set, the relay registers `<base>/webhook`.
    pub webhook_url: Option<String>,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` header value.
    pub webhook_secret: Option<String>,
    pub polling_timeout: u32,
}

impl fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("bot_token", &"<redacted>")
            .field("webhook_url", &self.webhook_url)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .field("polling_timeout", &self.polling_timeout)
            .finish()
    }
}

#[derive(Clone)]
pub struct CompletionSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    pub timeout: Duration,
    /// OpenRouter `HTTP-Referer` attribution header
    pub app_referer: Option<String>,
    /// OpenRouter `X-Title` attribution header
    pub app_title: Option<String>,
}

impl CompletionSettings {
    /// Defaults used by the relay, with the given API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENROUTER_BASE_URL.to_string(),
            model: OPENROUTER_DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            presence_penalty: 0.1,
            frequency_penalty: 0.1,
            timeout: Duration::from_secs(DEFAULT_COMPLETION_TIMEOUT_SECS),
            app_referer: None,
            app_title: None,
        }
    }
}

impl fmt::Debug for CompletionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct HistorySettings {
    pub max_length: usize,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub telegram: TelegramSettings,
    pub completion: CompletionSettings,
    pub server: ServerSettings,
    pub history: HistorySettings,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FileConfig {
    telegram: TelegramSection,
    completion: CompletionSection,
    server: ServerSection,
    history: HistorySection,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TelegramSection {
    bot_token: Option<String>,
    webhook_url: Option<String>,
    webhook_secret: Option<String>,
    polling_timeout: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CompletionSection {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    system_prompt: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    presence_penalty: Option<f32>,
    frequency_penalty: Option<f32>,
    timeout_secs: Option<u64>,
    app_referer: Option<String>,
    app_title: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct HistorySection {
    max_length: Option<usize>,
}

impl RelayConfig {
    /// Load from the config file (if any) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| env::var(key).ok())
    }

    /// Load using a custom environment lookup.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let file = load_from_file(&env)?.unwrap_or_default();
        Self::resolve(file, &env)
    }

    pub fn transport_mode(&self) -> TransportMode {
        if self.telegram.webhook_url.is_some() {
            TransportMode::Webhook
        } else {
            TransportMode::Polling
        }
    }

    /// Full URL registered with Telegram in webhook mode.
    pub fn webhook_endpoint(&self) -> Option<String> {
        self.telegram
            .webhook_url
            .as_deref()
            .map(|base| format!("{}/webhook", base.trim_end_matches('/')))
    }

    fn resolve(file: FileConfig, env: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let FileConfig {
            telegram,
            completion,
            server,
            history,
        } = file;

        let bot_token = var(env, "TELEGRAM_BOT_TOKEN")
            .or(non_empty(telegram.bot_token))
            .ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        let api_key = var(env, "OPENROUTER_API_KEY")
            .or(non_empty(completion.api_key))
            .ok_or(ConfigError::Missing("OPENROUTER_API_KEY"))?;

        let webhook_url = var(env, "WEBHOOK_URL").or(non_empty(telegram.webhook_url));
        if let Some(url) = &webhook_url
            && !url.starts_with("https://")
        {
            return Err(ConfigError::Invalid {
                key: "WEBHOOK_URL",
                value: url.clone(),
            });
        }

        let mut webhook_secret =
            var(env, "TELEGRAM_WEBHOOK_SECRET").or(non_empty(telegram.webhook_secret));
        if let Some(secret) = &webhook_secret
            && !is_valid_secret_token(secret)
        {
            return Err(ConfigError::Invalid {
                key: "TELEGRAM_WEBHOOK_SECRET",
                value: "<redacted>".to_string(),
            });
        }
        // Webhook calls are only trusted with a secret, so make one up.
        if webhook_url.is_some() && webhook_secret.is_none() {
            info!("No webhook secret configured, generated one for this run");
            webhook_secret = Some(Uuid::new_v4().simple().to_string());
        }

        let telegram = TelegramSettings {
            bot_token,
            webhook_url,
            webhook_secret,
            polling_timeout: telegram
                .polling_timeout
                .unwrap_or(DEFAULT_POLLING_TIMEOUT_SECS),
        };

        let mut settings = CompletionSettings::with_api_key(api_key);
        if let Some(base_url) = var(env, "OPENROUTER_BASE_URL").or(non_empty(completion.base_url)) {
            settings.base_url = base_url;
        }
        if let Some(model) = var(env, "OPENROUTER_MODEL").or(non_empty(completion.model)) {
            settings.model = model;
        }
        if let Some(prompt) =
            var(env, "CHATRELAY_SYSTEM_PROMPT").or(non_empty(completion.system_prompt))
        {
            settings.system_prompt = prompt;
        }
        if let Some(max_tokens) = completion.max_tokens {
            settings.max_tokens = max_tokens;
        }
        if let Some(temperature) = completion.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::Invalid {
                    key: "completion.temperature",
                    value: temperature.to_string(),
                });
            }
            settings.temperature = temperature;
        }
        if let Some(penalty) = completion.presence_penalty {
            settings.presence_penalty = penalty;
        }
        if let Some(penalty) = completion.frequency_penalty {
            settings.frequency_penalty = penalty;
        }
        let timeout_secs = parse_var::<u64>(env, "CHATRELAY_COMPLETION_TIMEOUT_SECS")?
            .or(completion.timeout_secs)
            .unwrap_or(DEFAULT_COMPLETION_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "CHATRELAY_COMPLETION_TIMEOUT_SECS",
                value: timeout_secs.to_string(),
            });
        }
        settings.timeout = Duration::from_secs(timeout_secs);
        settings.app_referer = non_empty(completion.app_referer);
        settings.app_title = non_empty(completion.app_title);

        let server = ServerSettings {
            host: var(env, "HOST")
                .or(non_empty(server.host))
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_var::<u16>(env, "PORT")?
                .or(server.port)
                .unwrap_or(DEFAULT_PORT),
        };

        let max_length = parse_var::<usize>(env, "CHATRELAY_MAX_HISTORY")?
            .or(history.max_length)
            .unwrap_or(DEFAULT_MAX_HISTORY);
        if max_length == 0 {
            return Err(ConfigError::Invalid {
                key: "CHATRELAY_MAX_HISTORY",
                value: max_length.to_string(),
            });
        }

        Ok(Self {
            telegram,
            completion: settings,
            server,
            history: HistorySettings { max_length },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn var(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    non_empty(env(key))
}

fn parse_var<T: FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match var(env, key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(None),
    }
}

fn load_from_file(
    env: &impl Fn(&str) -> Option<String>,
) -> Result<Option<FileConfig>, ConfigError> {
    let path = match var(env, "CHATRELAY_CONFIG") {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => DEFAULT_CONFIG_FILE.to_string(),
        None => return Ok(None),
    };

    let contents = fs::read_to_string(&path).map_err(|err| ConfigError::File {
        path: path.clone(),
        reason: err.to_string(),
    })?;
    let parsed: FileConfig = toml::from_str(&contents).map_err(|err| ConfigError::File {
        path: path.clone(),
        reason: err.to_string(),
    })?;
    Ok(Some(parsed))
}

/// Telegram accepts 1-256 characters from `A-Z`, `a-z`, `0-9`, `_` and `-`.
fn is_valid_secret_token(secret: &str) -> bool {
    secret.len() <= MAX_SECRET_TOKEN_LEN
        && secret
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("OPENROUTER_API_KEY", "sk-or-test"),
        ]
    }

    #[test]
    fn test_defaults_with_required_secrets() {
        let config = RelayConfig::load_with(env_from(&required())).unwrap();

        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.completion.api_key, "sk-or-test");
        assert_eq!(config.completion.model, "openai/gpt-4o");
        assert_eq!(config.completion.base_url, OPENROUTER_BASE_URL);
        assert_eq!(config.completion.max_tokens, 1000);
        assert_eq!(config.completion.timeout, Duration::from_secs(60));
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.history.max_length, 20);
        assert_eq!(config.transport_mode(), TransportMode::Polling);
        assert!(config.webhook_endpoint().is_none());
    }

    #[test]
    fn test_missing_bot_token() {
        let err = RelayConfig::load_with(env_from(&[("OPENROUTER_API_KEY", "k")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("TELEGRAM_BOT_TOKEN")));
    }

    #[test]
    fn test_missing_api_key() {
        let err = RelayConfig::load_with(env_from(&[("TELEGRAM_BOT_TOKEN", "t")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("OPENROUTER_API_KEY")));
    }

    #[test]
    fn test_blank_secret_counts_as_missing() {
        let err = RelayConfig::load_with(env_from(&[
            ("TELEGRAM_BOT_TOKEN", "   "),
            ("OPENROUTER_API_KEY", "k"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("TELEGRAM_BOT_TOKEN")));
    }

    #[test]
    fn test_invalid_port() {
        let mut pairs = required();
        pairs.push(("PORT", "not-a-port"));
        let err = RelayConfig::load_with(env_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn test_zero_history_rejected() {
        let mut pairs = required();
        pairs.push(("CHATRELAY_MAX_HISTORY", "0"));
        let err = RelayConfig::load_with(env_from(&pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "CHATRELAY_MAX_HISTORY",
                ..
            }
        ));
    }

    #[test]
    fn test_webhook_mode() {
        let mut pairs = required();
        pairs.push(("WEBHOOK_URL", "https://relay.example.org/"));
        pairs.push(("TELEGRAM_WEBHOOK_SECRET", "s3cret"));
        let config = RelayConfig::load_with(env_from(&pairs)).unwrap();

        assert_eq!(config.transport_mode(), TransportMode::Webhook);
        assert_eq!(
            config.webhook_endpoint().as_deref(),
            Some("https://relay.example.org/webhook")
        );
        assert_eq!(config.telegram.webhook_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_webhook_mode_generates_missing_secret() {
        let mut pairs = required();
        pairs.push(("WEBHOOK_URL", "https://relay.example.org"));
        let config = RelayConfig::load_with(env_from(&pairs)).unwrap();

        let secret = config.telegram.webhook_secret.unwrap();
        assert_eq!(secret.len(), 32);
        assert!(is_valid_secret_token(&secret));

        let again = RelayConfig::load_with(env_from(&pairs)).unwrap();
        assert_ne!(again.telegram.webhook_secret.as_deref(), Some(secret.as_str()));
    }

    #[test]
    fn test_polling_mode_leaves_secret_unset() {
        let config = RelayConfig::load_with(env_from(&required())).unwrap();
        assert!(config.telegram.webhook_secret.is_none());
    }

    #[test]
    fn test_secret_with_forbidden_characters_rejected() {
        let mut pairs = required();
        pairs.push(("TELEGRAM_WEBHOOK_SECRET", "not allowed!"));
        let err = RelayConfig::load_with(env_from(&pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "TELEGRAM_WEBHOOK_SECRET",
                ..
            }
        ));
    }

    #[test]
    fn test_plain_http_webhook_rejected() {
        let mut pairs = required();
        pairs.push(("WEBHOOK_URL", "http://relay.example.org"));
        let err = RelayConfig::load_with(env_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "WEBHOOK_URL", .. }));
    }

    #[test]
    fn test_file_values_and_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[telegram]
bot_token = "file-token"

[completion]
api_key = "file-key"
model = "anthropic/claude-3.5-sonnet"
temperature = 0.2
app_title = "ChatRelay"

[server]
port = 8080

[history]
max_length = 6
"#
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = RelayConfig::load_with(env_from(&[
            ("CHATRELAY_CONFIG", path.as_str()),
            ("PORT", "9090"),
            ("OPENROUTER_MODEL", "openai/gpt-4o-mini"),
        ]))
        .unwrap();

        assert_eq!(config.telegram.bot_token, "file-token");
        assert_eq!(config.completion.api_key, "file-key");
        assert_eq!(config.completion.model, "openai/gpt-4o-mini");
        assert_eq!(config.completion.temperature, 0.2);
        assert_eq!(config.completion.app_title.as_deref(), Some("ChatRelay"));
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.history.max_length, 6);
    }

    #[test]
    fn test_unreadable_file_is_file_error() {
        let err = RelayConfig::load_with(env_from(&[(
            "CHATRELAY_CONFIG",
            "/definitely/not/here/chatrelay.toml",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::File { .. }));
    }

    #[test]
    fn test_malformed_file_is_file_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let err = RelayConfig::load_with(env_from(&[("CHATRELAY_CONFIG", path.as_str())]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::File { .. }));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = RelayConfig::load_with(env_from(&required())).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("123:abc"));
        assert!(!rendered.contains("sk-or-test"));
    }
}
