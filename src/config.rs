//! Configuration types, loaded once from the environment at startup.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use lettre::message::Mailbox;
use secrecy::SecretString;

use crate::error::ConfigError;

/// Subject line used for every relayed email unless overridden.
pub const DEFAULT_SUBJECT: &str = "Notification from Telegram bot";

/// Base URL of the public Telegram Bot API.
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Default deadline for one SMTP send, in seconds.
pub const DEFAULT_SMTP_TIMEOUT_SECS: u64 = 30;

/// Which transport the bot talks to users over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Telegram,
    Cli,
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "telegram" => Ok(Self::Telegram),
            "cli" => Ok(Self::Cli),
            other => Err(format!("unknown channel {other:?} (expected telegram or cli)")),
        }
    }
}

/// Outbound SMTP settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub login: String,
    pub password: SecretString,
    /// Sender mailbox, validated at load time.
    pub from: Mailbox,
    pub subject: String,
    /// Deadline for connect + authenticate + transmit.
    pub timeout: Duration,
}

/// Telegram Bot API settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_url: String,
    /// Usernames or numeric user ids; `*` allows everyone.
    pub allowed_users: Vec<String>,
}

/// Full bot configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub channel: ChannelKind,
    /// Present whenever `channel` is [`ChannelKind::Telegram`].
    pub telegram: Option<TelegramConfig>,
    pub smtp: SmtpConfig,
}

impl RelayConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// Required values that are missing or blank, and values that fail to
    /// parse, are reported here rather than at first use.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let channel = match optional(&lookup, "RELAY_CHANNEL") {
            Some(raw) => parse_value("RELAY_CHANNEL", &raw)?,
            None => ChannelKind::Telegram,
        };

        let telegram = match channel {
            ChannelKind::Telegram => Some(TelegramConfig {
                bot_token: SecretString::from(required(&lookup, "BOT_TOKEN")?),
                api_url: optional(&lookup, "TELEGRAM_API_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
                allowed_users: optional(&lookup, "TELEGRAM_ALLOWED_USERS")
                    .unwrap_or_else(|| "*".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            }),
            ChannelKind::Cli => None,
        };

        let host = required(&lookup, "SMTP_SERVER")?;
        let port: u16 = parse_value("SMTP_PORT", &required(&lookup, "SMTP_PORT")?)?;
        let login = required(&lookup, "SMTP_LOGIN")?;
        let password = SecretString::from(required(&lookup, "SMTP_PASSWORD")?);

        let from_raw = optional(&lookup, "SMTP_FROM").unwrap_or_else(|| login.clone());
        let from: Mailbox = parse_value("SMTP_FROM", &from_raw)?;

        let subject =
            optional(&lookup, "SMTP_SUBJECT").unwrap_or_else(|| DEFAULT_SUBJECT.to_string());

        let timeout_secs: u64 = match optional(&lookup, "SMTP_TIMEOUT_SECS") {
            Some(raw) => parse_value("SMTP_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_SMTP_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SMTP_TIMEOUT_SECS".into(),
                message: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            channel,
            telegram,
            smtp: SmtpConfig {
                host,
                port,
                login,
                password,
                from,
                subject,
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}
