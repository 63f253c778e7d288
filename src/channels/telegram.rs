//! Telegram channel — long-polls the Bot API for updates.
//!
//! Talks to the Bot API directly over reqwest: `getUpdates` for inbound
//! text messages, `sendMessage` for replies and `getMe` as the startup
//! health check.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::config::TelegramConfig;
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Server-side long-poll timeout passed to `getUpdates`.
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed poll before trying again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Envelope every Bot API method responds with.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    api_base: String,
    allowed_users: Vec<String>,
    poll_timeout_secs: u64,
    client: reqwest::Client,
    shutdown: Arc<AtomicBool>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            bot_token: config.bot_token,
            api_base: config.api_url,
            allowed_users: config.allowed_users,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            client: reqwest::Client::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Override the `getUpdates` long-poll timeout.
    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    fn api_url(&self, method: &str) -> String {
        method_url(&self.api_base, self.bot_token.expose_secret(), method)
    }

    /// Send a plain-text message, split to fit Telegram's 4096 char limit.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_message_chunk(chat_id, &chunk).await?;
        }
        Ok(())
    }

    async fn send_message_chunk(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("sendMessage returned {status}: {err}"),
            });
        }

        Ok(())
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let allowed_users = self.allowed_users.clone();
        let poll_timeout = self.poll_timeout_secs;
        let client = self.client.clone();
        let shutdown = Arc::clone(&self.shutdown);

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                if shutdown.load(Ordering::Relaxed) {
                    tracing::info!("Telegram poll loop shutting down");
                    return;
                }

                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": poll_timeout,
                    "allowed_updates": ["message"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        // reqwest errors carry the URL, which embeds the token
                        tracing::warn!(error = %e.without_url(), "Telegram poll error");
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                let data: ApiResponse<Vec<serde_json::Value>> = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!(error = %e.without_url(), "Telegram parse error");
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                if !data.ok {
                    tracing::warn!(
                        description = data.description.as_deref().unwrap_or("unknown"),
                        "Telegram getUpdates rejected"
                    );
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    continue;
                }

                for update in data.result.unwrap_or_default() {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64)
                    {
                        offset = uid + 1;
                    }

                    let Some(incoming) = message_from_update(&update, &allowed_users) else {
                        continue;
                    };

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        self.send_message(msg.chat_id.as_str(), &response.content)
            .await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::HealthCheckFailed {
                name: "telegram".into(),
                reason: e.without_url().to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::HealthCheckFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        self.shutdown.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn method_url(base: &str, token: &str, method: &str) -> String {
    format!("{base}/bot{token}/{method}")
}

/// Turn one `getUpdates` entry into an inbound message.
///
/// Returns `None` for non-message updates, non-text messages and senders
/// outside the allowlist.
fn message_from_update(
    update: &serde_json::Value,
    allowed_users: &[String],
) -> Option<IncomingMessage> {
    let message = update.get("message")?;
    let text = message.get("text").and_then(serde_json::Value::as_str)?;
    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(serde_json::Value::as_i64)?;

    let from = message.get("from");
    let username = from
        .and_then(|f| f.get("username"))
        .and_then(|u| u.as_str())
        .unwrap_or("unknown");
    let user_id = from
        .and_then(|f| f.get("id"))
        .and_then(serde_json::Value::as_i64)
        .map(|id| id.to_string());

    // Check allowlist against both username and numeric ID
    let mut identities = vec![username];
    if let Some(ref id) = user_id {
        identities.push(id.as_str());
    }
    if !check_user_allowed(allowed_users, identities) {
        tracing::warn!(
            username,
            user_id = user_id.as_deref().unwrap_or("unknown"),
            "Telegram: ignoring message from unauthorized user"
        );
        return None;
    }

    let first_name = from
        .and_then(|f| f.get("first_name"))
        .and_then(|n| n.as_str())
        .unwrap_or(username);

    Some(
        IncomingMessage::new("telegram", chat_id, text)
            .with_user_name(first_name)
            .with_metadata(serde_json::json!({
                "username": username,
                "user_id": user_id,
            })),
    )
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts on a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut cut = max_len;
        while !remaining.is_char_boundary(cut) {
            cut -= 1;
        }
        let chunk = &remaining[..cut];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .filter(|&pos| pos > 0)
            .unwrap_or(cut);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
