//! CLI channel — drives one local conversation from the terminal.
//!
//! The prompt tracks the conversation: `email>` until an address has been
//! captured, `message>` while the bot waits for the text to relay.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;

use crate::bot::SessionStore;
use crate::channels::{Channel, ChatId, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

/// Chat id used for the single local conversation.
pub const CLI_CHAT_ID: &str = "local";

/// Terminal channel for trying the bot without Telegram.
pub struct CliChannel {
    sessions: Arc<SessionStore>,
    chat_id: ChatId,
}

impl CliChannel {
    /// `sessions` must be the store the bot writes to; the prompt reads it.
    pub fn new(sessions: Arc<SessionStore>) -> Self {
        Self {
            sessions,
            chat_id: ChatId::from(CLI_CHAT_ID),
        }
    }

    async fn prompt(&self) -> &'static str {
        prompt_for(self.sessions.has_email(&self.chat_id).await)
    }
}

fn prompt_for(awaiting_message: bool) -> &'static str {
    if awaiting_message {
        "message> "
    } else {
        "email> "
    }
}

/// Forward each non-blank line as a message until EOF, a read error, or the
/// receiver going away. Returns how many were forwarded.
async fn forward_lines<R>(reader: R, chat_id: ChatId, tx: UnboundedSender<IncomingMessage>) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Error reading stdin");
                break;
            }
        };

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if tx
            .send(IncomingMessage::new("cli", chat_id.clone(), text))
            .is_err()
        {
            break;
        }
        forwarded += 1;
    }

    forwarded
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let chat_id = self.chat_id.clone();

        eprint!("{}", self.prompt().await);
        tokio::spawn(async move {
            let forwarded = forward_lines(BufReader::new(tokio::io::stdin()), chat_id, tx).await;
            tracing::debug!(forwarded, "stdin closed");
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        println!("\n{}\n", response.content);
        eprint!("{}", self.prompt().await);
        Ok(())
    }
}
