//! Relay bot — collects an email address, then relays one message to it.
//!
//! Per-chat flow:
//!
//! ```text
//! NEW ──email──▶ AWAITING_MESSAGE ──any text──▶ (send, session cleared) NEW
//! ```
//!
//! `/start` answers with the greeting in any state and changes nothing.
//! Messages are handled one at a time by [`RelayBot::run`]; the session
//! store is still lock-guarded and hands a session out exactly once.

pub mod replies;
pub mod router;
pub mod session;

pub use replies::Reply;
pub use router::{Entry, Router, is_email_shaped};
pub use session::{ChatSession, SessionStore};

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::channels::{Channel, ChatId, OutgoingResponse};
use crate::error::ChannelError;
use crate::mailer::EmailDispatcher;

/// The bot: router, session store and email dispatcher.
pub struct RelayBot {
    sessions: Arc<SessionStore>,
    dispatcher: Arc<dyn EmailDispatcher>,
    router: Router,
}

impl RelayBot {
    pub fn new(sessions: Arc<SessionStore>, dispatcher: Arc<dyn EmailDispatcher>) -> Self {
        Self {
            sessions,
            dispatcher,
            router: Router::standard(),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Route one inbound text and run its entry point.
    ///
    /// Returns `None` when nothing handles the text (unknown commands).
    pub async fn handle(&self, chat_id: &ChatId, text: &str) -> Option<Reply> {
        match self.router.route(text) {
            Some(Entry::Start) => Some(self.on_start(chat_id).await),
            Some(Entry::Email) => Some(self.on_email(chat_id, text).await),
            Some(Entry::Message) => Some(self.on_message(chat_id, text).await),
            None => {
                debug!(chat_id = %chat_id, "Ignoring unhandled command");
                None
            }
        }
    }

    /// `/start`: greet and ask for an address. State is untouched.
    pub async fn on_start(&self, chat_id: &ChatId) -> Reply {
        info!(chat_id = %chat_id, "Conversation started");
        Reply::Greeting
    }

    /// Email-shaped text.
    ///
    /// Without a session the address is stored verbatim. With a session the
    /// text is the message body, so it is relayed like any other text.
    pub async fn on_email(&self, chat_id: &ChatId, text: &str) -> Reply {
        if self.sessions.has_email(chat_id).await {
            return self.on_message(chat_id, text).await;
        }

        if !is_email_shaped(text) {
            return Reply::InvalidEmail;
        }

        self.sessions.record_email(chat_id, text).await;
        info!(chat_id = %chat_id, "Email accepted, awaiting message");
        Reply::EmailAccepted
    }

    /// Any other text.
    ///
    /// With a session: send the email, then report the outcome. The session
    /// is removed before sending, so it is gone whether or not the send
    /// succeeds. Without one: ask for the address.
    pub async fn on_message(&self, chat_id: &ChatId, text: &str) -> Reply {
        let Some(email) = self.sessions.take(chat_id).await else {
            return if text.contains('@') {
                Reply::InvalidEmail
            } else {
                Reply::EmailRequired
            };
        };

        match self.dispatcher.send(&email, text).await {
            Ok(()) => {
                info!(chat_id = %chat_id, "Message relayed");
                Reply::Sent
            }
            Err(e) => {
                error!(chat_id = %chat_id, error = %e, "Failed to relay message");
                Reply::SendFailed
            }
        }
    }

    /// Serve `channel` until Ctrl+C or until its stream ends.
    ///
    /// Fails only if the channel cannot start; per-message errors are logged
    /// and the loop continues. Remaining sessions are dropped on exit.
    pub async fn run(&self, channel: &dyn Channel) -> Result<(), ChannelError> {
        channel.health_check().await?;
        let mut message_stream = channel.start().await?;

        info!(channel = channel.name(), "Relay bot ready and listening");

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            info!("Channel stream ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            debug!(
                message_id = %message.id,
                channel = %message.channel,
                chat_id = %message.chat_id,
                user = message.user_name.as_deref().unwrap_or("-"),
                received_at = %message.received_at,
                "Handling message"
            );

            let Some(reply) = self.handle(&message.chat_id, &message.content).await else {
                continue;
            };

            if let Err(e) = channel
                .respond(&message, OutgoingResponse::text(reply.text()))
                .await
            {
                warn!(chat_id = %message.chat_id, error = %e, "Failed to deliver reply");
            }
        }

        channel.shutdown().await?;

        let dropped = self.sessions.clear_all().await;
        if dropped > 0 {
            info!(dropped, "Discarded unfinished sessions");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::channels::{IncomingMessage, MessageStream};
    use crate::error::DispatchError;

    /// Records every send; fails them all when `fail` is set.
    #[derive(Default)]
    struct StubDispatcher {
        fail: bool,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl StubDispatcher {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EmailDispatcher for StubDispatcher {
        async fn send(&self, to: &str, body: &str) -> Result<(), DispatchError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), body.to_string()));
            if self.fail {
                Err(DispatchError::Transport("535 authentication failed".into()))
            } else {
                Ok(())
            }
        }
    }

    fn bot_with(dispatcher: Arc<StubDispatcher>) -> RelayBot {
        RelayBot::new(Arc::new(SessionStore::new()), dispatcher)
    }

    fn chat(id: i64) -> ChatId {
        ChatId::from(id)
    }

    // ── Scenarios ───────────────────────────────────────────────────

    #[tokio::test]
    async fn start_greets_and_leaves_tracker_alone() {
        let bot = bot_with(Arc::new(StubDispatcher::default()));

        assert_eq!(bot.handle(&chat(1), "/start").await, Some(Reply::Greeting));
        assert!(bot.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn start_does_not_reset_pending_session() {
        let bot = bot_with(Arc::new(StubDispatcher::default()));

        bot.handle(&chat(1), "user@example.com").await;
        assert_eq!(bot.handle(&chat(1), "/start").await, Some(Reply::Greeting));
        assert!(bot.sessions().has_email(&chat(1)).await);
    }

    #[tokio::test]
    async fn non_email_without_session_reprompts() {
        let bot = bot_with(Arc::new(StubDispatcher::default()));

        assert_eq!(
            bot.handle(&chat(1), "not-an-email").await,
            Some(Reply::EmailRequired)
        );
        assert!(!bot.sessions().has_email(&chat(1)).await);
    }

    #[tokio::test]
    async fn address_attempt_without_dot_asks_for_valid_email() {
        let bot = bot_with(Arc::new(StubDispatcher::default()));

        assert_eq!(bot.handle(&chat(1), "a@b").await, Some(Reply::InvalidEmail));
        assert!(bot.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn email_is_stored_verbatim() {
        let bot = bot_with(Arc::new(StubDispatcher::default()));

        assert_eq!(
            bot.handle(&chat(1), "User.Name+tag@Example.COM").await,
            Some(Reply::EmailAccepted)
        );
        assert_eq!(
            bot.sessions().get_email(&chat(1)).await.as_deref(),
            Some("User.Name+tag@Example.COM")
        );
    }

    #[tokio::test]
    async fn text_around_address_is_accepted_and_stored_as_sent() {
        let bot = bot_with(Arc::new(StubDispatcher::default()));

        for (id, text) in [
            (1, "user@example.com extra"),
            (2, "write to user@example.com"),
        ] {
            assert_eq!(
                bot.handle(&chat(id), text).await,
                Some(Reply::EmailAccepted)
            );
            assert_eq!(
                bot.sessions().get_email(&chat(id)).await.as_deref(),
                Some(text)
            );
        }
    }

    #[tokio::test]
    async fn successful_relay_clears_session() {
        let dispatcher = Arc::new(StubDispatcher::default());
        let bot = bot_with(Arc::clone(&dispatcher));

        bot.handle(&chat(1), "user@example.com").await;
        assert_eq!(bot.handle(&chat(1), "Hello world").await, Some(Reply::Sent));

        assert_eq!(
            dispatcher.sent(),
            vec![("user@example.com".to_string(), "Hello world".to_string())]
        );
        assert!(!bot.sessions().has_email(&chat(1)).await);
        assert_eq!(
            bot.handle(&chat(1), "Hello again").await,
            Some(Reply::EmailRequired)
        );
        assert_eq!(dispatcher.sent().len(), 1);
    }

    #[tokio::test]
    async fn failed_relay_still_clears_session() {
        let dispatcher = Arc::new(StubDispatcher::failing());
        let bot = bot_with(Arc::clone(&dispatcher));

        bot.handle(&chat(1), "user@example.com").await;
        assert_eq!(
            bot.handle(&chat(1), "Hello world").await,
            Some(Reply::SendFailed)
        );

        assert_eq!(dispatcher.sent().len(), 1);
        assert!(!bot.sessions().has_email(&chat(1)).await);
    }

    // ── Edge cases ──────────────────────────────────────────────────

    #[tokio::test]
    async fn email_shaped_text_while_awaiting_message_is_relayed() {
        let dispatcher = Arc::new(StubDispatcher::default());
        let bot = bot_with(Arc::clone(&dispatcher));

        bot.handle(&chat(1), "first@example.com").await;
        assert_eq!(
            bot.handle(&chat(1), "second@example.com").await,
            Some(Reply::Sent)
        );
        assert_eq!(
            dispatcher.sent(),
            vec![(
                "first@example.com".to_string(),
                "second@example.com".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn on_email_rejects_non_email_called_directly() {
        let bot = bot_with(Arc::new(StubDispatcher::default()));

        assert_eq!(
            bot.on_email(&chat(1), "user@localhost").await,
            Reply::InvalidEmail
        );
        assert!(bot.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn unknown_command_gets_no_reply() {
        let dispatcher = Arc::new(StubDispatcher::default());
        let bot = bot_with(Arc::clone(&dispatcher));

        bot.handle(&chat(1), "user@example.com").await;
        assert_eq!(bot.handle(&chat(1), "/help").await, None);
        assert!(bot.sessions().has_email(&chat(1)).await);
        assert!(dispatcher.sent().is_empty());
    }

    #[tokio::test]
    async fn chats_do_not_share_sessions() {
        let dispatcher = Arc::new(StubDispatcher::default());
        let bot = bot_with(Arc::clone(&dispatcher));

        bot.handle(&chat(1), "one@example.com").await;
        assert_eq!(
            bot.handle(&chat(2), "Hello").await,
            Some(Reply::EmailRequired)
        );
        assert!(bot.sessions().has_email(&chat(1)).await);
        assert!(dispatcher.sent().is_empty());
    }

    // ── Run loop ────────────────────────────────────────────────────

    /// Replays a fixed script, then ends the stream.
    struct ScriptedChannel {
        script: Vec<IncomingMessage>,
        replies: Mutex<Vec<(ChatId, String)>>,
    }

    impl ScriptedChannel {
        fn new(script: &[(i64, &str)]) -> Self {
            Self {
                script: script
                    .iter()
                    .map(|(id, text)| IncomingMessage::new("scripted", *id, text))
                    .collect(),
                replies: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Channel for ScriptedChannel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            Ok(Box::pin(futures::stream::iter(self.script.clone())))
        }

        async fn respond(
            &self,
            msg: &IncomingMessage,
            response: OutgoingResponse,
        ) -> Result<(), ChannelError> {
            self.replies
                .lock()
                .unwrap()
                .push((msg.chat_id.clone(), response.content));
            Ok(())
        }
    }

    #[tokio::test]
    async fn run_replies_in_order_and_drops_leftover_sessions() {
        let dispatcher = Arc::new(StubDispatcher::default());
        let bot = bot_with(Arc::clone(&dispatcher));
        let channel = ScriptedChannel::new(&[
            (1, "/start"),
            (1, "user@example.com"),
            (2, "other@example.com"),
            (1, "/unknown"),
            (1, "Hello world"),
        ]);

        bot.run(&channel).await.unwrap();

        let replies = channel.replies.lock().unwrap().clone();
        assert_eq!(
            replies,
            vec![
                (chat(1), Reply::Greeting.text().to_string()),
                (chat(1), Reply::EmailAccepted.text().to_string()),
                (chat(2), Reply::EmailAccepted.text().to_string()),
                (chat(1), Reply::Sent.text().to_string()),
            ]
        );
        assert_eq!(dispatcher.sent().len(), 1);
        // Chat 2 never sent a message; its session is discarded on exit
        assert!(bot.sessions().is_empty().await);
    }
}
