use std::sync::Arc;

use anyhow::Context;

use mail_relay_bot::bot::{RelayBot, SessionStore};
use mail_relay_bot::channels::{CliChannel, TelegramChannel};
use mail_relay_bot::config::{ChannelKind, RelayConfig};
use mail_relay_bot::mailer::SmtpDispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // A local .env is optional; real environment variables win
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env"),
    }

    let config = RelayConfig::from_env().context("Invalid configuration")?;

    eprintln!("📨 Mail Relay Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   SMTP: {}:{} as {}",
        config.smtp.host, config.smtp.port, config.smtp.login
    );
    eprintln!("   From: {}", config.smtp.from);
    eprintln!("   Send timeout: {}s", config.smtp.timeout.as_secs());

    let sessions = Arc::new(SessionStore::new());
    let dispatcher = Arc::new(SmtpDispatcher::new(config.smtp.clone()));
    let bot = RelayBot::new(sessions, dispatcher);

    match (config.channel, config.telegram) {
        (ChannelKind::Telegram, Some(telegram)) => {
            eprintln!(
                "   Telegram: enabled (allowed: {})\n",
                if telegram.allowed_users.iter().any(|u| u == "*") {
                    "everyone".to_string()
                } else {
                    telegram.allowed_users.join(", ")
                }
            );
            let channel = TelegramChannel::new(telegram);
            bot.run(&channel).await?;
        }
        (ChannelKind::Telegram, None) => {
            anyhow::bail!("Telegram channel selected but not configured");
        }
        (ChannelKind::Cli, _) => {
            eprintln!("   Channel: cli (enter an email, then the message to relay)\n");
            bot.run(&CliChannel::new(Arc::clone(bot.sessions()))).await?;
        }
    }

    Ok(())
}
