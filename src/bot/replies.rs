//! User-facing reply texts.

/// Every reply the bot can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Answer to `/start`.
    Greeting,
    /// Email stored, waiting for the message body.
    EmailAccepted,
    /// Text looked like an address attempt but isn't one.
    InvalidEmail,
    /// Text arrived before any address was given.
    EmailRequired,
    /// The email went out.
    Sent,
    /// The email could not be sent. Details stay in the logs.
    SendFailed,
}

impl Reply {
    pub fn text(self) -> &'static str {
        match self {
            Self::Greeting => "Hello! Please enter your email address.",
            Self::EmailAccepted => {
                "Email accepted. Now please write the text of the message to send."
            }
            Self::InvalidEmail => "Please enter a valid email (for example, user@example.com).",
            Self::EmailRequired => "Please enter your email first.",
            Self::Sent => "Your message was sent to the given email.",
            Self::SendFailed => "Failed to send the message. Please try again later.",
        }
    }
}

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}
