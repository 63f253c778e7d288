//! Message router — classifies inbound text and picks an entry point.
//!
//! Commands are matched by name only and never fall through to text
//! routes. Other text goes to the first matching text route, then to the
//! fallback.

use std::sync::LazyLock;

use regex::Regex;

/// Something, `@`, something, a dot, something. Searched for anywhere in
/// the text, not anchored.
static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^@]+@[^@]+\.[^@]+").expect("email shape regex is valid"));

/// Whether `text` looks like it holds an email address.
///
/// The only address check in the crate: routing and acceptance both call
/// this. It is loose on purpose and the accepted text is stored verbatim;
/// the SMTP layer does the real address parsing.
pub fn is_email_shaped(text: &str) -> bool {
    text.contains('@') && text.contains('.') && EMAIL_SHAPE.is_match(text)
}

/// The bot's entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    /// `/start`
    Start,
    /// Email-shaped text.
    Email,
    /// Any other text.
    Message,
}

#[derive(Clone)]
enum Matcher {
    Command(String),
    Text(fn(&str) -> bool),
    Fallback,
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Command(name) => write!(f, "Command(/{name})"),
            Self::Text(_) => f.write_str("Text(..)"),
            Self::Fallback => f.write_str("Fallback"),
        }
    }
}

/// Ordered routing table.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<(Matcher, Entry)>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bot's routing table: `/start`, email-shaped text, everything else.
    pub fn standard() -> Self {
        Self::new()
            .command("start", Entry::Start)
            .text(is_email_shaped, Entry::Email)
            .fallback(Entry::Message)
    }

    /// Route `/name` (case-insensitive) to `entry`.
    pub fn command(mut self, name: &str, entry: Entry) -> Self {
        self.routes
            .push((Matcher::Command(name.to_lowercase()), entry));
        self
    }

    /// Route non-command text accepted by `matcher` to `entry`.
    pub fn text(mut self, matcher: fn(&str) -> bool, entry: Entry) -> Self {
        self.routes.push((Matcher::Text(matcher), entry));
        self
    }

    /// Route any remaining non-command text to `entry`.
    pub fn fallback(mut self, entry: Entry) -> Self {
        self.routes.push((Matcher::Fallback, entry));
        self
    }

    /// Pick the entry point for `text`, or `None` if nothing handles it.
    pub fn route(&self, text: &str) -> Option<Entry> {
        if let Some(command) = parse_command(text) {
            return self.routes.iter().find_map(|(matcher, entry)| match matcher {
                Matcher::Command(name) if *name == command => Some(*entry),
                _ => None,
            });
        }

        self.routes
            .iter()
            .find_map(|(matcher, entry)| match matcher {
                Matcher::Text(accepts) if accepts(text) => Some(*entry),
                Matcher::Fallback => Some(*entry),
                _ => None,
            })
    }
}

/// Extract the lowercase command name from `/name[@bot] [args]`.
fn parse_command(text: &str) -> Option<String> {
    let rest = text.trim_start().strip_prefix('/')?;
    let token = rest.split_whitespace().next().unwrap_or("");
    let name = token.split('@').next().unwrap_or("");
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase())
}
