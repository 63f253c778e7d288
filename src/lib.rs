//! Mail relay bot — collects an email address in chat and relays one
//! message to it over SMTP.

pub mod bot;
pub mod channels;
pub mod config;
pub mod error;
pub mod mailer;
