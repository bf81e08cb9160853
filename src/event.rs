//! Event - A single message delivered from a channel.
//!
//! Events are created only at the point of delivery, when a backend
//! decodes an incoming feed message or stream entry. Publishers send
//! raw payloads; they never construct events themselves.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A message delivered from a named channel.
///
/// Immutable once constructed, compared by value only.
///
/// # Example
///
/// ```ignore
/// let event = backend.next_event().await?;
/// println!("{} said {}", event.channel(), event.message());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    channel: String,
    message: String,
}

impl Event {
    /// Create a new event for a delivered message.
    pub fn new(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// The channel the message was delivered from.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The opaque message payload.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event(channel={}, message={})", self.channel, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_return_constructed_values() {
        let event = Event::new("news", "hello");
        assert_eq!(event.channel(), "news");
        assert_eq!(event.message(), "hello");
    }

    #[test]
    fn equality_is_by_value() {
        assert_eq!(Event::new("news", "hello"), Event::new("news", "hello"));
        assert_ne!(Event::new("news", "hello"), Event::new("news", "bye"));
        assert_ne!(Event::new("news", "hello"), Event::new("sport", "hello"));
    }

    #[test]
    fn display_includes_channel_and_message() {
        let event = Event::new("news", "hello");
        assert_eq!(format!("{}", event), "Event(channel=news, message=hello)");
    }

    #[test]
    fn payload_survives_any_encoding() {
        let event = Event::new("news", "payload with spaces, \"quotes\" and \u{1F980}");
        assert_eq!(event.message(), "payload with spaces, \"quotes\" and \u{1F980}");
    }
}
