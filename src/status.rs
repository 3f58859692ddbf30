//! Transient messages for the presenter's bottom line.
//!
//! Every message belongs to a [`Topic`]. Posting replaces whatever that topic
//! showed before, so an export result supersedes the export's start notice and
//! a successful reload clears the last load failure. The newest message owns
//! the line; when it expires or is dismissed the previous one shows again.

use std::time::{Duration, Instant};

const DEFAULT_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Deck,
    Export,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub tone: Tone,
    pub topic: Topic,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct StatusLine {
    messages: Vec<StatusMessage>,
    ttl: Duration,
}

impl Default for StatusLine {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusLine {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Errors stay up for twice `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            messages: Vec::new(),
            ttl,
        }
    }

    pub fn post(&mut self, topic: Topic, tone: Tone, text: impl Into<String>) {
        let ttl = match tone {
            Tone::Error => self.ttl * 2,
            Tone::Info | Tone::Warning => self.ttl,
        };
        self.messages.retain(|message| message.topic != topic);
        self.messages.push(StatusMessage {
            text: text.into(),
            tone,
            topic,
            expires_at: Instant::now() + ttl,
        });
    }

    pub fn info(&mut self, topic: Topic, text: impl Into<String>) {
        self.post(topic, Tone::Info, text);
    }

    pub fn warn(&mut self, topic: Topic, text: impl Into<String>) {
        self.post(topic, Tone::Warning, text);
    }

    pub fn error(&mut self, topic: Topic, text: impl Into<String>) {
        self.post(topic, Tone::Error, text);
    }

    /// Drop the message for `topic`, if any. Returns true if one was shown.
    pub fn clear(&mut self, topic: Topic) -> bool {
        let before = self.messages.len();
        self.messages.retain(|message| message.topic != topic);
        self.messages.len() != before
    }

    /// Drop expired messages. Returns true if the line changed.
    pub fn expire(&mut self) -> bool {
        self.expire_at(Instant::now())
    }

    fn expire_at(&mut self, now: Instant) -> bool {
        let before = self.messages.len();
        self.messages.retain(|message| message.expires_at > now);
        self.messages.len() != before
    }

    pub fn current(&self) -> Option<&StatusMessage> {
        self.messages.last()
    }

    pub fn dismiss(&mut self) -> bool {
        self.messages.pop().is_some()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
