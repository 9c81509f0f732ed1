//! Conversation message history management.

use crate::types::{ModelMessage, Role};

/// How much history a conversation keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryRetention {
    /// Keep every turn. Memory grows with the conversation.
    #[default]
    Unbounded,
    /// Keep the most recent `n` turns (at least one).
    MaxTurns(usize),
}

/// Manages a conversation's message history.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ModelMessage>,
    retention: HistoryRetention,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: HistoryRetention) -> Self {
        Self {
            messages: Vec::new(),
            retention,
        }
    }

    pub fn retention(&self) -> HistoryRetention {
        self.retention
    }

    pub fn set_retention(&mut self, retention: HistoryRetention) {
        self.retention = retention;
        self.enforce_retention();
    }

    /// Add a user message.
    pub fn add_user_message(&mut self, text: impl Into<String>) {
        self.add_message(ModelMessage::user(text));
    }

    /// Add an assistant message.
    pub fn add_assistant_message(&mut self, text: impl Into<String>) {
        self.add_message(ModelMessage::assistant(text));
    }

    /// Add a raw message.
    pub fn add_message(&mut self, message: ModelMessage) {
        self.messages.push(message);
        self.enforce_retention();
    }

    /// Get all messages.
    pub fn messages(&self) -> &[ModelMessage] {
        &self.messages
    }

    /// Drop the latest message if it is a user turn with no reply.
    ///
    /// Agents call this when a turn fails, so history never holds two user
    /// turns in a row.
    pub fn discard_unanswered(&mut self) -> Option<ModelMessage> {
        match self.messages.last() {
            Some(last) if last.role == Role::User => self.messages.pop(),
            _ => None,
        }
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn enforce_retention(&mut self) {
        if let HistoryRetention::MaxTurns(max) = self.retention {
            let max = max.max(1);
            if self.messages.len() > max {
                let excess = self.messages.len() - max;
                self.messages.drain(..excess);
            }
        }
    }
}
