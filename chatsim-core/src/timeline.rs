// Message timeline
// Ordered log of delivered messages that the display renders

use crate::types::{Message, MessagePatch};

/// Append-only log of delivered messages, apart from explicit delete/clear
/// and trailing removal by the manual stepper.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    messages: Vec<Message>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a batch in one update
    pub fn extend(&mut self, batch: Vec<Message>) {
        self.messages.extend(batch);
    }

    /// Number of consecutive button messages at the end of the log
    pub fn trailing_button_run(&self) -> usize {
        self.messages
            .iter()
            .rev()
            .take_while(|m| m.is_button())
            .count()
    }

    /// Remove the last `count` messages, returning how many were removed
    pub fn truncate_tail(&mut self, count: usize) -> usize {
        let removed = count.min(self.messages.len());
        self.messages.truncate(self.messages.len() - removed);
        removed
    }

    /// Remove one message by id. Returns false when no message matched.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.id != id);
        self.messages.len() < before
    }

    /// Update a message in place without changing order or count
    pub fn update(&mut self, id: &str, patch: MessagePatch) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                patch.apply(message);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}
