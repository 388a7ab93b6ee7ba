// Message construction
// Turns processed steps into delivered messages with unique ids and highlight formatting

use chrono::{DateTime, Utc};

use crate::types::{Message, MessageStatus, ProcessedStep};

/// Wrap the first occurrence of `highlighted` in bold markers.
///
/// Text is returned unchanged when there is nothing to highlight or the
/// highlight does not occur in it.
pub fn apply_highlight(text: &str, highlighted: Option<&str>) -> String {
    match highlighted {
        Some(h) if !h.is_empty() && text.contains(h) => text.replacen(h, &format!("*{h}*"), 1),
        _ => text.to_string(),
    }
}

/// Builds messages from processed steps.
///
/// Ids combine the creation millisecond with a per-factory sequence number,
/// so a batch created in one tick still gets distinct, ordered ids.
#[derive(Debug, Default)]
pub struct MessageFactory {
    seq: u64,
}

impl MessageFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self, at: DateTime<Utc>) -> String {
        self.seq += 1;
        format!("{}-{}", at.timestamp_millis(), self.seq)
    }

    /// Create the delivered message for `step`, timestamped `at`
    pub fn build(&mut self, step: &ProcessedStep, at: DateTime<Utc>) -> Message {
        Message {
            id: self.next_id(at),
            text: apply_highlight(&step.text, step.highlighted_text.as_deref()),
            sender: step.sender,
            timestamp: at,
            status: MessageStatus::Sent,
            kind: step.kind,
            is_business_message: step.is_business_message,
            button_text: step.button_text.clone(),
            link: step.link.clone(),
            open_link_in_web_view: step.open_link_in_web_view,
            image_url: step.image_url.clone(),
            caption: step.caption.clone(),
        }
    }

    /// Build a whole batch sharing one timestamp
    pub fn build_batch(&mut self, steps: &[ProcessedStep], at: DateTime<Utc>) -> Vec<Message> {
        steps.iter().map(|step| self.build(step, at)).collect()
    }
}
