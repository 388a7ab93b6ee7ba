// Static preview
// Renders the whole authored list at once, without timing or typing

use chrono::Utc;

use crate::error::{Error, Result};
use crate::message::MessageFactory;
use crate::normalize::normalize;
use crate::types::{ConversationStep, Message};

/// Every message the steps would produce, in playback order.
///
/// Ids are `preview-{step}` for the step itself and
/// `preview-{step}-btn-{button}` for its buttons.
pub fn preview(steps: &[ConversationStep]) -> Result<Vec<Message>> {
    if steps.is_empty() {
        return Err(Error::EmptyConversation);
    }

    let now = Utc::now();
    let mut factory = MessageFactory::new();
    let mut messages = Vec::new();

    for (i, step) in steps.iter().enumerate() {
        let expanded = normalize(std::iter::once(step));
        for (j, processed) in expanded.iter().enumerate() {
            let mut message = factory.build(processed, now);
            message.id = match j {
                0 => format!("preview-{i}"),
                _ => format!("preview-{i}-btn-{}", j - 1),
            };
            messages.push(message);
        }
    }

    Ok(messages)
}
