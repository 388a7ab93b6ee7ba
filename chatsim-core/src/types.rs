// Core type definitions for chatsim
// Authored steps, delivered messages, and the contact shown in the phone header

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the chat a step or message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Me,
    Them,
}

/// Rendering kind of a step or message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Button,
    Interactive,
    Image,
}

/// Delivery status of a message bubble
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sending,
    #[default]
    Sent,
    Delivered,
    Read,
}

/// Presence shown under the contact name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    #[default]
    Online,
    Offline,
    Typing,
}

fn default_true() -> bool {
    true
}

/// Inline button attached to an authored step. Not playable on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageButton {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_true")]
    pub open_in_web_view: bool,
}

impl MessageButton {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: None,
            open_in_web_view: true,
        }
    }
}

/// One authored unit of a scripted conversation, as the editor produces it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStep {
    pub text: String,
    pub sender: Sender,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_business_message: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Milliseconds to wait before this step is delivered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighted_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_link_in_web_view: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<MessageButton>,
}

impl ConversationStep {
    /// Plain text step with every optional field unset
    pub fn new(text: impl Into<String>, sender: Sender) -> Self {
        Self {
            text: text.into(),
            sender,
            kind: None,
            is_business_message: None,
            button_text: None,
            options: Vec::new(),
            delay: None,
            highlighted_text: None,
            link: None,
            open_link_in_web_view: None,
            image_url: None,
            caption: None,
            buttons: Vec::new(),
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay = Some(delay_ms);
        self
    }

    pub fn with_kind(mut self, kind: MessageType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_buttons<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.buttons = labels.into_iter().map(MessageButton::new).collect();
        self
    }
}

/// A step after button expansion and type resolution: the unit actually played
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedStep {
    pub text: String,
    pub sender: Sender,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_business_message: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighted_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_link_in_web_view: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl ProcessedStep {
    pub fn is_button(&self) -> bool {
        self.kind == MessageType::Button
    }

    /// Whether delivering this step shows the typing indicator first
    pub fn shows_typing(&self) -> bool {
        self.sender == Sender::Them && !self.is_button()
    }

    /// Configured delay, falling back to `default_ms` when unset
    pub fn delay_ms(&self, default_ms: u64) -> u64 {
        self.delay.unwrap_or(default_ms)
    }
}

impl From<ProcessedStep> for ConversationStep {
    fn from(step: ProcessedStep) -> Self {
        ConversationStep {
            text: step.text,
            sender: step.sender,
            kind: Some(step.kind),
            is_business_message: step.is_business_message,
            button_text: step.button_text,
            options: step.options,
            delay: step.delay,
            highlighted_text: step.highlighted_text,
            link: step.link,
            open_link_in_web_view: step.open_link_in_web_view,
            image_url: step.image_url,
            caption: step.caption,
            buttons: Vec::new(),
        }
    }
}

/// A delivered chat bubble
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_business_message: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_link_in_web_view: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl Message {
    pub fn is_button(&self) -> bool {
        self.kind == MessageType::Button
    }
}

/// Partial update for a delivered message. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePatch {
    pub text: Option<String>,
    pub status: Option<MessageStatus>,
    pub is_business_message: Option<bool>,
    pub button_text: Option<String>,
    pub link: Option<String>,
    pub open_link_in_web_view: Option<bool>,
    pub image_url: Option<String>,
    pub caption: Option<String>,
}

impl MessagePatch {
    pub fn status(status: MessageStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub(crate) fn apply(self, message: &mut Message) {
        if let Some(text) = self.text {
            message.text = text;
        }
        if let Some(status) = self.status {
            message.status = status;
        }
        if let Some(flag) = self.is_business_message {
            message.is_business_message = Some(flag);
        }
        if let Some(button_text) = self.button_text {
            message.button_text = Some(button_text);
        }
        if let Some(link) = self.link {
            message.link = Some(link);
        }
        if let Some(flag) = self.open_link_in_web_view {
            message.open_link_in_web_view = Some(flag);
        }
        if let Some(image_url) = self.image_url {
            message.image_url = Some(image_url);
        }
        if let Some(caption) = self.caption {
            message.caption = Some(caption);
        }
    }
}

/// The chat partner shown in the phone header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: String,
    pub avatar: String,
    pub status: ContactStatus,
    pub last_seen: DateTime<Utc>,
}

impl Contact {
    pub fn new(name: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            avatar: avatar.into(),
            status: ContactStatus::Online,
            last_seen: Utc::now(),
        }
    }

    pub fn card(&self) -> ContactCard {
        ContactCard {
            name: self.name.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

impl Default for Contact {
    fn default() -> Self {
        Contact::new(
            "John Doe",
            "https://randomuser.me/api/portraits/men/32.jpg",
        )
    }
}

/// Contact snapshot stored alongside a saved conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactCard {
    pub name: String,
    pub avatar: String,
}

/// A named, persisted conversation. Steps are the raw authored list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedConversation {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(deserialize_with = "crate::normalize::deserialize_steps")]
    pub steps: Vec<ConversationStep>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    pub contact: ContactCard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_json_uses_camel_case_and_type() {
        let step = ConversationStep::new("Pay now", Sender::Them)
            .with_kind(MessageType::Button)
            .with_delay(0);
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["type"], "button");
        assert_eq!(json["sender"], "them");
        assert_eq!(json["delay"], 0);
        assert!(json.get("buttons").is_none());
        assert!(json.get("imageUrl").is_none());
    }

    #[test]
    fn test_step_parses_editor_json() {
        let raw = r#"{
            "text": "Is +91 984XXXXX34 linked?",
            "sender": "them",
            "isBusinessMessage": true,
            "highlightedText": "+91 984XXXXX34",
            "buttons": [{"text": "Yes"}, {"text": "Open", "url": "https://x.test", "openInWebView": false}]
        }"#;
        let step: ConversationStep = serde_json::from_str(raw).unwrap();
        assert_eq!(step.is_business_message, Some(true));
        assert_eq!(step.buttons.len(), 2);
        assert!(step.buttons[0].open_in_web_view);
        assert!(!step.buttons[1].open_in_web_view);
        assert_eq!(step.buttons[1].url.as_deref(), Some("https://x.test"));
    }

    #[test]
    fn test_patch_only_touches_set_fields() {
        let mut message = Message {
            id: "1".to_string(),
            text: "Hi".to_string(),
            sender: Sender::Me,
            timestamp: Utc::now(),
            status: MessageStatus::Sent,
            kind: MessageType::Text,
            is_business_message: None,
            button_text: None,
            link: None,
            open_link_in_web_view: None,
            image_url: None,
            caption: None,
        };
        MessagePatch::status(MessageStatus::Read).apply(&mut message);
        assert_eq!(message.status, MessageStatus::Read);
        assert_eq!(message.text, "Hi");
    }
}
