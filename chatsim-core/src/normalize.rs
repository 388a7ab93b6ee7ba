// Step normalization
// Expands inline buttons into standalone button steps and resolves each step's type

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};
use crate::types::{ConversationStep, MessageType, ProcessedStep};

/// Expand authored steps into the list that is actually played.
///
/// Every step is emitted with `buttons` stripped and its type resolved
/// (`image` when it carries a non-empty image URL, otherwise its own type or
/// `text`), immediately followed by one `button` step per inline button.
/// N steps carrying B buttons in total always yield N + B processed steps.
pub fn normalize<'a, I>(steps: I) -> Vec<ProcessedStep>
where
    I: IntoIterator<Item = &'a ConversationStep>,
{
    let mut processed = Vec::new();

    for step in steps {
        processed.push(ProcessedStep {
            text: step.text.clone(),
            sender: step.sender,
            kind: resolve_kind(step),
            is_business_message: step.is_business_message,
            button_text: step.button_text.clone(),
            options: step.options.clone(),
            delay: step.delay,
            highlighted_text: step.highlighted_text.clone(),
            link: step.link.clone(),
            open_link_in_web_view: step.open_link_in_web_view,
            image_url: step.image_url.clone(),
            caption: step.caption.clone(),
        });

        for button in &step.buttons {
            processed.push(ProcessedStep {
                text: button.text.clone(),
                sender: step.sender,
                kind: MessageType::Button,
                is_business_message: Some(true),
                button_text: Some(button.text.clone()),
                options: Vec::new(),
                delay: Some(0),
                highlighted_text: None,
                link: button.url.clone(),
                open_link_in_web_view: Some(button.open_in_web_view),
                image_url: None,
                caption: None,
            });
        }
    }

    processed
}

fn resolve_kind(step: &ConversationStep) -> MessageType {
    let has_image = step
        .image_url
        .as_deref()
        .is_some_and(|url| !url.is_empty());
    if has_image {
        MessageType::Image
    } else {
        step.kind.unwrap_or_default()
    }
}

/// Parse an editor JSON step list.
///
/// `null` entries are skipped with a warning; anything else that is not a
/// well-formed step rejects the whole list so bad data never reaches playback.
pub fn parse_steps(json: &str) -> Result<Vec<ConversationStep>> {
    if json.trim().is_empty() {
        return Err(Error::InvalidSteps("the step list is empty".to_string()));
    }
    let raw: Vec<Option<ConversationStep>> =
        serde_json::from_str(json).map_err(|e| Error::InvalidSteps(e.to_string()))?;
    Ok(drop_nulls(raw))
}

/// Serde helper for step arrays that may contain `null` holes
pub(crate) fn deserialize_steps<'de, D>(deserializer: D) -> std::result::Result<Vec<ConversationStep>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Option<ConversationStep>>::deserialize(deserializer)?;
    Ok(drop_nulls(raw))
}

fn drop_nulls(raw: Vec<Option<ConversationStep>>) -> Vec<ConversationStep> {
    let total = raw.len();
    let steps: Vec<ConversationStep> = raw.into_iter().flatten().collect();
    if steps.len() < total {
        tracing::warn!(skipped = total - steps.len(), "skipping null step entries");
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageButton, Sender};

    fn sample() -> Vec<ConversationStep> {
        let mut image = ConversationStep::new("Look", Sender::Them);
        image.image_url = Some("https://img.test/a.png".to_string());
        image.caption = Some("a cat".to_string());

        let mut question = ConversationStep::new("Pick one", Sender::Them).with_buttons(["Yes", "No"]);
        question.highlighted_text = Some("one".to_string());
        question.delay = Some(1500);

        vec![
            ConversationStep::new("Hi", Sender::Them).with_delay(0),
            question,
            image,
            ConversationStep::new("Sure", Sender::Me),
        ]
    }

    #[test]
    fn test_expansion_count_and_order() {
        let steps = sample();
        let processed = normalize(&steps);

        assert_eq!(processed.len(), 4 + 2);
        let texts: Vec<&str> = processed.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Hi", "Pick one", "Yes", "No", "Look", "Sure"]);
        assert_eq!(processed[2].kind, MessageType::Button);
        assert_eq!(processed[3].kind, MessageType::Button);
    }

    #[test]
    fn test_button_steps_inherit_and_copy() {
        let mut step = ConversationStep::new("Open?", Sender::Me);
        step.buttons = vec![MessageButton {
            text: "Open".to_string(),
            url: Some("https://bank.test".to_string()),
            open_in_web_view: false,
        }];
        let processed = normalize(&[step]);

        let button = &processed[1];
        assert_eq!(button.sender, Sender::Me);
        assert_eq!(button.delay, Some(0));
        assert_eq!(button.is_business_message, Some(true));
        assert_eq!(button.button_text.as_deref(), Some("Open"));
        assert_eq!(button.link.as_deref(), Some("https://bank.test"));
        assert_eq!(button.open_link_in_web_view, Some(false));
    }

    #[test]
    fn test_type_resolution() {
        let processed = normalize(&sample());
        assert_eq!(processed[0].kind, MessageType::Text);
        assert_eq!(processed[4].kind, MessageType::Image);
        assert_eq!(processed[4].caption.as_deref(), Some("a cat"));

        // Empty image URL is the editor's placeholder, not an image
        let mut placeholder = ConversationStep::new("x", Sender::Them).with_kind(MessageType::Interactive);
        placeholder.image_url = Some(String::new());
        assert_eq!(normalize(&[placeholder])[0].kind, MessageType::Interactive);
    }

    #[test]
    fn test_preserves_untransformed_fields() {
        let processed = normalize(&sample());
        let parent = &processed[1];
        assert_eq!(parent.delay, Some(1500));
        assert_eq!(parent.highlighted_text.as_deref(), Some("one"));
        assert_eq!(parent.sender, Sender::Them);
    }

    #[test]
    fn test_idempotent_on_own_output() {
        let once = normalize(&sample());
        let as_steps: Vec<ConversationStep> = once.iter().cloned().map(Into::into).collect();
        assert!(as_steps.iter().all(|s| s.buttons.is_empty()));
        let twice = normalize(&as_steps);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_scenario_pick_one() {
        let steps = vec![ConversationStep::new("Pick one", Sender::Them).with_buttons(["Yes", "No"])];
        let processed = normalize(&steps);
        let kinds: Vec<MessageType> = processed.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![MessageType::Text, MessageType::Button, MessageType::Button]
        );
    }

    #[test]
    fn test_parse_steps_skips_nulls() {
        let json = r#"[{"text":"Hi","sender":"them"}, null, {"text":"Yo","sender":"me","delay":0}]"#;
        let steps = parse_steps(json).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].delay, Some(0));
    }

    #[test]
    fn test_parse_steps_rejects_malformed() {
        assert!(matches!(parse_steps("[{\"text\":\"no sender\"}]"), Err(Error::InvalidSteps(_))));
        assert!(matches!(parse_steps("{not json"), Err(Error::InvalidSteps(_))));
        assert!(matches!(parse_steps("   "), Err(Error::InvalidSteps(_))));
        assert!(matches!(parse_steps("{\"text\":\"x\"}"), Err(Error::InvalidSteps(_))));
    }
}
