// Step editor
// Authoring operations over the raw conversation step list

use crate::config::PlaybackConfig;
use crate::error::{Error, Result};
use crate::normalize::parse_steps;
use crate::types::{ConversationStep, MessageButton, MessageType, Sender};

/// Default link target for steps that set a link without saying where it opens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkBehavior {
    #[default]
    WebView,
    NewTab,
}

/// A ready-made step offered by the editor
#[derive(Debug, Clone)]
pub struct StepTemplate {
    pub name: &'static str,
    pub step: ConversationStep,
}

pub fn step_templates() -> Vec<StepTemplate> {
    let mut question = ConversationStep::new("Do you want to proceed?", Sender::Them)
        .with_delay(1000)
        .with_kind(MessageType::Text)
        .with_buttons(["Yes", "No"]);
    question.is_business_message = Some(true);

    let info = ConversationStep::new("Here is some important information.", Sender::Them)
        .with_delay(1500)
        .with_kind(MessageType::Text);

    let mut action = ConversationStep::new("Click here", Sender::Them)
        .with_delay(0)
        .with_kind(MessageType::Button);
    action.is_business_message = Some(true);
    action.button_text = Some("Click here".to_string());

    vec![
        StepTemplate {
            name: "Question with Yes/No",
            step: question,
        },
        StepTemplate {
            name: "Information Message",
            step: info,
        },
        StepTemplate {
            name: "Action Button",
            step: action,
        },
    ]
}

/// Mutable authored step list
#[derive(Debug, Clone)]
pub struct StepEditor {
    steps: Vec<ConversationStep>,
    link_behavior: LinkBehavior,
    max_buttons: usize,
}

impl Default for StepEditor {
    fn default() -> Self {
        Self::new(&PlaybackConfig::default())
    }
}

impl StepEditor {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            steps: Vec::new(),
            link_behavior: LinkBehavior::default(),
            max_buttons: config.max_buttons_per_step,
        }
    }

    pub fn with_steps(mut self, steps: Vec<ConversationStep>) -> Self {
        self.steps = steps;
        self
    }

    pub fn steps(&self) -> &[ConversationStep] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<ConversationStep> {
        self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn link_behavior(&self) -> LinkBehavior {
        self.link_behavior
    }

    pub fn set_link_behavior(&mut self, behavior: LinkBehavior) {
        self.link_behavior = behavior;
    }

    /// Append an empty text step. Steps from the contact are business messages.
    pub fn add_step(&mut self, sender: Sender) -> usize {
        let mut step = ConversationStep::new("", sender)
            .with_delay(1000)
            .with_kind(MessageType::Text);
        step.is_business_message = Some(sender == Sender::Them);
        self.steps.push(step);
        self.steps.len() - 1
    }

    pub fn add_template(&mut self, template: &StepTemplate) -> usize {
        self.steps.push(template.step.clone());
        self.steps.len() - 1
    }

    /// Apply `edit` to one step.
    ///
    /// When the edit sets a link but leaves `open_link_in_web_view` alone,
    /// the editor's link behaviour fills it in.
    pub fn update_step<F>(&mut self, index: usize, edit: F) -> Result<()>
    where
        F: FnOnce(&mut ConversationStep),
    {
        let behavior = self.link_behavior;
        let step = self.step_mut(index)?;
        let link_before = step.link.clone();
        let target_before = step.open_link_in_web_view;

        edit(step);

        let link_set = step.link.as_deref().is_some_and(|l| !l.is_empty());
        if link_set && step.link != link_before && step.open_link_in_web_view == target_before {
            step.open_link_in_web_view = Some(behavior == LinkBehavior::WebView);
        }
        Ok(())
    }

    /// Append an inline button, returning its index within the step
    pub fn add_button(&mut self, index: usize, text: impl Into<String>, url: Option<String>) -> Result<usize> {
        let max = self.max_buttons;
        let step = self.step_mut(index)?;
        if step.buttons.len() >= max {
            return Err(Error::Edit(format!(
                "Maximum {max} buttons allowed per message"
            )));
        }
        let mut button = MessageButton::new(text);
        button.url = url;
        step.buttons.push(button);
        Ok(step.buttons.len() - 1)
    }

    pub fn update_button<F>(&mut self, index: usize, button: usize, edit: F) -> Result<()>
    where
        F: FnOnce(&mut MessageButton),
    {
        let step = self.step_mut(index)?;
        let target = step
            .buttons
            .get_mut(button)
            .ok_or_else(|| Error::Edit(format!("step {index} has no button {button}")))?;
        edit(target);
        Ok(())
    }

    pub fn remove_button(&mut self, index: usize, button: usize) -> Result<MessageButton> {
        let step = self.step_mut(index)?;
        if button >= step.buttons.len() {
            return Err(Error::Edit(format!("step {index} has no button {button}")));
        }
        Ok(step.buttons.remove(button))
    }

    /// Attach an empty image block, or drop the image and caption if present.
    /// Returns whether the step has an image afterwards.
    pub fn toggle_image(&mut self, index: usize) -> Result<bool> {
        let step = self.step_mut(index)?;
        if step.image_url.as_deref().is_some_and(|u| !u.is_empty()) {
            step.image_url = None;
            step.caption = None;
            return Ok(false);
        }
        step.image_url = Some(String::new());
        step.caption = Some(String::new());
        Ok(true)
    }

    /// Insert a copy right after the original
    pub fn duplicate(&mut self, index: usize) -> Result<usize> {
        let copy = self.step(index)?.clone();
        self.steps.insert(index + 1, copy);
        Ok(index + 1)
    }

    /// No-op on the first step
    pub fn move_up(&mut self, index: usize) -> Result<usize> {
        self.step(index)?;
        if index == 0 {
            return Ok(0);
        }
        self.steps.swap(index - 1, index);
        Ok(index - 1)
    }

    /// No-op on the last step
    pub fn move_down(&mut self, index: usize) -> Result<usize> {
        self.step(index)?;
        if index + 1 == self.steps.len() {
            return Ok(index);
        }
        self.steps.swap(index, index + 1);
        Ok(index + 1)
    }

    pub fn remove(&mut self, index: usize) -> Result<ConversationStep> {
        self.step(index)?;
        Ok(self.steps.remove(index))
    }

    /// Pretty JSON, the same shape `load_json` accepts
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.steps)?)
    }

    /// Replace the steps from JSON. On error the current steps are kept.
    pub fn load_json(&mut self, json: &str) -> Result<()> {
        self.steps = parse_steps(json)?;
        Ok(())
    }

    fn step(&self, index: usize) -> Result<&ConversationStep> {
        self.steps
            .get(index)
            .ok_or_else(|| Error::Edit(format!("no step at index {index}")))
    }

    fn step_mut(&mut self, index: usize) -> Result<&mut ConversationStep> {
        self.steps
            .get_mut(index)
            .ok_or_else(|| Error::Edit(format!("no step at index {index}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    #[test]
    fn test_add_step_by_sender() {
        let mut editor = StepEditor::default();
        editor.add_step(Sender::Them);
        editor.add_step(Sender::Me);

        let steps = editor.steps();
        assert_eq!(steps[0].is_business_message, Some(true));
        assert_eq!(steps[1].is_business_message, Some(false));
        assert_eq!(steps[0].delay, Some(1000));
        assert_eq!(steps[1].kind, Some(MessageType::Text));
    }

    #[test]
    fn test_templates() {
        let templates = step_templates();
        let names: Vec<_> = templates.iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec!["Question with Yes/No", "Information Message", "Action Button"]
        );

        let mut editor = StepEditor::default();
        editor.add_template(&templates[0]);
        let processed = normalize(editor.steps());
        let texts: Vec<_> = processed.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Do you want to proceed?", "Yes", "No"]);
        assert!(templates[0].step.buttons.iter().all(|b| b.open_in_web_view));
    }

    #[test]
    fn test_button_limit() {
        let mut editor = StepEditor::default();
        let i = editor.add_step(Sender::Them);
        for n in 0..5 {
            assert_eq!(editor.add_button(i, format!("b{n}"), None).unwrap(), n);
        }
        let err = editor.add_button(i, "extra", None).unwrap_err();
        assert!(err.to_string().contains("Maximum 5 buttons"));
        assert_eq!(editor.steps()[i].buttons.len(), 5);
    }

    #[test]
    fn test_update_and_remove_button() {
        let mut editor = StepEditor::default();
        let i = editor.add_step(Sender::Them);
        editor.add_button(i, "Open", None).unwrap();
        editor
            .update_button(i, 0, |b| {
                b.url = Some("https://example.com".to_string());
                b.open_in_web_view = false;
            })
            .unwrap();
        assert!(!editor.steps()[i].buttons[0].open_in_web_view);

        assert_eq!(editor.remove_button(i, 0).unwrap().text, "Open");
        assert!(editor.steps()[i].buttons.is_empty());
        assert!(editor.remove_button(i, 0).is_err());
    }

    #[test]
    fn test_link_behavior_applies_when_unset() {
        let mut editor = StepEditor::default();
        let i = editor.add_step(Sender::Them);
        editor.set_link_behavior(LinkBehavior::NewTab);

        editor
            .update_step(i, |s| s.link = Some("https://a.test".to_string()))
            .unwrap();
        assert_eq!(editor.steps()[i].open_link_in_web_view, Some(false));

        editor
            .update_step(i, |s| {
                s.link = Some("https://b.test".to_string());
                s.open_link_in_web_view = Some(true);
            })
            .unwrap();
        assert_eq!(editor.steps()[i].open_link_in_web_view, Some(true));

        editor.update_step(i, |s| s.text = "hi".to_string()).unwrap();
        assert_eq!(editor.steps()[i].open_link_in_web_view, Some(true));
    }

    #[test]
    fn test_toggle_image() {
        let mut editor = StepEditor::default();
        let i = editor.add_step(Sender::Them);
        assert!(editor.toggle_image(i).unwrap());
        assert_eq!(editor.steps()[i].image_url.as_deref(), Some(""));

        editor
            .update_step(i, |s| s.image_url = Some("https://img.test/a.png".to_string()))
            .unwrap();
        assert!(!editor.toggle_image(i).unwrap());
        assert!(editor.steps()[i].image_url.is_none());
        assert!(editor.steps()[i].caption.is_none());
    }

    #[test]
    fn test_reorder_duplicate_remove() {
        let mut editor = StepEditor::default().with_steps(vec![
            ConversationStep::new("a", Sender::Them),
            ConversationStep::new("b", Sender::Me),
        ]);
        assert_eq!(editor.duplicate(0).unwrap(), 1);
        assert_eq!(editor.move_down(1).unwrap(), 2);
        assert_eq!(editor.move_down(2).unwrap(), 2);
        assert_eq!(editor.move_up(0).unwrap(), 0);

        let texts: Vec<_> = editor.steps().iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "a"]);

        assert_eq!(editor.remove(1).unwrap().text, "b");
        assert_eq!(editor.len(), 2);
        assert!(matches!(editor.remove(9), Err(Error::Edit(_))));
    }

    #[test]
    fn test_json_round_trip_keeps_steps_on_error() {
        let mut editor = StepEditor::default();
        let i = editor.add_step(Sender::Them);
        editor.add_button(i, "Yes", None).unwrap();

        let json = editor.to_json().unwrap();
        assert!(json.contains("\"isBusinessMessage\": true"));

        let mut other = StepEditor::default();
        other.load_json(&json).unwrap();
        assert_eq!(other.steps(), editor.steps());

        assert!(other.load_json("{ not json").is_err());
        assert_eq!(other.len(), 1);
    }
}
