// Terminal rendering
// Prints the phone view as plain lines: header status, bubbles, buttons

use chatsim_core::{Contact, ContactStatus, Message, MessageStatus, MessageType, Sender, SessionView};

pub fn status_line(contact: &Contact) -> String {
    match contact.status {
        ContactStatus::Online => format!("{} · online", contact.name),
        ContactStatus::Typing => format!("{} · typing...", contact.name),
        ContactStatus::Offline => format!(
            "{} · last seen {}",
            contact.name,
            contact.last_seen.format("%H:%M")
        ),
    }
}

fn ticks(status: MessageStatus) -> &'static str {
    match status {
        MessageStatus::Sending => "…",
        MessageStatus::Sent => "✓",
        MessageStatus::Delivered => "✓✓",
        MessageStatus::Read => "✓✓ read",
    }
}

pub fn bubble(message: &Message) -> String {
    let time = message.timestamp.format("%H:%M");
    let body = match message.kind {
        MessageType::Button => {
            let label = message.button_text.as_deref().unwrap_or(&message.text);
            match &message.link {
                Some(link) if !link.is_empty() => format!("[ {label} ] -> {link}"),
                _ => format!("[ {label} ]"),
            }
        }
        MessageType::Image => {
            let url = message.image_url.as_deref().unwrap_or_default();
            let mut out = format!("[image {url}]");
            if let Some(caption) = message.caption.as_deref().filter(|c| !c.is_empty()) {
                out.push_str(&format!(" {caption}"));
            }
            if !message.text.is_empty() {
                out.push_str(&format!("\n      {}", message.text));
            }
            out
        }
        MessageType::Text | MessageType::Interactive => message.text.clone(),
    };

    match message.sender {
        Sender::Them => format!("  < {body}  {time}"),
        Sender::Me => format!("{:>8} {body}  {time} {}", ">", ticks(message.status)),
    }
}

/// Prints only what changed since the previous view
#[derive(Debug, Default)]
pub struct ViewPrinter {
    printed: Vec<String>,
    status: Option<String>,
}

impl ViewPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print(&mut self, view: &SessionView) {
        let ids: Vec<&str> = view.messages.iter().map(|m| m.id.as_str()).collect();
        let is_prefix = self.printed.len() <= ids.len()
            && self.printed.iter().zip(&ids).all(|(a, b)| a == b);

        if !is_prefix {
            println!("──── {} message(s) on screen ────", view.messages.len());
            self.printed.clear();
        }

        let status = status_line(&view.contact);
        if self.status.as_deref() != Some(status.as_str()) {
            println!("  ({status})");
            self.status = Some(status);
        }

        for message in &view.messages[self.printed.len()..] {
            println!("{}", bubble(message));
        }
        self.printed = ids.into_iter().map(str::to_string).collect();
    }
}
