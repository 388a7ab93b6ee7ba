// Client catalog
// Read-only conversation sets published per client as `{client_id}-conversations.json`

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::SavedConversation;

pub fn catalog_path(dir: &Path, client_id: &str) -> PathBuf {
    dir.join(format!("{client_id}-conversations.json"))
}

/// Conversations published for one client
#[derive(Debug, Clone)]
pub struct ClientCatalog {
    client_id: String,
    conversations: Vec<SavedConversation>,
}

impl ClientCatalog {
    /// Load the client's file from `dir`. A missing or malformed file is an
    /// error naming the client; there is no partial result.
    pub fn load(dir: &Path, client_id: &str) -> Result<Self> {
        let path = catalog_path(dir, client_id);
        let fail = |reason: String| Error::Catalog {
            client_id: client_id.to_string(),
            path: path.clone(),
            reason,
        };

        let content = fs::read_to_string(&path).map_err(|e| fail(e.to_string()))?;
        let conversations: Vec<SavedConversation> =
            serde_json::from_str(&content).map_err(|e| fail(e.to_string()))?;

        tracing::info!(client_id, count = conversations.len(), "loaded client catalog");
        Ok(ClientCatalog {
            client_id: client_id.to_string(),
            conversations,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn conversations(&self) -> &[SavedConversation] {
        &self.conversations
    }

    /// Out-of-range indices select nothing
    pub fn get(&self, index: usize) -> Option<&SavedConversation> {
        self.conversations.get(index)
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaybackConfig;
    use crate::session::{PlaybackState, Session};
    use crate::types::Contact;
    use tempfile::TempDir;

    const ACME: &str = r#"[
        {
            "id": "1",
            "name": "Card activation",
            "steps": [
                {"text": "Activate your card?", "sender": "them", "buttons": [{"text": "Yes"}]}
            ],
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "2024-03-01T10:00:00Z",
            "contact": {"name": "Acme Bank", "avatar": "https://acme.test/logo.png"}
        }
    ]"#;

    #[test]
    fn test_load_and_select() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(catalog_path(dir.path(), "acme"), ACME)?;

        let catalog = ClientCatalog::load(dir.path(), "acme")?;
        assert_eq!(catalog.client_id(), "acme");
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get(1).is_none());

        let mut session = Session::new(Contact::default(), PlaybackConfig::default());
        if let Some(conversation) = catalog.get(0) {
            session.load_saved(conversation);
        }
        assert_eq!(session.contact().name, "Acme Bank");
        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(session.progress(), (0, 2));
        Ok(())
    }

    #[test]
    fn test_missing_file_is_catalog_error() -> Result<()> {
        let dir = TempDir::new()?;
        let err = ClientCatalog::load(dir.path(), "nobody").unwrap_err();
        match err {
            Error::Catalog { client_id, path, .. } => {
                assert_eq!(client_id, "nobody");
                assert!(path.ends_with("nobody-conversations.json"));
            }
            other => panic!("unexpected error: {other}"),
        }
        Ok(())
    }

    #[test]
    fn test_malformed_file_is_catalog_error() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(catalog_path(dir.path(), "acme"), "{\"not\": \"a list\"}")?;
        assert!(matches!(
            ClientCatalog::load(dir.path(), "acme"),
            Err(Error::Catalog { .. })
        ));
        Ok(())
    }
}
