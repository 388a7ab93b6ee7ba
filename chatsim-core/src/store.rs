// Saved conversations
// Named step lists persisted as one JSON array under a single key

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{ContactCard, ConversationStep, SavedConversation};

pub const STORAGE_KEY: &str = "whatsapp-saved-conversations";

/// String key/value persistence, the shape a browser's local storage has
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Key/value table in a SQLite file
pub struct SqliteKv {
    conn: Connection,
}

impl SqliteKv {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    /// `~/.local/share/chatsim/store.sqlite`
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".local/share/chatsim/store.sqlite")
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(SqliteKv { conn })
    }
}

impl KeyValueStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO kv (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: HashMap<String, String>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// A conversation about to be saved; the store assigns id and timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct NewConversation {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<ConversationStep>,
    pub contact: ContactCard,
}

/// Fields to overwrite on update; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct ConversationPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub steps: Option<Vec<ConversationStep>>,
    pub contact: Option<ContactCard>,
}

/// Outcome of a successful import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    /// Records that passed validation
    pub valid: usize,
    /// Records in the file
    pub total: usize,
    /// Valid records actually added (ids already stored are skipped)
    pub added: usize,
}

impl ImportReport {
    pub fn is_partial(&self) -> bool {
        self.valid < self.total
    }

    /// User-facing note for partial imports
    pub fn warning(&self) -> Option<String> {
        self.is_partial()
            .then(|| format!("Imported {} of {} conversations", self.valid, self.total))
    }
}

pub struct ConversationStore<S: KeyValueStore> {
    backend: S,
}

impl<S: KeyValueStore> ConversationStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn into_inner(self) -> S {
        self.backend
    }

    /// Every valid stored conversation. Unreadable storage yields an empty
    /// list; invalid records are dropped with a warning.
    pub fn get_all(&self) -> Result<Vec<SavedConversation>> {
        let Some(raw) = self.backend.get(STORAGE_KEY)? else {
            return Ok(Vec::new());
        };
        let parsed: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, "stored conversations are not valid JSON");
                return Ok(Vec::new());
            }
        };
        let Value::Array(records) = parsed else {
            tracing::error!("stored conversations are not an array");
            return Ok(Vec::new());
        };
        Ok(records
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| validate_record(index, record))
            .collect())
    }

    pub fn get(&self, id: &str) -> Result<Option<SavedConversation>> {
        Ok(self.get_all()?.into_iter().find(|c| c.id == id))
    }

    pub fn save(&mut self, conversation: NewConversation) -> Result<SavedConversation> {
        let mut all = self.get_all()?;
        let now = Utc::now();

        let mut stamp = now.timestamp_millis();
        while all.iter().any(|c| c.id == stamp.to_string()) {
            stamp += 1;
        }

        let saved = SavedConversation {
            id: stamp.to_string(),
            name: conversation.name,
            description: conversation.description,
            steps: conversation.steps,
            created_at: now,
            updated_at: now,
            contact: conversation.contact,
        };
        all.push(saved.clone());
        self.write(&all)?;
        tracing::info!(id = %saved.id, name = %saved.name, "saved conversation");
        Ok(saved)
    }

    /// Returns `None` when no conversation has `id`
    pub fn update(&mut self, id: &str, patch: ConversationPatch) -> Result<Option<SavedConversation>> {
        let mut all = self.get_all()?;
        let Some(target) = all.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };

        if let Some(name) = patch.name {
            target.name = name;
        }
        if let Some(description) = patch.description {
            target.description = Some(description);
        }
        if let Some(steps) = patch.steps {
            target.steps = steps;
        }
        if let Some(contact) = patch.contact {
            target.contact = contact;
        }
        target.updated_at = Utc::now();

        let updated = target.clone();
        self.write(&all)?;
        Ok(Some(updated))
    }

    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let all = self.get_all()?;
        let before = all.len();
        let kept: Vec<_> = all.into_iter().filter(|c| c.id != id).collect();
        if kept.len() == before {
            return Ok(false);
        }
        self.write(&kept)?;
        Ok(true)
    }

    pub fn delete_all(&mut self) -> Result<()> {
        self.backend.remove(STORAGE_KEY)
    }

    /// Pretty JSON array of every stored conversation
    pub fn export(&self) -> Result<String> {
        let all = self.get_all()?;
        if all.is_empty() {
            return Err(Error::Transfer(
                "No conversations available to export.".to_string(),
            ));
        }
        Ok(serde_json::to_string_pretty(&all)?)
    }

    /// Merge conversations from an exported file. Ids already stored keep
    /// their existing record.
    pub fn import(&mut self, json: &str) -> Result<ImportReport> {
        if json.trim().is_empty() {
            return Err(Error::Transfer("The file is empty.".to_string()));
        }
        let parsed: Value = serde_json::from_str(json)
            .map_err(|e| Error::Transfer(format!("Invalid JSON format: {e}")))?;
        let Value::Array(records) = parsed else {
            return Err(Error::Transfer(
                "Invalid format: Expected an array of conversations.".to_string(),
            ));
        };

        let total = records.len();
        let valid: Vec<SavedConversation> = records
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| validate_record(index, record))
            .collect();
        if valid.is_empty() {
            return Err(Error::Transfer(
                "No valid conversations found in the file.".to_string(),
            ));
        }

        let mut all = self.get_all()?;
        let valid_count = valid.len();
        let mut added = 0;
        for conversation in valid {
            if all.iter().any(|c| c.id == conversation.id) {
                continue;
            }
            all.push(conversation);
            added += 1;
        }
        self.write(&all)?;

        let report = ImportReport {
            valid: valid_count,
            total,
            added,
        };
        tracing::info!(valid = report.valid, total, added, "imported conversations");
        Ok(report)
    }

    fn write(&mut self, all: &[SavedConversation]) -> Result<()> {
        let json = serde_json::to_string(all)?;
        self.backend.set(STORAGE_KEY, &json)
    }
}

/// Fields of one stored record that fail the shape check
fn failed_fields(record: &Value) -> Vec<&'static str> {
    let is_string = |v: Option<&Value>| v.is_some_and(Value::is_string);
    let non_empty = |v: Option<&Value>| v.and_then(Value::as_str).is_some_and(|s| !s.is_empty());
    let date_ok = |v: Option<&Value>| match v {
        None => true,
        Some(v) => v
            .as_str()
            .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok()),
    };
    let contact = record.get("contact");

    let checks = [
        ("id", is_string(record.get("id"))),
        ("name", is_string(record.get("name"))),
        ("contact", contact.is_some_and(Value::is_object)),
        ("contactName", non_empty(contact.and_then(|c| c.get("name")))),
        ("contactAvatar", non_empty(contact.and_then(|c| c.get("avatar")))),
        ("steps", record.get("steps").is_some_and(Value::is_array)),
        ("createdAt", date_ok(record.get("createdAt"))),
        ("updatedAt", date_ok(record.get("updatedAt"))),
    ];
    checks
        .into_iter()
        .filter(|(_, ok)| !ok)
        .map(|(field, _)| field)
        .collect()
}

fn validate_record(index: usize, record: Value) -> Option<SavedConversation> {
    let failed = failed_fields(&record);
    if !failed.is_empty() {
        tracing::warn!(index, ?failed, "dropping invalid conversation");
        return None;
    }
    match serde_json::from_value(record) {
        Ok(conversation) => Some(conversation),
        Err(e) => {
            tracing::warn!(index, error = %e, "dropping unreadable conversation");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sender;
    use tempfile::TempDir;

    fn card() -> ContactCard {
        ContactCard {
            name: "Bank".to_string(),
            avatar: "https://bank.test/a.png".to_string(),
        }
    }

    fn new_conversation(name: &str) -> NewConversation {
        NewConversation {
            name: name.to_string(),
            description: None,
            steps: vec![ConversationStep::new("Hello", Sender::Them)],
            contact: card(),
        }
    }

    fn memory_store() -> ConversationStore<MemoryKv> {
        ConversationStore::new(MemoryKv::new())
    }

    #[test]
    fn test_save_assigns_unique_ids() -> Result<()> {
        let mut store = memory_store();
        let a = store.save(new_conversation("a"))?;
        let b = store.save(new_conversation("b"))?;
        assert_ne!(a.id, b.id);
        assert_eq!(a.created_at, a.updated_at);
        assert_eq!(store.get_all()?.len(), 2);
        assert_eq!(store.get(&b.id)?.map(|c| c.name), Some("b".to_string()));
        Ok(())
    }

    #[test]
    fn test_update_merges_and_bumps_timestamp() -> Result<()> {
        let mut store = memory_store();
        let saved = store.save(new_conversation("draft"))?;
        let patch = ConversationPatch {
            name: Some("final".to_string()),
            ..Default::default()
        };
        let updated = store.update(&saved.id, patch)?.unwrap();
        assert_eq!(updated.name, "final");
        assert_eq!(updated.steps, saved.steps);
        assert!(updated.updated_at >= saved.updated_at);
        assert!(store.update("missing", ConversationPatch::default())?.is_none());
        Ok(())
    }

    #[test]
    fn test_delete_and_delete_all() -> Result<()> {
        let mut store = memory_store();
        let saved = store.save(new_conversation("a"))?;
        store.save(new_conversation("b"))?;
        assert!(store.delete(&saved.id)?);
        assert!(!store.delete(&saved.id)?);
        assert_eq!(store.get_all()?.len(), 1);

        store.delete_all()?;
        assert!(store.get_all()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_invalid_records_are_dropped() -> Result<()> {
        let mut kv = MemoryKv::new();
        let raw = serde_json::json!([
            {"id": "1", "name": "ok", "steps": [], "contact": {"name": "A", "avatar": "x"},
             "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"},
            {"id": 2, "name": "bad id", "steps": [], "contact": {"name": "A", "avatar": "x"}},
            {"id": "3", "name": "no avatar", "steps": [], "contact": {"name": "A", "avatar": ""}}
        ]);
        kv.set(STORAGE_KEY, &raw.to_string())?;
        let store = ConversationStore::new(kv);

        let all = store.get_all()?;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "1");
        Ok(())
    }

    #[test]
    fn test_failed_fields_lists_each_problem() {
        let record = serde_json::json!({"id": 1, "steps": {}, "createdAt": "yesterday"});
        assert_eq!(
            failed_fields(&record),
            vec!["id", "name", "contact", "contactName", "contactAvatar", "steps", "createdAt"]
        );
    }

    #[test]
    fn test_corrupt_storage_reads_as_empty() -> Result<()> {
        let mut kv = MemoryKv::new();
        kv.set(STORAGE_KEY, "{ nope")?;
        assert!(ConversationStore::new(kv).get_all()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_export_requires_conversations() -> Result<()> {
        let mut store = memory_store();
        let err = store.export().unwrap_err();
        assert_eq!(err.to_string(), "No conversations available to export.");

        store.save(new_conversation("a"))?;
        let json = store.export()?;
        assert!(json.contains("\"createdAt\""));
        Ok(())
    }

    #[test]
    fn test_import_error_messages() {
        let mut store = memory_store();
        let message = |json: &str, store: &mut ConversationStore<MemoryKv>| {
            store.import(json).unwrap_err().to_string()
        };
        assert_eq!(message("  ", &mut store), "The file is empty.");
        assert!(message("{oops", &mut store).starts_with("Invalid JSON format: "));
        assert_eq!(
            message("{\"id\": \"1\"}", &mut store),
            "Invalid format: Expected an array of conversations."
        );
        assert_eq!(
            message("[{\"id\": 1}]", &mut store),
            "No valid conversations found in the file."
        );
    }

    #[test]
    fn test_import_merges_by_id_and_reports_partial() -> Result<()> {
        let mut source = memory_store();
        let kept = source.save(new_conversation("from export"))?;
        let exported = source.export()?;

        let mut target = memory_store();
        let mut existing = target.save(new_conversation("local"))?;
        existing.id = kept.id.clone();
        target.write(&[existing])?;

        let mut records: Vec<Value> = serde_json::from_str(&exported)?;
        records.push(serde_json::json!({"id": "x"}));
        records.push(serde_json::json!({
            "id": "fresh", "name": "fresh", "steps": [null, {"text": "hi", "sender": "me"}],
            "contact": {"name": "A", "avatar": "x"}
        }));
        let report = target.import(&Value::Array(records).to_string())?;

        assert_eq!(report, ImportReport { valid: 2, total: 3, added: 1 });
        assert_eq!(report.warning().as_deref(), Some("Imported 2 of 3 conversations"));

        let all = target.get_all()?;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "local", "existing record is not overwritten");
        assert_eq!(all[1].steps.len(), 1, "null step entries are skipped");
        Ok(())
    }

    #[test]
    fn test_sqlite_backend_persists() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested/store.sqlite");

        let mut store = ConversationStore::new(SqliteKv::open(&path)?);
        let saved = store.save(new_conversation("persisted"))?;
        drop(store);

        let reopened = ConversationStore::new(SqliteKv::open(&path)?);
        assert_eq!(reopened.get(&saved.id)?.map(|c| c.name), Some("persisted".to_string()));
        Ok(())
    }

    #[test]
    fn test_sqlite_kv_roundtrip() -> Result<()> {
        let mut kv = SqliteKv::open_in_memory()?;
        assert_eq!(kv.get("k")?, None);
        kv.set("k", "one")?;
        kv.set("k", "two")?;
        assert_eq!(kv.get("k")?.as_deref(), Some("two"));
        kv.remove("k")?;
        assert_eq!(kv.get("k")?, None);
        Ok(())
    }
}
