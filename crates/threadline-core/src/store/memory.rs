//! In-memory [`DocumentStore`] implementation for testing and embedding.
//!
//! Uses `HashMap`s keyed by `(user, id)` behind `std::sync::RwLock`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{Error, Result};
use crate::models::{DocumentRecord, Note, RecordStatus};

use super::DocumentStore;

type Key = (String, String);

fn key(user: &str, id: &str) -> Key {
    (user.to_string(), id.to_string())
}

fn poisoned<T>(_: T) -> Error {
    Error::Store("in-memory store lock poisoned".to_string())
}

/// In-memory store.
pub struct InMemoryStore {
    documents: RwLock<HashMap<Key, DocumentRecord>>,
    notes: RwLock<HashMap<Key, Note>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            notes: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn list_completed_documents(&self, user: &str) -> Result<Vec<DocumentRecord>> {
        let docs = self.documents.read().map_err(poisoned)?;
        let mut out: Vec<DocumentRecord> = docs
            .iter()
            .filter(|((u, _), d)| u == user && d.status == RecordStatus::Completed)
            .map(|(_, d)| d.clone())
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn get_document(&self, user: &str, id: &str) -> Result<Option<DocumentRecord>> {
        let docs = self.documents.read().map_err(poisoned)?;
        Ok(docs.get(&key(user, id)).cloned())
    }

    async fn put_document(&self, user: &str, doc: &DocumentRecord) -> Result<()> {
        let mut docs = self.documents.write().map_err(poisoned)?;
        docs.insert(key(user, &doc.id), doc.clone());
        Ok(())
    }

    async fn get_note(&self, user: &str, id: &str) -> Result<Option<Note>> {
        let notes = self.notes.read().map_err(poisoned)?;
        Ok(notes.get(&key(user, id)).cloned())
    }

    async fn get_or_create_note(&self, user: &str, id: &str) -> Result<Note> {
        let mut notes = self.notes.write().map_err(poisoned)?;
        Ok(notes
            .entry(key(user, id))
            .or_insert_with(|| Note::empty(id))
            .clone())
    }

    async fn mark_note_pending(&self, user: &str, id: &str, raw_text: &str) -> Result<()> {
        let mut notes = self.notes.write().map_err(poisoned)?;
        let note = notes.entry(key(user, id)).or_insert_with(|| Note::empty(id));
        note.raw_text = raw_text.to_string();
        note.status = RecordStatus::Pending;
        note.updated_at = Utc::now();
        Ok(())
    }

    async fn complete_note(&self, user: &str, note: &Note) -> Result<()> {
        let mut notes = self.notes.write().map_err(poisoned)?;
        let mut stored = note.clone();
        stored.status = RecordStatus::Completed;
        notes.insert(key(user, &note.id), stored);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, status: RecordStatus) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            status,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_lists_only_completed_for_user() {
        let store = InMemoryStore::new();
        store.put_document("u1", &doc("b", RecordStatus::Completed)).await.unwrap();
        store.put_document("u1", &doc("a", RecordStatus::Completed)).await.unwrap();
        store.put_document("u1", &doc("p", RecordStatus::Pending)).await.unwrap();
        store.put_document("u2", &doc("x", RecordStatus::Completed)).await.unwrap();

        let listed = store.list_completed_documents("u1").await.unwrap();
        let ids: Vec<_> = listed.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_get_or_create_note_defaults() {
        let store = InMemoryStore::new();
        assert!(store.get_note("u", "n").await.unwrap().is_none());
        let note = store.get_or_create_note("u", "n").await.unwrap();
        assert_eq!(note.status, RecordStatus::Completed);
        assert!(store.get_note("u", "n").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pending_then_completed() {
        let store = InMemoryStore::new();
        store.mark_note_pending("u", "n", "draft").await.unwrap();
        let pending = store.get_note("u", "n").await.unwrap().unwrap();
        assert_eq!(pending.status, RecordStatus::Pending);
        assert_eq!(pending.raw_text, "draft");

        store.complete_note("u", &pending).await.unwrap();
        let done = store.get_note("u", "n").await.unwrap().unwrap();
        assert_eq!(done.status, RecordStatus::Completed);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let store = InMemoryStore::new();
        store.mark_note_pending("alice", "n", "hers").await.unwrap();
        assert!(store.get_note("bob", "n").await.unwrap().is_none());
    }
}
