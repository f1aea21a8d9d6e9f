//! Storage abstraction for Threadline.
//!
//! The [`DocumentStore`] trait covers the record operations the analysis
//! pipeline consumes and produces: reading the document corpus and reading
//! and writing notes. Records are addressed by user, collection and id;
//! the collection is implied by the method (documents or notes).
//!
//! There is no transactional guard between concurrent writers of the same
//! note: reads and conditional writes are separate calls and the last
//! writer wins.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{DocumentRecord, Note};

/// Collection holding stored reading material.
pub const DOCUMENTS: &str = "documents";
/// Collection holding scratchpad notes.
pub const NOTES: &str = "notes";

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_completed_documents`](DocumentStore::list_completed_documents) | Corpus for similarity matching |
/// | [`get_document`](DocumentStore::get_document) | Read one document |
/// | [`put_document`](DocumentStore::put_document) | Insert or replace a document |
/// | [`get_note`](DocumentStore::get_note) | Read one note |
/// | [`get_or_create_note`](DocumentStore::get_or_create_note) | Read a note, creating an empty completed one if absent |
/// | [`mark_note_pending`](DocumentStore::mark_note_pending) | Record new raw text before analysis |
/// | [`complete_note`](DocumentStore::complete_note) | Persist analysis results |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All completed documents of a user, with their embeddings.
    async fn list_completed_documents(&self, user: &str) -> Result<Vec<DocumentRecord>>;

    async fn get_document(&self, user: &str, id: &str) -> Result<Option<DocumentRecord>>;

    async fn put_document(&self, user: &str, doc: &DocumentRecord) -> Result<()>;

    async fn get_note(&self, user: &str, id: &str) -> Result<Option<Note>>;

    async fn get_or_create_note(&self, user: &str, id: &str) -> Result<Note>;

    /// Store `raw_text` with pending status, keeping the previous results.
    async fn mark_note_pending(&self, user: &str, id: &str, raw_text: &str) -> Result<()>;

    /// Store a completed note with all its fields.
    async fn complete_note(&self, user: &str, note: &Note) -> Result<()>;
}
