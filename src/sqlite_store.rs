//! SQLite-backed [`DocumentStore`].
//!
//! Records live in the `records` table as JSON bodies keyed by
//! `(user_id, collection, id)`. Document embeddings are kept out of the
//! JSON body and stored one row per vector in `document_embeddings` as
//! little-endian f32 BLOBs.

use std::collections::HashMap;
use std::fmt::Display;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use threadline_core::embedding::{blob_to_vec, vec_to_blob};
use threadline_core::models::{DocumentRecord, Note, RecordStatus};
use threadline_core::store::{DocumentStore, DOCUMENTS, NOTES};
use threadline_core::{Error, Result};

pub struct SqliteStore {
    pool: SqlitePool,
}

fn store_err(e: impl Display) -> Error {
    Error::Store(e.to_string())
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn read_body(&self, user: &str, collection: &str, id: &str) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT body_json FROM records WHERE user_id = ? AND collection = ? AND id = ?")
            .bind(user)
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)
    }

    async fn write_note(&self, user: &str, note: &Note) -> Result<()> {
        let body = serde_json::to_string(note).map_err(store_err)?;
        sqlx::query(
            r#"
            INSERT INTO records (user_id, collection, id, status, body_json, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, collection, id) DO UPDATE SET
                status = excluded.status,
                body_json = excluded.body_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user)
        .bind(NOTES)
        .bind(&note.id)
        .bind(note.status.as_str())
        .bind(&body)
        .bind(note.updated_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn load_embeddings(&self, user: &str, id: &str) -> Result<Vec<Vec<f32>>> {
        let rows = sqlx::query(
            "SELECT embedding FROM document_embeddings WHERE user_id = ? AND document_id = ? ORDER BY position ASC",
        )
        .bind(user)
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows
            .iter()
            .map(|row| blob_to_vec(&row.get::<Vec<u8>, _>("embedding")))
            .collect())
    }
}

fn parse_document(body: &str) -> Result<DocumentRecord> {
    serde_json::from_str(body).map_err(|e| Error::Store(format!("corrupt document record: {}", e)))
}

fn parse_note(body: &str) -> Result<Note> {
    serde_json::from_str(body).map_err(|e| Error::Store(format!("corrupt note record: {}", e)))
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn list_completed_documents(&self, user: &str) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(
            "SELECT body_json FROM records WHERE user_id = ? AND collection = ? AND status = ? ORDER BY id ASC",
        )
        .bind(user)
        .bind(DOCUMENTS)
        .bind(RecordStatus::Completed.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let vector_rows = sqlx::query(
            "SELECT document_id, embedding FROM document_embeddings WHERE user_id = ? ORDER BY document_id, position ASC",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut vectors: HashMap<String, Vec<Vec<f32>>> = HashMap::new();
        for row in &vector_rows {
            let document_id: String = row.get("document_id");
            let blob: Vec<u8> = row.get("embedding");
            vectors.entry(document_id).or_default().push(blob_to_vec(&blob));
        }

        rows.iter()
            .map(|row| {
                let mut doc = parse_document(&row.get::<String, _>("body_json"))?;
                doc.embeddings = vectors.remove(&doc.id).unwrap_or_default();
                Ok(doc)
            })
            .collect()
    }

    async fn get_document(&self, user: &str, id: &str) -> Result<Option<DocumentRecord>> {
        let Some(body) = self.read_body(user, DOCUMENTS, id).await? else {
            return Ok(None);
        };
        let mut doc = parse_document(&body)?;
        doc.embeddings = self.load_embeddings(user, id).await?;
        Ok(Some(doc))
    }

    async fn put_document(&self, user: &str, doc: &DocumentRecord) -> Result<()> {
        let body = serde_json::to_string(&DocumentRecord {
            embeddings: Vec::new(),
            ..doc.clone()
        })
        .map_err(store_err)?;
        let updated_at = doc.updated_at.unwrap_or_else(Utc::now).timestamp();

        let mut tx = self.pool.begin().await.map_err(store_err)?;

        sqlx::query(
            r#"
            INSERT INTO records (user_id, collection, id, status, body_json, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, collection, id) DO UPDATE SET
                status = excluded.status,
                body_json = excluded.body_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user)
        .bind(DOCUMENTS)
        .bind(&doc.id)
        .bind(doc.status.as_str())
        .bind(&body)
        .bind(updated_at)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        sqlx::query("DELETE FROM document_embeddings WHERE user_id = ? AND document_id = ?")
            .bind(user)
            .bind(&doc.id)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        for (position, vector) in doc.embeddings.iter().enumerate() {
            sqlx::query(
                "INSERT INTO document_embeddings (user_id, document_id, position, dims, embedding) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(user)
            .bind(&doc.id)
            .bind(position as i64)
            .bind(vector.len() as i64)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn get_note(&self, user: &str, id: &str) -> Result<Option<Note>> {
        self.read_body(user, NOTES, id)
            .await?
            .map(|body| parse_note(&body))
            .transpose()
    }

    async fn get_or_create_note(&self, user: &str, id: &str) -> Result<Note> {
        if let Some(note) = self.get_note(user, id).await? {
            return Ok(note);
        }
        let note = Note::empty(id);
        self.write_note(user, &note).await?;
        Ok(note)
    }

    async fn mark_note_pending(&self, user: &str, id: &str, raw_text: &str) -> Result<()> {
        let mut note = self.get_or_create_note(user, id).await?;
        note.raw_text = raw_text.to_string();
        note.status = RecordStatus::Pending;
        note.updated_at = Utc::now();
        self.write_note(user, &note).await
    }

    async fn complete_note(&self, user: &str, note: &Note) -> Result<()> {
        let note = Note {
            status: RecordStatus::Completed,
            ..note.clone()
        };
        self.write_note(user, &note).await
    }
}
