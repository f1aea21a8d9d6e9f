//! Full analysis pipeline and note update.
//!
//! ```text
//! raw text ─▶ segment ─▶ evaluate_units ─▶ group ─▶ synthesize_all ─┐
//!                                                                   │ (per suggestion, concurrent)
//!        related ids ◀─ confirm ◀─ match_candidates ◀─ embed inquiry ┘
//! ```
//!
//! Concurrent phases use fail-fast joins: one failing branch fails the run
//! and nothing partial is persisted.
//!
//! The same pipeline serves free-text search ([`NotePipeline::search`]),
//! and [`NotePipeline::add_document`] grows the corpus it searches.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::{try_join, try_join_all};
use tracing::{debug, info};

use crate::analyze::evaluate_units;
use crate::confirm::confirm;
use crate::document::{analyze_document, embedding_texts};
use crate::embedding::{embed_query, Embedder};
use crate::error::{Error, Result};
use crate::generation::StructuredGenerator;
use crate::group::group;
use crate::models::{DocumentRecord, Note, RecordStatus, Suggestion, TextUnit};
use crate::segment::{segment, segment_fingerprint};
use crate::similarity::{find_candidates, MatchOptions};
use crate::store::DocumentStore;
use crate::synthesize::synthesize_all;

/// Result of analyzing one text.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// One suggestion per narrative group, in group order, each carrying
    /// its confirmed related documents.
    pub suggestions: Vec<Suggestion>,
    /// Union of all confirmed document ids, first occurrence order.
    pub related_document_ids: Vec<String>,
}

/// Outcome of [`NotePipeline::update_note`].
#[derive(Debug, Clone)]
pub struct NoteUpdate {
    pub note: Note,
    /// True when the text segmented like the last completed text and the
    /// cached note was returned without any external call.
    pub reused: bool,
}

/// Wires the external collaborators into the analysis pipeline.
#[derive(Clone)]
pub struct NotePipeline {
    generator: Arc<dyn StructuredGenerator>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
    options: MatchOptions,
}

impl NotePipeline {
    pub fn new(
        generator: Arc<dyn StructuredGenerator>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        options: MatchOptions,
    ) -> Self {
        Self {
            generator,
            embedder,
            store,
            options,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Run the pipeline on `raw_text` against the user's document corpus.
    /// Nothing is persisted.
    pub async fn analyze_text(&self, user: &str, raw_text: &str) -> Result<Analysis> {
        let (analysis, _corpus) = self.analyze_against_corpus(user, raw_text).await?;
        Ok(analysis)
    }

    /// Find the user's documents related to a free-text query, in the
    /// order the analysis confirmed them.
    pub async fn search(&self, user: &str, query: &str) -> Result<Vec<DocumentRecord>> {
        let (analysis, corpus) = self.analyze_against_corpus(user, query).await?;
        let documents: Vec<DocumentRecord> = analysis
            .related_document_ids
            .iter()
            .filter_map(|id| corpus.iter().find(|d| &d.id == id).cloned())
            .collect();
        info!(user, results = documents.len(), "search completed");
        Ok(documents)
    }

    /// Analysis plus the corpus it was matched against. Empty text returns
    /// an empty analysis and corpus without touching any collaborator.
    async fn analyze_against_corpus(
        &self,
        user: &str,
        raw_text: &str,
    ) -> Result<(Analysis, Vec<DocumentRecord>)> {
        let units: Vec<TextUnit> = segment(raw_text)
            .into_iter()
            .filter(|u| !u.text.is_empty())
            .collect();
        if units.is_empty() {
            return Ok((Analysis::default(), Vec::new()));
        }

        let evaluations = evaluate_units(&*self.generator, &units).await?;
        let groups = group(evaluations);
        debug!(units = units.len(), groups = groups.len(), "grouped units");

        let (mut suggestions, corpus) = try_join(
            synthesize_all(&*self.generator, &groups),
            self.store.list_completed_documents(user),
        )
        .await?;

        let related = try_join_all(suggestions.iter().map(|s| self.relate(s, &corpus))).await?;

        let mut seen = HashSet::new();
        let mut related_document_ids = Vec::new();
        for (suggestion, ids) in suggestions.iter_mut().zip(related) {
            for id in &ids {
                if seen.insert(id.clone()) {
                    related_document_ids.push(id.clone());
                }
            }
            suggestion.related_document_ids = ids;
        }

        Ok((
            Analysis {
                suggestions,
                related_document_ids,
            },
            corpus,
        ))
    }

    async fn relate(&self, suggestion: &Suggestion, corpus: &[DocumentRecord]) -> Result<Vec<String>> {
        let candidates = find_candidates(&*self.embedder, suggestion, corpus, &self.options).await?;
        confirm(&*self.generator, &suggestion.text, &candidates).await
    }

    /// Submit new raw text for a note.
    ///
    /// If the note is completed and the text segments exactly like the
    /// text it was computed from, the stored note is returned unchanged.
    /// Otherwise the note is written as pending, analyzed, and written back
    /// as completed.
    pub async fn update_note(&self, user: &str, note_id: &str, raw_text: &str) -> Result<NoteUpdate> {
        let started = Instant::now();
        let note = self.store.get_or_create_note(user, note_id).await?;
        let fingerprint = segment_fingerprint(&segment(raw_text));

        if note.status == RecordStatus::Completed && note.segment_fingerprint == fingerprint {
            debug!(user, note_id, "segmentation unchanged, reusing completed note");
            return Ok(NoteUpdate { note, reused: true });
        }

        self.store.mark_note_pending(user, note_id, raw_text).await?;
        let analysis = self.analyze_text(user, raw_text).await?;

        let completed = Note {
            id: note_id.to_string(),
            raw_text: raw_text.to_string(),
            status: RecordStatus::Completed,
            suggestions: analysis.suggestions,
            related_document_ids: analysis.related_document_ids,
            segment_fingerprint: fingerprint,
            updated_at: Utc::now(),
        };
        self.store.complete_note(user, &completed).await?;

        info!(
            user,
            note_id,
            suggestions = completed.suggestions.len(),
            related = completed.related_document_ids.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "note analysis completed"
        );
        Ok(NoteUpdate {
            note: completed,
            reused: false,
        })
    }

    /// Store new content as a pending document, analyze it, embed its
    /// facts, and store it again as completed.
    ///
    /// On failure the document stays pending, which keeps it out of the
    /// corpus used for matching.
    pub async fn add_document(
        &self,
        user: &str,
        id: &str,
        content: &str,
        url: Option<String>,
    ) -> Result<DocumentRecord> {
        let started = Instant::now();
        let now = Utc::now();
        let mut doc = DocumentRecord {
            id: id.to_string(),
            content: content.to_string(),
            url,
            status: RecordStatus::Pending,
            created_at: Some(now),
            updated_at: Some(now),
            ..Default::default()
        };
        self.store.put_document(user, &doc).await?;

        let analysis = analyze_document(&*self.generator, content).await?;
        analysis.apply_to(&mut doc);
        doc.embeddings = embed_query(&*self.embedder, &embedding_texts(&doc)).await?;
        doc.status = RecordStatus::Completed;
        doc.updated_at = Some(Utc::now());
        self.store.put_document(user, &doc).await?;

        info!(
            user,
            document_id = id,
            embeddings = doc.embeddings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "document analysis completed"
        );
        Ok(doc)
    }

    /// Read one document, failing with [`Error::NotFound`] if it is absent.
    pub async fn document(&self, user: &str, id: &str) -> Result<DocumentRecord> {
        self.store
            .get_document(user, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {}", id)))
    }

    /// Completed documents of a user, newest first.
    pub async fn list_documents(&self, user: &str) -> Result<Vec<DocumentRecord>> {
        let mut documents = self.store.list_completed_documents(user).await?;
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }
}
