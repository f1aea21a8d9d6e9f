//! Document import from JSON Lines.
//!
//! Each non-blank line is one document in the stored camelCase shape:
//!
//! ```json
//! {"id":"d1","topics":["gardening"],"knowledge":["Most houseplants need water weekly."]}
//! ```
//!
//! Documents without embeddings get one vector per fact (see
//! [`threadline_core::document::embedding_texts`]) when an embedder is
//! configured, and are stored without vectors otherwise.

use std::io::BufRead;

use anyhow::{Context, Result};
use tracing::{info, warn};

use threadline_core::document::embedding_texts;
use threadline_core::embedding::{embed_query, Embedder};
use threadline_core::models::DocumentRecord;
use threadline_core::store::DocumentStore;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub imported: usize,
    /// Documents whose embeddings were computed during import.
    pub embedded: usize,
    /// Documents stored without any embedding.
    pub unembedded: usize,
}

/// Import documents for `user`. Pass `None` as the embedder when no
/// embedding provider is configured.
pub async fn import_documents<R: BufRead>(
    store: &dyn DocumentStore,
    embedder: Option<&dyn Embedder>,
    user: &str,
    reader: R,
) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("failed to read line {}", line_no))?;
        if line.trim().is_empty() {
            continue;
        }
        let mut doc: DocumentRecord = serde_json::from_str(&line)
            .with_context(|| format!("invalid document on line {}", line_no))?;

        if doc.embeddings.is_empty() {
            let texts = embedding_texts(&doc);
            if let (Some(embedder), false) = (embedder, texts.is_empty()) {
                doc.embeddings = embed_query(embedder, &texts)
                    .await
                    .with_context(|| format!("embedding document {}", doc.id))?;
                stats.embedded += 1;
            } else {
                warn!(document_id = %doc.id, "document stored without embeddings");
                stats.unembedded += 1;
            }
        }

        store
            .put_document(user, &doc)
            .await
            .with_context(|| format!("storing document {}", doc.id))?;
        stats.imported += 1;
    }

    info!(
        user,
        imported = stats.imported,
        embedded = stats.embedded,
        unembedded = stats.unembedded,
        "import finished"
    );
    Ok(stats)
}
