//! CLI command implementations. Results go to stdout as JSON; logs go to stderr.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use uuid::Uuid;

use threadline_core::store::DocumentStore;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::import::import_documents;
use crate::runtime::{build_pipeline, open_store};
use crate::scheduler::{AnalysisOutcome, AnalysisScheduler, AnalysisUpdate, NoteRunner, SchedulerSettings};

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run_import(config: &Config, path: &Path, user: &str) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open import file: {}", path.display()))?;
    let store = open_store(config).await?;
    let embedder = create_embedder(&config.embedding)?;
    let embedder = config.embedding.is_enabled().then_some(&*embedder);

    let stats = import_documents(&*store, embedder, user, std::io::BufReader::new(file)).await?;
    println!(
        "Imported {} documents ({} embedded, {} without embeddings).",
        stats.imported, stats.embedded, stats.unembedded
    );
    Ok(())
}

/// Read a file, or stdin when no file is given.
fn read_input(file: Option<&Path>, what: &str) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}: {}", what, path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .with_context(|| format!("Failed to read {} from stdin", what))?;
            Ok(buf)
        }
    }
}

/// One-shot note update from a file, or stdin when no file is given.
pub async fn run_analyze(config: &Config, note_id: &str, user: &str, file: Option<&Path>) -> Result<()> {
    let text = read_input(file, "note text")?;

    let pipeline = build_pipeline(config).await?;
    let update = pipeline.update_note(user, note_id, &text).await?;
    if update.reused {
        info!(note_id, "text unchanged since last analysis");
    }
    print_json(&update.note)
}

pub async fn run_note(config: &Config, note_id: &str, user: &str) -> Result<()> {
    let store = open_store(config).await?;
    match store.get_note(user, note_id).await? {
        Some(note) => print_json(&note),
        None => anyhow::bail!("note not found: {}", note_id),
    }
}

/// Analyze new document content and store it with a generated id unless
/// one is given.
pub async fn run_add(
    config: &Config,
    user: &str,
    file: Option<&Path>,
    id: Option<String>,
    url: Option<String>,
) -> Result<()> {
    let content = read_input(file, "document content")?;
    if content.trim().is_empty() {
        anyhow::bail!("document content is empty");
    }
    let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());

    let pipeline = build_pipeline(config).await?;
    let doc = pipeline
        .add_document(user, &id, &content, url)
        .await
        .with_context(|| format!("adding document {}", id))?;
    print_json(&doc)
}

pub async fn run_documents(config: &Config, user: &str) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    let documents = pipeline.list_documents(user).await?;
    print_json(&documents)
}

pub async fn run_document(config: &Config, id: &str, user: &str) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    let doc = pipeline.document(user, id).await?;
    print_json(&doc)
}

/// Print the documents related to a free-text query, best first.
pub async fn run_search(config: &Config, query: &str, user: &str) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    let documents = pipeline.search(user, query).await?;
    print_json(&documents)
}

fn render_update(update: &AnalysisUpdate) -> serde_json::Value {
    match &update.outcome {
        AnalysisOutcome::Completed(note) => serde_json::json!({
            "runId": update.run_id,
            "durationMs": update.duration_ms,
            "status": "completed",
            "note": note,
        }),
        AnalysisOutcome::Failed(error) => serde_json::json!({
            "runId": update.run_id,
            "durationMs": update.duration_ms,
            "status": "failed",
            "error": error,
        }),
    }
}

/// Treat each stdin line as an edit appended to the draft and feed the
/// debounced scheduler. Exits once input ends and the scheduler is idle.
pub async fn run_compose(config: &Config, note_id: &str, user: &str) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    let runner = Arc::new(NoteRunner::new(pipeline, user, note_id));
    let scheduler = AnalysisScheduler::start(runner, SchedulerSettings::from(&config.scheduler));

    let mut updates = scheduler.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => println!("{}", render_update(&update)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "output lagged behind analysis results");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut draft = String::new();
    while let Some(line) = lines.next_line().await? {
        if !draft.is_empty() {
            draft.push('\n');
        }
        draft.push_str(&line);
        scheduler.update_text(draft.clone()).await?;
    }

    scheduler.flush().await?;
    scheduler.wait_idle().await?;
    drop(scheduler);
    printer.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadline_core::models::Note;

    #[test]
    fn test_render_failed_update() {
        let update = AnalysisUpdate {
            run_id: 3,
            text: "draft".into(),
            duration_ms: 12,
            outcome: AnalysisOutcome::Failed("boom".into()),
        };
        let json = render_update(&update);
        assert_eq!(json["status"], "failed");
        assert_eq!(json["runId"], 3);
        assert_eq!(json["error"], "boom");
    }

    #[test]
    fn test_render_completed_update() {
        let update = AnalysisUpdate {
            run_id: 1,
            text: "draft".into(),
            duration_ms: 5,
            outcome: AnalysisOutcome::Completed(Note::empty("n1")),
        };
        let json = render_update(&update);
        assert_eq!(json["status"], "completed");
        assert_eq!(json["note"]["id"], "n1");
    }
}
