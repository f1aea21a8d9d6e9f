//! Debounced, single-flight analysis of an evolving draft.
//!
//! [`AnalysisScheduler`] owns a background task that receives every edit of
//! one note. An edit only counts once the draft has been quiet for
//! `debounce`; drafts shorter than `min_chars` are dropped. The
//! debounced texts drive a [`threadline_core::scheduler::Scheduler`], and
//! the runs it hands back are spawned on the runtime. Results are
//! published on a broadcast channel and progress on a watch channel.
//!
//! A failed run is logged and published as [`AnalysisOutcome::Failed`];
//! the scheduler returns to idle and keeps accepting edits.

use std::sync::Arc;
use std::time::{Duration, Instant as StdInstant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use threadline_core::models::Note;
use threadline_core::pipeline::NotePipeline;
use threadline_core::scheduler::{RunTicket, Scheduler};

use crate::config::SchedulerConfig;

/// Executes one analysis of a full draft.
#[async_trait]
pub trait AnalysisRunner: Send + Sync + 'static {
    async fn run(&self, text: &str) -> Result<Note>;
}

/// Runs [`NotePipeline::update_note`] for a fixed user and note.
pub struct NoteRunner {
    pipeline: NotePipeline,
    user: String,
    note_id: String,
}

impl NoteRunner {
    pub fn new(pipeline: NotePipeline, user: impl Into<String>, note_id: impl Into<String>) -> Self {
        Self {
            pipeline,
            user: user.into(),
            note_id: note_id.into(),
        }
    }
}

#[async_trait]
impl AnalysisRunner for NoteRunner {
    async fn run(&self, text: &str) -> Result<Note> {
        let update = self
            .pipeline
            .update_note(&self.user, &self.note_id, text)
            .await?;
        Ok(update.note)
    }
}

#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    Completed(Note),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct AnalysisUpdate {
    pub run_id: u64,
    pub text: String,
    pub duration_ms: u64,
    pub outcome: AnalysisOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    /// An edit is waiting out the debounce window.
    pub debouncing: bool,
    pub analyzing: bool,
    /// A newer text is queued behind the run in flight.
    pub pending: bool,
    pub runs_started: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl SchedulerStatus {
    pub fn is_idle(&self) -> bool {
        !self.debouncing && !self.analyzing
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    pub debounce: Duration,
    pub min_chars: usize,
}

impl From<&SchedulerConfig> for SchedulerSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            debounce: config.debounce(),
            min_chars: config.min_chars,
        }
    }
}

enum Command {
    Text(String),
    /// End the debounce window now.
    Flush,
    /// Acknowledge once all earlier commands are processed.
    Sync(oneshot::Sender<()>),
    Shutdown,
}

struct Completion {
    ticket: RunTicket,
    duration_ms: u64,
    result: Result<Note>,
}

pub struct AnalysisScheduler {
    command_tx: mpsc::Sender<Command>,
    update_tx: broadcast::Sender<AnalysisUpdate>,
    status_rx: watch::Receiver<SchedulerStatus>,
}

impl AnalysisScheduler {
    /// Spawn the scheduler task. Must be called inside a tokio runtime.
    pub fn start(runner: Arc<dyn AnalysisRunner>, settings: SchedulerSettings) -> Self {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (update_tx, _) = broadcast::channel(32);
        let (status_tx, status_rx) = watch::channel(SchedulerStatus::default());

        spawn_schedule_loop(runner, settings, command_rx, update_tx.clone(), status_tx);

        Self {
            command_tx,
            update_tx,
            status_rx,
        }
    }

    /// Report the full current draft.
    pub async fn update_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(Command::Text(text.into())).await
    }

    /// Treat the latest draft as debounced immediately.
    pub async fn flush(&self) -> Result<()> {
        self.send(Command::Flush).await
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisUpdate> {
        self.update_tx.subscribe()
    }

    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        self.status_rx.borrow().clone()
    }

    /// Wait until no edit is debouncing and no run is in flight.
    pub async fn wait_idle(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Command::Sync(ack_tx)).await?;
        ack_rx
            .await
            .map_err(|_| anyhow!("scheduler task stopped"))?;

        let mut status = self.status_rx.clone();
        status
            .wait_for(SchedulerStatus::is_idle)
            .await
            .map_err(|_| anyhow!("scheduler task stopped"))?;
        Ok(())
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| anyhow!("scheduler task stopped"))
    }
}

impl Drop for AnalysisScheduler {
    fn drop(&mut self) {
        let _ = self.command_tx.try_send(Command::Shutdown);
    }
}

/// Drafts shorter than `min_chars` characters never reach the state machine.
fn meets_threshold(draft: &str, min_chars: usize) -> bool {
    draft.chars().count() >= min_chars
}

fn spawn_schedule_loop(
    runner: Arc<dyn AnalysisRunner>,
    settings: SchedulerSettings,
    mut command_rx: mpsc::Receiver<Command>,
    update_tx: broadcast::Sender<AnalysisUpdate>,
    status_tx: watch::Sender<SchedulerStatus>,
) {
    tokio::spawn(async move {
        let (done_tx, mut done_rx) = mpsc::channel::<Completion>(4);
        let mut machine = Scheduler::new();
        let mut status = SchedulerStatus::default();
        let mut draft: Option<String> = None;
        let mut deadline: Option<Instant> = None;

        let start_run = |ticket: RunTicket, status: &mut SchedulerStatus| {
            info!(run_id = ticket.run_id, chars = ticket.text.len(), "starting analysis");
            status.runs_started += 1;
            let runner = runner.clone();
            let done_tx = done_tx.clone();
            tokio::spawn(async move {
                let started = StdInstant::now();
                let result = runner.run(&ticket.text).await;
                let duration_ms = started.elapsed().as_millis() as u64;
                let _ = done_tx
                    .send(Completion {
                        ticket,
                        duration_ms,
                        result,
                    })
                    .await;
            });
        };

        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(Command::Text(text)) => {
                            draft = Some(text);
                            deadline = Some(Instant::now() + settings.debounce);
                        }
                        Some(Command::Flush) => {
                            if draft.is_some() {
                                deadline = Some(Instant::now());
                            }
                        }
                        Some(Command::Sync(ack)) => {
                            let _ = ack.send(());
                        }
                        Some(Command::Shutdown) | None => break,
                    }
                }
                Some(done) = done_rx.recv() => {
                    let Completion { ticket, duration_ms, result } = done;
                    let outcome = match result {
                        Ok(note) => {
                            status.consecutive_failures = 0;
                            status.last_error = None;
                            AnalysisOutcome::Completed(note)
                        }
                        Err(err) => {
                            warn!(run_id = ticket.run_id, error = %err, "analysis failed");
                            status.consecutive_failures += 1;
                            status.last_error = Some(err.to_string());
                            AnalysisOutcome::Failed(err.to_string())
                        }
                    };
                    if machine.should_apply(ticket.run_id) {
                        let _ = update_tx.send(AnalysisUpdate {
                            run_id: ticket.run_id,
                            text: ticket.text,
                            duration_ms,
                            outcome,
                        });
                    } else {
                        warn!(run_id = ticket.run_id, "dropping stale analysis result");
                    }
                    if let Some(next) = machine.on_complete(ticket.run_id) {
                        start_run(next, &mut status);
                    }
                }
                () = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    if let Some(text) = draft.take() {
                        if !meets_threshold(&text, settings.min_chars) {
                            debug!(chars = text.chars().count(), "draft below threshold");
                        } else if let Some(ticket) = machine.on_text(text) {
                            start_run(ticket, &mut status);
                        }
                    }
                }
            }

            status.debouncing = deadline.is_some();
            status.analyzing = !machine.is_idle();
            status.pending = machine.pending().is_some();
            let _ = status_tx.send(status.clone());
        }
        debug!("analysis scheduler stopped");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_counts_raw_characters() {
        assert!(!meets_threshold("too short", 10));
        assert!(meets_threshold("  padded  ", 10));
        assert!(meets_threshold("long enough text", 10));
        assert!(!meets_threshold("", 1));
    }

    #[test]
    fn test_idle_status() {
        let mut status = SchedulerStatus::default();
        assert!(status.is_idle());
        status.debouncing = true;
        assert!(!status.is_idle());
    }
}
