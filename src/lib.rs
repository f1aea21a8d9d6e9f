//! # Threadline
//!
//! Turns a free-form scratchpad note into narrative threads, suggestions,
//! and related reading from a stored document corpus.
//!
//! The analysis itself lives in the `threadline-core` crate; this crate
//! supplies the concrete pieces around it: configuration, SQLite storage,
//! HTTP providers for generation and embeddings, the debounced scheduler
//! driver, document import, and the HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌─────────────┐
//! │   Draft   │──▶│  Scheduler   │──▶│  Pipeline   │
//! │  (edits)  │   │ debounce+1x  │   │ (core crate)│
//! └───────────┘   └──────────────┘   └──────┬──────┘
//!                                           │
//!                    ┌──────────────────────┼─────────────────┐
//!                    ▼                      ▼                 ▼
//!              ┌──────────┐          ┌────────────┐    ┌──────────┐
//!              │Generation│          │ Embeddings │    │  SQLite  │
//!              │  (LLM)   │          │            │    │  store   │
//!              └──────────┘          └────────────┘    └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! threadline init
//! threadline import ./reading.jsonl
//! threadline analyze --note today --file ./today.txt
//! threadline compose --note today < ./draft.txt
//! threadline serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite document and note store |
//! | [`http`] | JSON POST with retry and backoff |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | Structured-generation providers |
//! | [`runtime`] | Pipeline wiring from configuration |
//! | [`scheduler`] | Debounced single-flight analysis driver |
//! | [`import`] | JSON Lines document import |
//! | [`commands`] | CLI command implementations |
//! | [`server`] | HTTP server |

pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod generation;
pub mod http;
pub mod import;
pub mod migrate;
pub mod runtime;
pub mod scheduler;
pub mod server;
pub mod sqlite_store;
