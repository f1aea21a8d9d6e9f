//! # Threadline Core
//!
//! Runtime-agnostic logic for Threadline: data models, segmentation,
//! narrative grouping, the structured-generation and embedding boundaries,
//! document analysis, similarity matching, relevance confirmation, the note
//! pipeline, the store abstraction, and the analysis scheduler state machine.
//!
//! This crate contains no tokio, sqlx, HTTP clients, or filesystem I/O.
//! Concrete providers and stores live in the `threadline` app crate.

pub mod analyze;
pub mod confirm;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod group;
pub mod models;
pub mod pipeline;
pub mod scheduler;
pub mod segment;
pub mod similarity;
pub mod store;
pub mod synthesize;

pub use error::{Error, Result};
