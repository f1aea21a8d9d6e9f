//! Wiring of configured providers and the SQLite store into a pipeline.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use threadline_core::pipeline::NotePipeline;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::migrate::migrate;
use crate::sqlite_store::SqliteStore;

/// Open the database (migrating it if needed) and return the store.
pub async fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let pool = db::connect(config).await?;
    migrate(&pool).await?;
    Ok(Arc::new(SqliteStore::new(pool)))
}

/// Build a [`NotePipeline`] from configuration.
pub async fn build_pipeline(config: &Config) -> Result<NotePipeline> {
    let store = open_store(config).await?;
    let generator = create_generator(&config.generation)?;
    let embedder = create_embedder(&config.embedding)?;
    debug!(
        generator = generator.model_name(),
        embedder = embedder.model_name(),
        "pipeline providers ready"
    );
    Ok(NotePipeline::new(
        generator,
        embedder,
        store,
        config.matching.options(),
    ))
}
