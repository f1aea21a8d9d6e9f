use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the database file and schema. Safe to run repeatedly.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    // Notes and documents share one table, addressed by (user, collection, id)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            user_id TEXT NOT NULL,
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            status TEXT NOT NULL,
            body_json TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, collection, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per document vector
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_embeddings (
            user_id TEXT NOT NULL,
            document_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (user_id, document_id, position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_records_status ON records(user_id, collection, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
