//! Storage backends for credentials and profile documents.
//!
//! Postgres keeps each profile as one row whose `items` column is a JSONB
//! document, so item mutations are whole-document rewrites. The in-memory
//! backend mirrors those semantics for development and tests.

mod memory_repository;
mod postgres_repository;


pub use memory_repository::create_memory_repository;
pub use postgres_repository::create_postgres_repository;

use crate::config::DatabaseConfig;
use anyhow::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Delay between connection attempts at startup.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Connects to Postgres, retrying while the database comes up.
///
/// # Errors
/// Returns the last connection error once `retry_count` attempts are exhausted.
pub async fn connect_with_retry(config: &DatabaseConfig) -> Result<PgPool> {
    // ---
    let attempts = config.retry_count.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        // ---
        let result = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await;

        match result {
            Ok(pool) => {
                tracing::info!("Connected to database (attempt {attempt}/{attempts})");
                return Ok(pool);
            }
            Err(e) => {
                tracing::warn!("Database connection attempt {attempt}/{attempts} failed: {e}");
                last_err = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    let err = last_err
        .map(anyhow::Error::from)
        .unwrap_or_else(|| anyhow::anyhow!("no database connection attempts were made"));

    Err(err.context("Failed to connect to database"))
}

/// Creates the schema if it does not exist yet.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    // ---
    tracing::info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS credentials (
            id UUID PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id UUID PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL,
            items JSONB NOT NULL DEFAULT '[]'::jsonb,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations complete");
    Ok(())
}
