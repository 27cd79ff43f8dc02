use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};

const LEDGER_SCHEMA: &str = include_str!("../sql/ledger_schema.sql");

pub async fn connect_database(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Creates the ledger tables if they are missing.
pub async fn apply_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(LEDGER_SCHEMA)
        .execute(pool)
        .await
        .context("failed to apply ledger schema")?;

    Ok(())
}
