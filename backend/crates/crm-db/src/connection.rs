use crate::{DbError, Result};

use std::panic::Location;
use std::path::Path;

use error_location::ErrorLocation;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Opens (creating if missing) the SQLite database at `path`, enables
/// foreign keys and runs pending migrations.
pub async fn create_pool(path: &Path, max_connections: u32) -> Result<SqlitePool> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DbError::Initialization {
                message: format!("Failed to create database directory: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DbError::Migration {
            message: format!("Migration failed: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(())
}
