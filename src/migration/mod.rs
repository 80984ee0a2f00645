//! Database migration and reset helpers for CLI commands.

use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::mysql::MySqlPoolOptions;
use tracing::info;

/// Run pending `sqlx` migrations against the configured database.
pub async fn run_migrations(config: &Config) -> Result<()> {
    info!("Connecting to database...");

    let pool = MySqlPoolOptions::new()
        .max_connections(1)
        .connect(&config.database.url)
        .await
        .context("failed to connect to database")?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    info!("Database migrations completed");
    Ok(())
}

/// Drop every table this crate owns, for local/dev resets. Tables are
/// dropped in dependency order (children before parents) so foreign keys
/// never block the drop.
pub async fn reset_database(config: &Config) -> Result<()> {
    let pool = MySqlPoolOptions::new()
        .max_connections(1)
        .connect(&config.database.url)
        .await
        .context("failed to connect to database")?;

    const TABLES: &[&str] = &[
        "webhook_deliveries",
        "webhooks",
        "api_keys",
        "abac_policies",
        "user_role_assignments",
        "permission_grants",
        "role_definitions",
        "audit_events",
        "oauth_accounts",
        "magic_link_tokens",
        "sessions",
        "tenant_members",
        "tenants",
        "users",
    ];

    sqlx::query("SET FOREIGN_KEY_CHECKS = 0").execute(&pool).await?;
    for table in TABLES {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}")).execute(&pool).await?;
    }
    sqlx::query("SET FOREIGN_KEY_CHECKS = 1").execute(&pool).await?;

    info!("Database reset completed");
    Ok(())
}
