//! Schola Server — application entry point.
//!
//! Connects to SurrealDB, applies migrations, and runs the periodic
//! retention sweep until interrupted.

use std::time::Duration;

use schola_db::repository::{SurrealTrashRepository, SurrealUserRepository};
use schola_db::{DbConfig, DbManager, run_migrations};
use schola_roster::{RetentionPolicy, RetentionService};
use tracing_subscriber::EnvFilter;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("schola=info".parse().unwrap()),
        )
        .json()
        .init();

    tracing::info!("Starting Schola server...");

    let config = DbConfig {
        url: env_or("SCHOLA_DB_URL", "127.0.0.1:8000"),
        namespace: env_or("SCHOLA_DB_NAMESPACE", "schola"),
        database: env_or("SCHOLA_DB_DATABASE", "main"),
        username: env_or("SCHOLA_DB_USERNAME", "root"),
        password: env_or("SCHOLA_DB_PASSWORD", "root"),
    };

    let manager = match DbManager::connect(&config).await {
        Ok(manager) => manager,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to SurrealDB");
            std::process::exit(1);
        }
    };

    let db = manager.client().clone();
    if let Err(e) = run_migrations(&db).await {
        tracing::error!(error = %e, "Failed to run migrations");
        std::process::exit(1);
    }

    let retention = RetentionService::new(
        SurrealUserRepository::new(db.clone()),
        SurrealTrashRepository::new(db),
        RetentionPolicy::default(),
    );

    let sweep_secs: u64 = env_or("SCHOLA_SWEEP_INTERVAL_SECS", "3600")
        .parse()
        .unwrap_or(3600);
    let mut ticker = tokio::time::interval(Duration::from_secs(sweep_secs));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match retention.sweep().await {
                    Ok(purged) => tracing::debug!(purged, "Retention sweep completed"),
                    Err(e) => tracing::warn!(error = %e, "Retention sweep failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("Schola server stopped.");
}
