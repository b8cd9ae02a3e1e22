//! Application state management.

use anyhow::Context;
use phoneprobe_core::AppConfig;
use phoneprobe_db::Database;
use phoneprobe_scanner::ScanOrchestrator;
use std::path::Path;
use std::sync::Arc;

/// Everything a command needs: the database and the orchestrator.
pub struct AppState {
    /// Shared database handle
    pub db: Arc<Database>,
    /// Scan orchestrator backed by `db`
    pub orchestrator: ScanOrchestrator,
}

impl AppState {
    /// Load config (file, then env, then CLI override), open and migrate the
    /// database, and build the orchestrator.
    pub async fn init(config_path: Option<&Path>, database: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = AppConfig::load_with_env(config_path).context("loading config")?;
        if let Some(path) = database {
            config.database.path = Some(path.to_path_buf());
        }

        Self::from_config(&config).await
    }

    /// Build state from an already resolved configuration.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let db_path = config.database_path()?;
        tracing::info!("Database: {}", db_path.display());

        let db = Database::new(&db_path)
            .await
            .with_context(|| format!("opening database {}", db_path.display()))?;
        db.run_migrations().await?;
        let db = Arc::new(db);

        let orchestrator = ScanOrchestrator::from_config(config, db.clone())?;
        tracing::info!(
            "Scanner ready: {} endpoints, {} proxies",
            orchestrator.endpoint_count(),
            config.proxies.len()
        );

        Ok(Self { db, orchestrator })
    }

    /// Close the database pool.
    pub async fn shutdown(self) {
        drop(self.orchestrator);
        match Arc::try_unwrap(self.db) {
            Ok(db) => db.close().await,
            Err(_) => tracing::warn!("Database still shared at shutdown, skipping close"),
        }
    }
}
